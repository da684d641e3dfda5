use sqlx::FromRow;
use tracing::{debug, error, instrument};

use super::core::Database;
use crate::TARGET_DB;

/// Result of trying to record a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Inserted,
    /// The url was already recorded; nothing changed.
    AlreadyExists,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct PostedRecord {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub category: String,
    pub posted_at: Option<String>,
}

impl Database {
    #[instrument(target = "db_query", level = "debug", skip(self))]
    pub async fn is_posted(&self, url: &str) -> Result<bool, sqlx::Error> {
        let exists = sqlx::query("SELECT 1 FROM posted_content WHERE url = ?1")
            .bind(url)
            .fetch_optional(self.pool())
            .await?
            .is_some();

        Ok(exists)
    }

    /// Records a delivered url. Recording the same url again is a no-op reported as
    /// [`RecordOutcome::AlreadyExists`], so concurrent or repeated acknowledgments are idempotent.
    #[instrument(target = "db_query", level = "info", skip(self, title))]
    pub async fn record_posted(
        &self,
        title: &str,
        url: &str,
        category: &str,
    ) -> Result<RecordOutcome, sqlx::Error> {
        if url.trim().is_empty() {
            error!(target: TARGET_DB, "Attempted to record an empty URL");
            return Err(sqlx::Error::Protocol("Empty URL provided".into()));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO posted_content (title, url, category)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(url) DO NOTHING
            "#,
        )
        .bind(title)
        .bind(url)
        .bind(category)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            debug!(target: TARGET_DB, "URL already recorded: {}", url);
            Ok(RecordOutcome::AlreadyExists)
        } else {
            debug!(target: TARGET_DB, "URL recorded: {}", url);
            Ok(RecordOutcome::Inserted)
        }
    }

    pub async fn get_posted(&self, url: &str) -> Result<Option<PostedRecord>, sqlx::Error> {
        sqlx::query_as::<_, PostedRecord>(
            r#"
            SELECT id, title, url, category, CAST(posted_at AS TEXT) AS posted_at
            FROM posted_content
            WHERE url = ?1
            "#,
        )
        .bind(url)
        .fetch_optional(self.pool())
        .await
    }

    /// Most recently recorded deliveries first.
    pub async fn recent_posts(&self, limit: u32) -> Result<Vec<PostedRecord>, sqlx::Error> {
        sqlx::query_as::<_, PostedRecord>(
            r#"
            SELECT id, title, url, category, CAST(posted_at AS TEXT) AS posted_at
            FROM posted_content
            ORDER BY id DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await
    }

    /// Number of delivered items per category, alphabetically.
    pub async fn category_counts(&self) -> Result<Vec<(String, i64)>, sqlx::Error> {
        sqlx::query_as::<_, (String, i64)>(
            "SELECT category, COUNT(*) FROM posted_content GROUP BY category ORDER BY category",
        )
        .fetch_all(self.pool())
        .await
    }

    pub async fn total_posted(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM posted_content")
            .fetch_one(self.pool())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_database;

    #[tokio::test]
    async fn test_record_posted_is_idempotent() {
        let db = temp_database().await;
        let url = "https://example.com/python";

        assert!(!db.is_posted(url).await.unwrap());

        let first = db
            .record_posted("Learning Python", url, "programming")
            .await
            .unwrap();
        assert_eq!(first, RecordOutcome::Inserted);
        assert!(db.is_posted(url).await.unwrap());

        let second = db
            .record_posted("Learning Python (again)", url, "languages")
            .await
            .unwrap();
        assert_eq!(second, RecordOutcome::AlreadyExists);
        assert!(db.is_posted(url).await.unwrap());
        assert_eq!(db.total_posted().await.unwrap(), 1);

        // The first record is never updated.
        let record = db.get_posted(url).await.unwrap().unwrap();
        assert_eq!(record.title, "Learning Python");
        assert_eq!(record.category, "programming");
        assert!(record.posted_at.is_some());
    }

    #[tokio::test]
    async fn test_is_posted_is_exact_match() {
        let db = temp_database().await;
        db.record_posted("A", "https://example.com/a", "history")
            .await
            .unwrap();

        assert!(!db.is_posted("https://example.com/a/").await.unwrap());
        assert!(!db.is_posted("https://EXAMPLE.com/a").await.unwrap());
        assert!(db.is_posted("https://example.com/a").await.unwrap());
    }

    #[tokio::test]
    async fn test_record_posted_rejects_empty_url() {
        let db = temp_database().await;
        assert!(db.record_posted("Title", "  ", "history").await.is_err());
        assert_eq!(db.total_posted().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_records_insert_once() {
        let db = temp_database().await;
        let url = "https://example.com/contended";

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let db = db.clone();
                tokio::spawn(async move {
                    db.record_posted(&format!("Attempt {}", i), url, "programming")
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap() == RecordOutcome::Inserted {
                inserted += 1;
            }
        }

        assert_eq!(inserted, 1);
        assert_eq!(db.total_posted().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_history_survives_reopen() {
        let path = std::env::temp_dir().join(format!("edufeed-test-{}.db", uuid::Uuid::new_v4()));

        let db = Database::new(&path).await.unwrap();
        db.record_posted("Castles", "https://example.com/castles", "history")
            .await
            .unwrap();
        db.close().await;

        // Schema creation on an existing database must not fail or drop data.
        let reopened = Database::new(&path).await.unwrap();
        assert!(reopened.is_posted("https://example.com/castles").await.unwrap());
    }

    #[tokio::test]
    async fn test_stats() {
        let db = temp_database().await;
        db.record_posted("P1", "https://example.com/p1", "programming")
            .await
            .unwrap();
        db.record_posted("P2", "https://example.com/p2", "programming")
            .await
            .unwrap();
        db.record_posted("H1", "https://example.com/h1", "history")
            .await
            .unwrap();

        assert_eq!(
            db.category_counts().await.unwrap(),
            vec![("history".to_string(), 1), ("programming".to_string(), 2)]
        );
        assert_eq!(db.total_posted().await.unwrap(), 3);

        let recent = db.recent_posts(2).await.unwrap();
        let urls: Vec<&str> = recent.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["https://example.com/h1", "https://example.com/p2"]);
    }
}
