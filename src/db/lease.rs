use chrono::Utc;
use tokio::time::Duration;
use tracing::{debug, info, instrument};

use super::core::Database;
use crate::TARGET_DB;

impl Database {
    /// Takes the single run lease for `holder` unless another holder has an unexpired one.
    /// Re-acquiring an own lease extends it. Returns whether the lease is now held.
    #[instrument(target = "db_query", level = "debug", skip(self))]
    pub async fn try_acquire_run_lease(
        &self,
        holder: &str,
        ttl: Duration,
    ) -> Result<bool, sqlx::Error> {
        let now = Utc::now().timestamp();
        let expires_at = now + ttl.as_secs() as i64;

        let result = sqlx::query(
            r#"
            INSERT INTO run_lease (id, holder, expires_at)
            VALUES (1, ?1, ?2)
            ON CONFLICT(id) DO UPDATE SET
                holder = excluded.holder,
                expires_at = excluded.expires_at
            WHERE run_lease.holder = excluded.holder OR run_lease.expires_at <= ?3
            "#,
        )
        .bind(holder)
        .bind(expires_at)
        .bind(now)
        .execute(self.pool())
        .await?;

        let acquired = result.rows_affected() == 1;
        if acquired {
            debug!(target: TARGET_DB, "Run lease acquired by {}", holder);
        } else {
            info!(target: TARGET_DB, "Run lease is held by another run; {} not acquired", holder);
        }
        Ok(acquired)
    }

    /// Releases the lease if `holder` still owns it.
    #[instrument(target = "db_query", level = "debug", skip(self))]
    pub async fn release_run_lease(&self, holder: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM run_lease WHERE holder = ?1")
            .bind(holder)
            .execute(self.pool())
            .await?;
        Ok(())
    }
}
