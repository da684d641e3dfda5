use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    Pool, Sqlite,
};
use std::path::Path;
use tokio::time::Duration;
use tracing::{info, instrument};

use crate::TARGET_DB;

/// Durable history of delivered content.
///
/// Cloning is cheap and every clone shares the same connection pool, so one instance is opened at
/// startup and handed to whoever needs it.
#[derive(Clone, Debug)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Get access to the database pool
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Opens (creating if missing) the database file and makes sure the schema exists.
    #[instrument(target = "db_query", level = "info", skip_all)]
    pub async fn new(database_path: impl AsRef<Path>) -> Result<Self, sqlx::Error> {
        let database_path = database_path.as_ref();
        info!(target: TARGET_DB, "Creating database pool for: {}", database_path.display());

        let connect_options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;

        info!(target: TARGET_DB, "Database pool created");

        let db = Database { pool };
        db.initialize_schema().await?;

        Ok(db)
    }

    /// Waits for in-flight queries and closes every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
