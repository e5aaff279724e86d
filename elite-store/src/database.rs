use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tokio::sync::OnceCell;

use crate::schema;

/// Shared handle on the relational store. The schema latch runs the
/// bootstrap at most once per process; a failed bootstrap leaves the latch
/// unset so the next request retries.
#[derive(Clone)]
pub struct DbClient {
    pub pool: SqlitePool,
    schema_ready: Arc<OnceCell<()>>,
}

impl DbClient {
    pub async fn connect(connection_string: &str) -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        }
    }

    /// Private in-memory database, used by the test suites. Single
    /// connection, never reaped: the database lives exactly as long as it.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Ok(Self::from_pool(pool))
    }

    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        self.schema_ready
            .get_or_try_init(|| schema::bootstrap(&self.pool))
            .await?;
        Ok(())
    }
}
