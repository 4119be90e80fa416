use super::types::Database;
use anyhow::Result;
use sqlx::SqlitePool;

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url).await?;
        sqlx::migrate!().run(&pool).await?;
        Ok(Self { pool })
    }

    /// Test helper method to access the underlying pool
    #[cfg(test)]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Returns whether the paper schema exists in the database at `database_url`
pub async fn check_schema_applied(database_url: &str) -> Result<bool, sqlx::Error> {
    let pool = SqlitePool::connect(database_url).await?;
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'papers'",
    )
    .fetch_one(&pool)
    .await?;
    pool.close().await;
    Ok(count > 0)
}
