/// Shared test helpers for database tests
use super::Database;
use sqlx::sqlite::SqlitePoolOptions;

/// Set up an in-memory SQLite database with all migrations applied.
/// A single connection keeps the in-memory database alive for the lifetime of the pool.
pub async fn setup_test_db() -> Database {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Migration failed");

    Database { pool }
}
