use crate::check_schema_applied;
use crate::database::Database;
use tempfile::TempDir;

#[tokio::test]
async fn test_check_schema_applied_after_migration() {
    let temp = TempDir::new().unwrap();
    let database_url = format!("sqlite:{}?mode=rwc", temp.path().join("papers.db").display());

    let db = Database::new(&database_url).await.unwrap();
    drop(db);

    assert!(check_schema_applied(&database_url).await.unwrap());
}

#[tokio::test]
async fn test_check_schema_applied_on_empty_database() {
    let temp = TempDir::new().unwrap();
    let database_url = format!("sqlite:{}?mode=rwc", temp.path().join("empty.db").display());

    assert!(!check_schema_applied(&database_url).await.unwrap());
}

#[tokio::test]
async fn test_check_schema_applied_with_unreachable_database() {
    let result: Result<bool, sqlx::Error> =
        check_schema_applied("sqlite:/nonexistent-dir/missing/papers.db").await;
    assert!(
        result.is_err(),
        "Should return error for a database that cannot be opened"
    );
}
