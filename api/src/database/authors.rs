use super::types::{Author, Database};
use crate::search::fold_text;
use crate::validation::{validate_email, validate_name};
use anyhow::Result;
use serde::Deserialize;
use sqlx::SqliteConnection;

const AUTHOR_COLUMNS: &str = "id, name, email, affiliation, created_at";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorCreate {
    pub name: String,
    pub email: Option<String>,
    pub affiliation: Option<String>,
}

impl Database {
    pub async fn create_author(&self, params: AuthorCreate) -> Result<Author> {
        let mut conn = self.pool.acquire().await?;
        insert_author(&mut conn, params).await
    }

    pub async fn get_author(&self, author_id: i64) -> Result<Option<Author>> {
        let sql = format!("SELECT {} FROM authors WHERE id = ?", AUTHOR_COLUMNS);
        let author = sqlx::query_as::<_, Author>(&sql)
            .bind(author_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(author)
    }

    pub async fn list_authors(&self, skip: i64, limit: i64) -> Result<Vec<Author>> {
        let sql = format!(
            "SELECT {} FROM authors ORDER BY name ASC, id ASC LIMIT ? OFFSET ?",
            AUTHOR_COLUMNS
        );
        let authors = sqlx::query_as::<_, Author>(&sql)
            .bind(limit)
            .bind(skip)
            .fetch_all(&self.pool)
            .await?;

        Ok(authors)
    }

    /// Looks an author up by exact name, creating it when missing
    pub async fn find_or_create_author(&self, name: &str) -> Result<Author> {
        let mut conn = self.pool.acquire().await?;
        find_or_create_author_in(&mut conn, name).await
    }
}

async fn insert_author(conn: &mut SqliteConnection, params: AuthorCreate) -> Result<Author> {
    let name = validate_name("Author name", &params.name, 255)?;
    if let Some(email) = &params.email {
        validate_email(email)?;
    }

    let sql = format!(
        "INSERT INTO authors (name, name_folded, email, affiliation) VALUES (?, ?, ?, ?) RETURNING {}",
        AUTHOR_COLUMNS
    );
    let folded = fold_text(&name);
    let author = sqlx::query_as::<_, Author>(&sql)
        .bind(name)
        .bind(folded)
        .bind(&params.email)
        .bind(&params.affiliation)
        .fetch_one(&mut *conn)
        .await?;

    tracing::debug!(author_id = author.id, "Created author");
    Ok(author)
}

/// Same as [`Database::find_or_create_author`] on a caller-held connection or transaction
pub(super) async fn find_or_create_author_in(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Author> {
    let name = validate_name("Author name", name, 255)?;
    let sql = format!(
        "SELECT {} FROM authors WHERE name = ? ORDER BY id ASC LIMIT 1",
        AUTHOR_COLUMNS
    );
    let existing = sqlx::query_as::<_, Author>(&sql)
        .bind(&name)
        .fetch_optional(&mut *conn)
        .await?;

    match existing {
        Some(author) => Ok(author),
        None => {
            insert_author(
                conn,
                AuthorCreate {
                    name,
                    ..Default::default()
                },
            )
            .await
        }
    }
}
