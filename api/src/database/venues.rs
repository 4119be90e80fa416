use super::types::{Database, Venue};
use crate::validation::{validate_name, validate_venue_type};
use anyhow::Result;
use serde::Deserialize;
use sqlx::SqliteConnection;

#[derive(Debug, Clone, Deserialize)]
pub struct VenueCreate {
    pub name: String,
    #[serde(rename = "type", default = "default_venue_type")]
    pub venue_type: String,
    pub impact_factor: Option<f64>,
}

fn default_venue_type() -> String {
    "journal".to_string()
}

impl Database {
    pub async fn create_venue(&self, params: VenueCreate) -> Result<Venue> {
        let mut conn = self.pool.acquire().await?;
        insert_venue(&mut conn, params).await
    }

    pub async fn get_venue(&self, venue_id: i64) -> Result<Option<Venue>> {
        let venue = sqlx::query_as::<_, Venue>(
            "SELECT id, name, type, impact_factor, created_at FROM venues WHERE id = ?",
        )
        .bind(venue_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(venue)
    }

    pub async fn list_venues(&self) -> Result<Vec<Venue>> {
        let venues = sqlx::query_as::<_, Venue>(
            "SELECT id, name, type, impact_factor, created_at FROM venues ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(venues)
    }

    /// Looks a venue up by exact name; a new venue gets `venue_type`
    pub async fn find_or_create_venue(&self, name: &str, venue_type: &str) -> Result<Venue> {
        let mut conn = self.pool.acquire().await?;
        find_or_create_venue_in(&mut conn, name, venue_type).await
    }
}

async fn insert_venue(conn: &mut SqliteConnection, params: VenueCreate) -> Result<Venue> {
    let name = validate_name("Venue name", &params.name, 255)?;
    validate_venue_type(&params.venue_type)?;

    let venue = sqlx::query_as::<_, Venue>(
        r#"INSERT INTO venues (name, type, impact_factor) VALUES (?, ?, ?)
           RETURNING id, name, type, impact_factor, created_at"#,
    )
    .bind(name)
    .bind(&params.venue_type)
    .bind(params.impact_factor)
    .fetch_one(&mut *conn)
    .await?;

    Ok(venue)
}

pub(super) async fn find_or_create_venue_in(
    conn: &mut SqliteConnection,
    name: &str,
    venue_type: &str,
) -> Result<Venue> {
    let name = validate_name("Venue name", name, 255)?;
    let existing = sqlx::query_as::<_, Venue>(
        r#"SELECT id, name, type, impact_factor, created_at FROM venues
           WHERE name = ? ORDER BY id ASC LIMIT 1"#,
    )
    .bind(&name)
    .fetch_optional(&mut *conn)
    .await?;

    match existing {
        Some(venue) => Ok(venue),
        None => {
            insert_venue(
                conn,
                VenueCreate {
                    name,
                    venue_type: venue_type.to_string(),
                    impact_factor: None,
                },
            )
            .await
        }
    }
}
