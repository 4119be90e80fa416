use super::types::{Database, Tag};
use crate::validation::{validate_name, validate_tag_color};
use anyhow::Result;
use serde::Deserialize;

pub const DEFAULT_TAG_COLOR: &str = "#6B7280";

#[derive(Debug, Clone, Deserialize)]
pub struct TagCreate {
    pub name: String,
    pub color: Option<String>,
}

impl Database {
    pub async fn create_tag(&self, params: TagCreate) -> Result<Tag> {
        let name = validate_name("Tag name", &params.name, 100)?;
        let color = params
            .color
            .unwrap_or_else(|| DEFAULT_TAG_COLOR.to_string());
        validate_tag_color(&color)?;

        let tag = sqlx::query_as::<_, Tag>(
            "INSERT INTO tags (name, color) VALUES (?, ?) RETURNING id, name, color",
        )
        .bind(name)
        .bind(color)
        .fetch_one(&self.pool)
        .await?;

        Ok(tag)
    }

    pub async fn list_tags(&self) -> Result<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>("SELECT id, name, color FROM tags ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(tags)
    }

    pub async fn find_or_create_tag(&self, name: &str) -> Result<Tag> {
        let name = validate_name("Tag name", name, 100)?;
        let existing =
            sqlx::query_as::<_, Tag>("SELECT id, name, color FROM tags WHERE name = ?")
                .bind(&name)
                .fetch_optional(&self.pool)
                .await?;

        match existing {
            Some(tag) => Ok(tag),
            None => self.create_tag(TagCreate { name, color: None }).await,
        }
    }
}
