use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Author {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub affiliation: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Venue {
    pub id: i64,
    pub name: String,
    /// `journal` or `conference`
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub venue_type: String,
    pub impact_factor: Option<f64>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub color: String,
}

/// Author of a paper together with its position in the author list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperAuthor {
    pub author_order: i64,
    pub is_corresponding: bool,
    pub author: Author,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    pub id: i64,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub publication_year: i64,
    pub doi: Option<String>,
    pub citation_count: i64,
    pub venue_id: Option<i64>,
    pub url: Option<String>,
    pub keywords: Vec<String>,
    pub pdf_file_path: Option<String>,
    pub file_size: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

/// A paper with its venue, authors and tags resolved for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    #[serde(flatten)]
    pub paper: Paper,
    pub venue: Option<Venue>,
    pub authors: Vec<PaperAuthor>,
    pub tags: Vec<Tag>,
}
