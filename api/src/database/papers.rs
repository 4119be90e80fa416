use super::types::{Author, Database, Paper, PaperAuthor, PaperRecord, Tag, Venue};
use crate::search::{
    build_sql, fold_text, validate_pagination, SearchFilters, SqlValue, ORDER_AND_PAGE,
};
use crate::validation::{
    validate_citation_count, validate_doi, validate_name, validate_publication_year, validate_url,
};
use anyhow::{Context, Result};
use paper_common::ComplexSearchQuery;
use serde::Deserialize;
use std::collections::HashMap;

const PAPER_COLUMNS: &str = "p.id, p.title, p.abstract, p.publication_year, p.doi, \
    p.citation_count, p.venue_id, p.url, p.keywords, p.pdf_file_path, p.file_size, \
    p.created_at, p.updated_at";

#[derive(Debug, sqlx::FromRow)]
struct PaperRow {
    id: i64,
    title: String,
    #[sqlx(rename = "abstract")]
    abstract_text: Option<String>,
    publication_year: i64,
    doi: Option<String>,
    citation_count: i64,
    venue_id: Option<i64>,
    url: Option<String>,
    keywords: Option<String>,
    pdf_file_path: Option<String>,
    file_size: Option<i64>,
    created_at: String,
    updated_at: String,
}

impl From<PaperRow> for Paper {
    fn from(row: PaperRow) -> Self {
        let keywords = match row.keywords.as_deref() {
            None | Some("") => Vec::new(),
            Some(raw) => serde_json::from_str(raw).unwrap_or_else(|e| {
                tracing::warn!(paper_id = row.id, error = %e, "Ignoring malformed keywords");
                Vec::new()
            }),
        };
        Paper {
            id: row.id,
            title: row.title,
            abstract_text: row.abstract_text,
            publication_year: row.publication_year,
            doi: row.doi,
            citation_count: row.citation_count,
            venue_id: row.venue_id,
            url: row.url,
            keywords,
            pdf_file_path: row.pdf_file_path,
            file_size: row.file_size,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaperAuthorRow {
    paper_id: i64,
    author_order: i64,
    is_corresponding: bool,
    id: i64,
    name: String,
    email: Option<String>,
    affiliation: Option<String>,
    created_at: String,
}

#[derive(Debug, sqlx::FromRow)]
struct PaperTagRow {
    paper_id: i64,
    id: i64,
    name: String,
    color: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaperCreate {
    pub title: String,
    #[serde(rename = "abstract", default)]
    pub abstract_text: Option<String>,
    pub publication_year: i64,
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub citation_count: i64,
    #[serde(default)]
    pub venue_id: Option<i64>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Authors in author-list order; repeated ids keep their first position
    #[serde(default)]
    pub author_ids: Vec<i64>,
    #[serde(default)]
    pub corresponding_author_id: Option<i64>,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
}

/// Partial update: absent fields keep their value, present lists replace the associations
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaperUpdate {
    pub title: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub publication_year: Option<i64>,
    pub doi: Option<String>,
    pub citation_count: Option<i64>,
    pub venue_id: Option<i64>,
    pub url: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub author_ids: Option<Vec<i64>>,
    pub corresponding_author_id: Option<i64>,
    pub tag_ids: Option<Vec<i64>>,
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn dedupe_ids(ids: &[i64]) -> Vec<i64> {
    let mut unique = Vec::with_capacity(ids.len());
    for id in ids {
        if !unique.contains(id) {
            unique.push(*id);
        }
    }
    unique
}

fn validate_optional_fields(doi: Option<&str>, url: Option<&str>) -> Result<()> {
    if let Some(doi) = doi {
        validate_doi(doi)?;
    }
    if let Some(url) = url {
        validate_url(url)?;
    }
    Ok(())
}

impl Database {
    pub async fn create_paper(&self, params: PaperCreate) -> Result<PaperRecord> {
        let mut tx = self.pool.begin().await?;
        let paper_id = insert_paper(&mut tx, &params).await?;
        tx.commit().await?;
        tracing::info!(paper_id, "Created paper");

        self.get_paper(paper_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Paper {} vanished after insert", paper_id))
    }

    pub async fn get_paper(&self, paper_id: i64) -> Result<Option<PaperRecord>> {
        let sql = format!("SELECT {} FROM papers p WHERE p.id = ?", PAPER_COLUMNS);
        let row = sqlx::query_as::<_, PaperRow>(&sql)
            .bind(paper_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Newest papers first
    pub async fn list_papers(&self, skip: i64, limit: i64) -> Result<Vec<PaperRecord>> {
        validate_pagination(skip, limit)?;
        let sql = format!(
            "SELECT {} FROM papers p ORDER BY p.id DESC LIMIT ? OFFSET ?",
            PAPER_COLUMNS
        );
        let rows = sqlx::query_as::<_, PaperRow>(&sql)
            .bind(limit)
            .bind(skip)
            .fetch_all(&self.pool)
            .await?;

        self.hydrate(rows).await
    }

    pub async fn count_papers(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM papers")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn update_paper(
        &self,
        paper_id: i64,
        params: PaperUpdate,
    ) -> Result<Option<PaperRecord>> {
        let title = params
            .title
            .as_deref()
            .map(|t| validate_name("Title", t, 1000))
            .transpose()?;
        if let Some(year) = params.publication_year {
            validate_publication_year(year)?;
        }
        if let Some(count) = params.citation_count {
            validate_citation_count(count)?;
        }
        validate_optional_fields(params.doi.as_deref(), params.url.as_deref())?;
        let keywords = params
            .keywords
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"UPDATE papers SET
                 title = COALESCE(?, title),
                 title_folded = COALESCE(?, title_folded),
                 abstract = COALESCE(?, abstract),
                 abstract_folded = COALESCE(?, abstract_folded),
                 publication_year = COALESCE(?, publication_year),
                 doi = COALESCE(?, doi),
                 citation_count = COALESCE(?, citation_count),
                 venue_id = COALESCE(?, venue_id),
                 url = COALESCE(?, url),
                 keywords = COALESCE(?, keywords),
                 updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
               WHERE id = ?"#,
        )
        .bind(title.as_deref())
        .bind(title.as_deref().map(fold_text))
        .bind(&params.abstract_text)
        .bind(params.abstract_text.as_deref().map(fold_text))
        .bind(params.publication_year)
        .bind(&params.doi)
        .bind(params.citation_count)
        .bind(params.venue_id)
        .bind(&params.url)
        .bind(keywords)
        .bind(paper_id)
        .execute(&mut *tx)
        .await
        .context("Failed to update paper")?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        if let Some(author_ids) = &params.author_ids {
            sqlx::query("DELETE FROM paper_authors WHERE paper_id = ?")
                .bind(paper_id)
                .execute(&mut *tx)
                .await?;
            insert_authors(&mut tx, paper_id, author_ids, params.corresponding_author_id).await?;
        }
        if let Some(tag_ids) = &params.tag_ids {
            sqlx::query("DELETE FROM paper_tags WHERE paper_id = ?")
                .bind(paper_id)
                .execute(&mut *tx)
                .await?;
            insert_tags(&mut tx, paper_id, tag_ids).await?;
        }

        tx.commit().await?;
        tracing::info!(paper_id, "Updated paper");

        self.get_paper(paper_id).await
    }

    /// Deletes a paper and its author/tag associations. Returns false when it did not exist.
    pub async fn delete_paper(&self, paper_id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM paper_authors WHERE paper_id = ?")
            .bind(paper_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM paper_tags WHERE paper_id = ?")
            .bind(paper_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM papers WHERE id = ?")
            .bind(paper_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            tracing::info!(paper_id, "Deleted paper");
        }
        Ok(deleted)
    }

    /// Records the stored PDF of a paper. Returns false when the paper does not exist.
    pub async fn set_paper_file(&self, paper_id: i64, path: &str, file_size: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"UPDATE papers SET pdf_file_path = ?, file_size = ?,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
               WHERE id = ?"#,
        )
        .bind(path)
        .bind(file_size)
        .bind(paper_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn find_paper_id_by_doi(&self, doi: &str) -> Result<Option<i64>> {
        let id = sqlx::query_scalar("SELECT id FROM papers WHERE doi = ?")
            .bind(doi)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    pub async fn find_paper_id_by_title(&self, title: &str) -> Result<Option<i64>> {
        let id = sqlx::query_scalar("SELECT id FROM papers WHERE title = ? ORDER BY id LIMIT 1")
            .bind(title)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    /// Evaluates a filter tree against the store.
    ///
    /// Validation failures surface as a `QueryError` inside the returned error so callers can
    /// tell them apart from store failures. Results are ordered by publication year (newest
    /// first) with the paper id as tiebreak, so pages of one query never overlap.
    pub async fn search_papers_complex(
        &self,
        query: &ComplexSearchQuery,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<PaperRecord>> {
        validate_pagination(skip, limit)?;
        query.root.validate()?;
        let predicate = build_sql(&query.root)?;

        let mut sql = format!("SELECT {} FROM papers p", PAPER_COLUMNS);
        let mut binds = Vec::new();
        if let Some(predicate) = predicate {
            sql.push_str(" WHERE ");
            sql.push_str(&predicate.sql);
            binds = predicate.binds;
        }
        sql.push(' ');
        sql.push_str(ORDER_AND_PAGE);
        tracing::debug!(sql = %sql, binds = binds.len(), "Compiled complex search");

        let mut query_builder = sqlx::query_as::<_, PaperRow>(&sql);
        for value in binds {
            query_builder = match value {
                SqlValue::String(s) => query_builder.bind(s),
                SqlValue::Integer(i) => query_builder.bind(i),
            };
        }
        let rows = query_builder
            .bind(limit)
            .bind(skip)
            .fetch_all(&self.pool)
            .await?;

        self.hydrate(rows).await
    }

    /// Flat search form: every present filter must hold
    pub async fn search_papers(
        &self,
        filters: &SearchFilters,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<PaperRecord>> {
        let query = ComplexSearchQuery::new(filters.to_group());
        self.search_papers_complex(&query, skip, limit).await
    }

    /// Attaches venue, authors (in author order) and tags to each row, keeping row order
    async fn hydrate(&self, rows: Vec<PaperRow>) -> Result<Vec<PaperRecord>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let paper_ids: Vec<i64> = rows.iter().map(|r| r.id).collect();

        let sql = format!(
            r#"SELECT pa.paper_id, pa.author_order, pa.is_corresponding,
                      a.id, a.name, a.email, a.affiliation, a.created_at
               FROM paper_authors pa JOIN authors a ON a.id = pa.author_id
               WHERE pa.paper_id IN ({})
               ORDER BY pa.paper_id, pa.author_order"#,
            placeholders(paper_ids.len())
        );
        let mut authors_query = sqlx::query_as::<_, PaperAuthorRow>(&sql);
        for id in &paper_ids {
            authors_query = authors_query.bind(*id);
        }
        let mut authors: HashMap<i64, Vec<PaperAuthor>> = HashMap::new();
        for row in authors_query.fetch_all(&self.pool).await? {
            authors.entry(row.paper_id).or_default().push(PaperAuthor {
                author_order: row.author_order,
                is_corresponding: row.is_corresponding,
                author: Author {
                    id: row.id,
                    name: row.name,
                    email: row.email,
                    affiliation: row.affiliation,
                    created_at: row.created_at,
                },
            });
        }

        let sql = format!(
            r#"SELECT pt.paper_id, t.id, t.name, t.color
               FROM paper_tags pt JOIN tags t ON t.id = pt.tag_id
               WHERE pt.paper_id IN ({})
               ORDER BY t.name"#,
            placeholders(paper_ids.len())
        );
        let mut tags_query = sqlx::query_as::<_, PaperTagRow>(&sql);
        for id in &paper_ids {
            tags_query = tags_query.bind(*id);
        }
        let mut tags: HashMap<i64, Vec<Tag>> = HashMap::new();
        for row in tags_query.fetch_all(&self.pool).await? {
            tags.entry(row.paper_id).or_default().push(Tag {
                id: row.id,
                name: row.name,
                color: row.color,
            });
        }

        let venue_ids = dedupe_ids(&rows.iter().filter_map(|r| r.venue_id).collect::<Vec<_>>());
        let mut venues: HashMap<i64, Venue> = HashMap::new();
        if !venue_ids.is_empty() {
            let sql = format!(
                "SELECT id, name, type, impact_factor, created_at FROM venues WHERE id IN ({})",
                placeholders(venue_ids.len())
            );
            let mut venues_query = sqlx::query_as::<_, Venue>(&sql);
            for id in &venue_ids {
                venues_query = venues_query.bind(*id);
            }
            for venue in venues_query.fetch_all(&self.pool).await? {
                venues.insert(venue.id, venue);
            }
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let paper = Paper::from(row);
                PaperRecord {
                    venue: paper.venue_id.and_then(|id| venues.get(&id).cloned()),
                    authors: authors.remove(&paper.id).unwrap_or_default(),
                    tags: tags.remove(&paper.id).unwrap_or_default(),
                    paper,
                }
            })
            .collect())
    }
}

/// Validates and inserts a paper with its author and tag links inside `tx`
pub(super) async fn insert_paper(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    params: &PaperCreate,
) -> Result<i64> {
    let title = validate_paper_create(params)?;
    let keywords = serde_json::to_string(&params.keywords)?;

    let paper_id: i64 = sqlx::query_scalar(
        r#"INSERT INTO papers (title, title_folded, abstract, abstract_folded, publication_year,
                               doi, citation_count, venue_id, url, keywords)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
           RETURNING id"#,
    )
    .bind(&title)
    .bind(fold_text(&title))
    .bind(&params.abstract_text)
    .bind(params.abstract_text.as_deref().map(fold_text))
    .bind(params.publication_year)
    .bind(&params.doi)
    .bind(params.citation_count)
    .bind(params.venue_id)
    .bind(&params.url)
    .bind(keywords)
    .fetch_one(&mut **tx)
    .await
    .context("Failed to insert paper")?;

    insert_authors(tx, paper_id, &params.author_ids, params.corresponding_author_id).await?;
    insert_tags(tx, paper_id, &params.tag_ids).await?;
    Ok(paper_id)
}

/// Field checks of a new paper; returns the trimmed title
pub(super) fn validate_paper_create(params: &PaperCreate) -> Result<String> {
    let title = validate_name("Title", &params.title, 1000)?;
    validate_publication_year(params.publication_year)?;
    validate_citation_count(params.citation_count)?;
    validate_optional_fields(params.doi.as_deref(), params.url.as_deref())?;
    Ok(title)
}

async fn insert_authors(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    paper_id: i64,
    author_ids: &[i64],
    corresponding_author_id: Option<i64>,
) -> Result<()> {
    for (index, author_id) in dedupe_ids(author_ids).into_iter().enumerate() {
        sqlx::query(
            r#"INSERT INTO paper_authors (paper_id, author_id, author_order, is_corresponding)
               VALUES (?, ?, ?, ?)"#,
        )
        .bind(paper_id)
        .bind(author_id)
        .bind(index as i64 + 1)
        .bind(corresponding_author_id == Some(author_id))
        .execute(&mut **tx)
        .await
        .with_context(|| format!("Failed to link author {} to paper {}", author_id, paper_id))?;
    }
    Ok(())
}

async fn insert_tags(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    paper_id: i64,
    tag_ids: &[i64],
) -> Result<()> {
    for tag_id in dedupe_ids(tag_ids) {
        sqlx::query("INSERT INTO paper_tags (paper_id, tag_id) VALUES (?, ?)")
            .bind(paper_id)
            .bind(tag_id)
            .execute(&mut **tx)
            .await
            .with_context(|| format!("Failed to tag paper {} with tag {}", paper_id, tag_id))?;
    }
    Ok(())
}
