//! Bulk import of bibliographic exports (Web of Science style CSV, TSV or Excel workbook).
//!
//! Each row becomes one paper. A row that cannot be imported is reported with its line number
//! and does not stop the rest of the file. Workbooks are read from their first sheet, whose
//! first row holds the headers.

use super::authors::find_or_create_author_in;
use super::papers::{insert_paper, validate_paper_create, PaperCreate};
use super::types::Database;
use super::venues::find_or_create_venue_in;
use anyhow::{Context, Result};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::OnceLock;

/// Rows shown by a preview
pub const PREVIEW_ROWS: usize = 5;

static YEAR_REGEX: OnceLock<Regex> = OnceLock::new();

fn year_regex() -> &'static Regex {
    YEAR_REGEX.get_or_init(|| Regex::new(r"\b(\d{4})\b").unwrap())
}

/// Source header for each paper attribute. Optional attributes are skipped when their
/// header is unset or absent from the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    pub title: String,
    pub authors: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub publication_year: Option<String>,
    /// Fallback when the year column is empty; the first four-digit number is taken
    pub publication_date: Option<String>,
    pub doi: Option<String>,
    pub citation_count: Option<String>,
    pub source_title: Option<String>,
    pub publication_type: Option<String>,
    pub author_keywords: Option<String>,
    pub keywords_plus: Option<String>,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            title: "Article Title".to_string(),
            authors: Some("Authors".to_string()),
            abstract_text: Some("Abstract".to_string()),
            publication_year: Some("Publication Year".to_string()),
            publication_date: Some("Publication Date".to_string()),
            doi: Some("DOI".to_string()),
            citation_count: Some("Times Cited, WoS Core".to_string()),
            source_title: Some("Source Title".to_string()),
            publication_type: Some("Publication Type".to_string()),
            author_keywords: Some("Author Keywords".to_string()),
            keywords_plus: Some("Keywords Plus".to_string()),
        }
    }
}

impl ColumnMapping {
    fn headers(&self) -> Vec<&str> {
        let optional = [
            &self.authors,
            &self.abstract_text,
            &self.publication_year,
            &self.publication_date,
            &self.doi,
            &self.citation_count,
            &self.source_title,
            &self.publication_type,
            &self.author_keywords,
            &self.keywords_plus,
        ];
        std::iter::once(self.title.as_str())
            .chain(optional.into_iter().filter_map(|h| h.as_deref()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportPreview {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub total_rows: usize,
    pub mapping: ColumnMapping,
    /// Mapped headers not present in the file
    pub missing_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportError {
    pub row: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportResult {
    pub total_rows: usize,
    pub successful_imports: usize,
    pub failed_imports: usize,
    pub errors: Vec<ImportError>,
    pub imported_ids: Vec<i64>,
}

impl ImportResult {
    fn fail(&mut self, row: usize, message: impl Into<String>) {
        self.failed_imports += 1;
        self.errors.push(ImportError {
            row,
            message: message.into(),
        });
    }
}

/// One data row after column mapping, before touching the store
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    pub title: String,
    pub abstract_text: Option<String>,
    pub publication_year: i64,
    pub doi: Option<String>,
    pub citation_count: i64,
    pub source_title: Option<String>,
    pub venue_type: &'static str,
    pub keywords: Vec<String>,
    pub authors: Vec<String>,
}

/// Header row and data rows of an export, whatever file format it came in
#[derive(Debug, Clone, Default)]
pub struct SourceTable {
    pub headers: Vec<String>,
    /// Data rows with their line number in the source file; `Err` holds a parse failure
    pub rows: Vec<(usize, Result<csv::StringRecord, String>)>,
}

impl SourceTable {
    pub fn from_delimited(content: &str, delimiter: u8) -> Result<Self> {
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(content.as_bytes());

        let headers = reader
            .headers()
            .context("Failed to read CSV header")?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let rows = reader
            .records()
            .enumerate()
            .map(|(idx, record)| {
                // header is line 1
                (idx + 2, record.map_err(|e| format!("CSV parse error: {}", e)))
            })
            .collect();

        Ok(Self { headers, rows })
    }

    /// Reads the first sheet of an `.xlsx`, `.xls` or `.ods` workbook. Blank rows are skipped.
    pub fn from_workbook(bytes: &[u8]) -> Result<Self> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
            .context("Failed to open workbook")?;
        let range = workbook
            .worksheet_range_at(0)
            .context("Workbook has no sheets")?
            .context("Failed to read the first sheet")?;
        let first_line = range.start().map(|(row, _)| row as usize + 1).unwrap_or(1);

        let mut lines = range.rows().enumerate();
        let headers = match lines.next() {
            Some((_, cells)) => cells
                .iter()
                .map(|c| cell_text(c).trim().to_string())
                .collect(),
            None => anyhow::bail!("First sheet is empty"),
        };
        let rows = lines
            .filter(|(_, cells)| cells.iter().any(|c| !cell_text(c).trim().is_empty()))
            .map(|(idx, cells)| {
                let record: csv::StringRecord = cells.iter().map(cell_text).collect();
                (first_line + idx, Ok(record))
            })
            .collect();

        Ok(Self { headers, rows })
    }

    fn columns(&self) -> HashMap<String, usize> {
        self.headers
            .iter()
            .enumerate()
            .map(|(idx, h)| (h.clone(), idx))
            .collect()
    }
}

/// Spreadsheet cell as the text a CSV export would carry. Whole floats lose their `.0`
/// so years and citation counts parse as integers.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for item in raw.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        if !items.iter().any(|existing| existing == item) {
            items.push(item.to_string());
        }
    }
    items
}

pub fn extract_year(raw: &str) -> Option<i64> {
    year_regex()
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Maps one record onto paper attributes. `Err` carries the reason the row is rejected.
pub fn parse_row(
    columns: &HashMap<String, usize>,
    record: &csv::StringRecord,
    mapping: &ColumnMapping,
) -> Result<ParsedRow, String> {
    let get = |header: Option<&str>| -> Option<String> {
        header
            .and_then(|h| columns.get(h))
            .and_then(|idx| record.get(*idx))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let title = get(Some(mapping.title.as_str())).ok_or("Title is empty")?;

    let publication_year = match get(mapping.publication_year.as_deref()) {
        Some(raw) => raw
            .parse::<i64>()
            .ok()
            .or_else(|| extract_year(&raw)),
        None => get(mapping.publication_date.as_deref()).and_then(|raw| extract_year(&raw)),
    }
    .ok_or("Publication year could not be determined")?;

    let citation_count = get(mapping.citation_count.as_deref())
        .and_then(|raw| raw.parse::<i64>().ok())
        .unwrap_or(0);

    let venue_type = match get(mapping.publication_type.as_deref()) {
        Some(kind) if matches!(kind.to_uppercase().as_str(), "P" | "PROCEEDINGS") => "conference",
        _ => "journal",
    };

    let mut keywords = Vec::new();
    for raw in [
        get(mapping.author_keywords.as_deref()),
        get(mapping.keywords_plus.as_deref()),
    ]
    .into_iter()
    .flatten()
    {
        for keyword in split_list(&raw) {
            if !keywords.contains(&keyword) {
                keywords.push(keyword);
            }
        }
    }

    Ok(ParsedRow {
        title,
        abstract_text: get(mapping.abstract_text.as_deref()),
        publication_year,
        doi: get(mapping.doi.as_deref()),
        citation_count,
        source_title: get(mapping.source_title.as_deref()),
        venue_type,
        keywords,
        authors: get(mapping.authors.as_deref())
            .map(|raw| split_list(&raw))
            .unwrap_or_default(),
    })
}

/// Headers, the first rows and the default mapping of an export, without importing anything
pub fn preview_table(table: &SourceTable) -> Result<ImportPreview> {
    let mut rows = Vec::new();
    for (line, record) in &table.rows {
        let record = match record {
            Ok(record) => record,
            Err(message) => anyhow::bail!("Failed to parse row {}: {}", line, message),
        };
        if rows.len() < PREVIEW_ROWS {
            rows.push(record.iter().map(str::to_string).collect());
        }
    }

    let mapping = ColumnMapping::default();
    let missing_columns = mapping
        .headers()
        .into_iter()
        .filter(|h| !table.headers.iter().any(|existing| existing == h))
        .map(str::to_string)
        .collect();

    Ok(ImportPreview {
        headers: table.headers.clone(),
        rows,
        total_rows: table.rows.len(),
        mapping,
        missing_columns,
    })
}

pub fn preview_csv(content: &str, delimiter: u8) -> Result<ImportPreview> {
    preview_table(&SourceTable::from_delimited(content, delimiter)?)
}

pub fn preview_workbook(bytes: &[u8]) -> Result<ImportPreview> {
    preview_table(&SourceTable::from_workbook(bytes)?)
}

impl Database {
    pub async fn import_papers_csv(
        &self,
        content: &str,
        delimiter: u8,
        mapping: &ColumnMapping,
    ) -> Result<ImportResult> {
        let table = SourceTable::from_delimited(content, delimiter)?;
        self.import_table(&table, mapping).await
    }

    pub async fn import_papers_workbook(
        &self,
        bytes: &[u8],
        mapping: &ColumnMapping,
    ) -> Result<ImportResult> {
        let table = SourceTable::from_workbook(bytes)?;
        self.import_table(&table, mapping).await
    }

    pub async fn import_table(
        &self,
        table: &SourceTable,
        mapping: &ColumnMapping,
    ) -> Result<ImportResult> {
        let columns = table.columns();
        if !columns.contains_key(&mapping.title) {
            anyhow::bail!("Title column '{}' not found in header", mapping.title);
        }

        let mut result = ImportResult::default();
        for (line, record) in &table.rows {
            result.total_rows += 1;

            let parsed = record
                .as_ref()
                .map_err(Clone::clone)
                .and_then(|record| parse_row(&columns, record, mapping));
            let parsed = match parsed {
                Ok(parsed) => parsed,
                Err(message) => {
                    result.fail(*line, message);
                    continue;
                }
            };

            match self.import_row(parsed).await {
                Ok(paper_id) => {
                    result.successful_imports += 1;
                    result.imported_ids.push(paper_id);
                }
                Err(e) => result.fail(*line, e.to_string()),
            }
        }

        tracing::info!(
            total = result.total_rows,
            imported = result.successful_imports,
            failed = result.failed_imports,
            "Import finished"
        );
        Ok(result)
    }

    /// Imports one parsed row. Venue, authors and paper are written in one transaction, so a
    /// rejected row leaves nothing behind.
    async fn import_row(&self, row: ParsedRow) -> Result<i64> {
        if let Some(doi) = &row.doi {
            if self.find_paper_id_by_doi(doi).await?.is_some() {
                anyhow::bail!("DOI {} already exists", doi);
            }
        }
        if self.find_paper_id_by_title(&row.title).await?.is_some() {
            anyhow::bail!("Title '{}' already exists", row.title);
        }

        let mut params = PaperCreate {
            title: row.title,
            abstract_text: row.abstract_text,
            publication_year: row.publication_year,
            doi: row.doi,
            citation_count: row.citation_count,
            keywords: row.keywords,
            ..Default::default()
        };
        validate_paper_create(&params)?;

        let mut tx = self.pool.begin().await?;
        if let Some(name) = &row.source_title {
            let venue = find_or_create_venue_in(&mut tx, name, row.venue_type).await?;
            params.venue_id = Some(venue.id);
        }
        for name in &row.authors {
            params
                .author_ids
                .push(find_or_create_author_in(&mut tx, name).await?.id);
        }
        let paper_id = insert_paper(&mut tx, &params).await?;
        tx.commit().await?;

        tracing::debug!(paper_id, "Imported paper");
        Ok(paper_id)
    }
}
