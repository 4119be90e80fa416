use crate::database::authors::AuthorCreate;
use crate::database::tags::TagCreate;
use crate::database::venues::VenueCreate;
use crate::database::{
    import::{preview_csv, preview_workbook},
    Author, ColumnMapping, Database, ImportPreview, ImportResult, PaperCreate, PaperRecord,
    PaperUpdate, Tag, Venue,
};
use crate::paper_storage::PaperStorage;
use crate::search::SearchFilters;
use paper_common::{QueryError, SearchRequest};
use poem::{
    handler,
    http::{header, StatusCode},
    web::{Data, Json, Path, Query},
    Body, Response, Result as PoemResult,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// Common response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    /// Set when the failure is transient and the same request may succeed later
    #[serde(default)]
    pub retryable: bool,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            retryable: false,
        }
    }

    pub fn error(msg: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg),
            retryable: false,
        }
    }

    pub fn unavailable(msg: String) -> Self {
        Self {
            retryable: true,
            ..Self::error(msg)
        }
    }
}

// Query parameters for pagination
#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

#[derive(Debug, Deserialize)]
pub struct PdfUploadQuery {
    pub file_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ImportQuery {
    /// Tab-separated instead of comma-separated
    #[serde(default)]
    pub tsv: bool,
    /// Column mapping as JSON; the Web of Science headers when absent
    pub mapping: Option<String>,
}

impl ImportQuery {
    fn delimiter(&self) -> u8 {
        if self.tsv {
            b'\t'
        } else {
            b','
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WorkbookImportQuery {
    /// Column mapping as JSON; the Web of Science headers when absent
    pub mapping: Option<String>,
}

fn parse_mapping(raw: Option<&str>) -> Result<ColumnMapping, String> {
    match raw {
        Some(raw) => serde_json::from_str::<ColumnMapping>(raw)
            .map_err(|e| format!("Invalid column mapping: {}", e)),
        None => Ok(ColumnMapping::default()),
    }
}

type JsonReply<T> = (StatusCode, Json<ApiResponse<T>>);

/// Validation failures are the caller's fault; anything else comes from the store
fn search_failure<T>(err: anyhow::Error) -> JsonReply<T> {
    if let Some(query_err) = err.downcast_ref::<QueryError>() {
        tracing::debug!(error = %query_err, "Rejected search query");
        (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(query_err.to_string())),
        )
    } else {
        tracing::error!(error = %err, "Search failed");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse::unavailable(
                "Search is temporarily unavailable".to_string(),
            )),
        )
    }
}

async fn read_body(body: Body) -> Result<Vec<u8>, String> {
    body.into_vec()
        .await
        .map_err(|e| format!("Failed to read body: {}", e))
}

async fn read_text_body(body: Body) -> Result<String, String> {
    let bytes = read_body(body).await?;
    String::from_utf8(bytes).map_err(|e| format!("Body is not valid UTF-8: {}", e))
}

// ============ Paper Endpoints ============

#[handler]
pub async fn list_papers(
    db: Data<&Arc<Database>>,
    Query(params): Query<PaginationQuery>,
) -> PoemResult<Json<ApiResponse<Vec<PaperRecord>>>> {
    match db.list_papers(params.skip, params.limit).await {
        Ok(papers) => Ok(Json(ApiResponse::success(papers))),
        Err(e) => Ok(Json(ApiResponse::error(e.to_string()))),
    }
}

#[handler]
pub async fn create_paper(
    db: Data<&Arc<Database>>,
    Json(params): Json<PaperCreate>,
) -> PoemResult<Json<ApiResponse<PaperRecord>>> {
    match db.create_paper(params).await {
        Ok(paper) => Ok(Json(ApiResponse::success(paper))),
        Err(e) => Ok(Json(ApiResponse::error(format!("{:#}", e)))),
    }
}

#[handler]
pub async fn get_paper(
    db: Data<&Arc<Database>>,
    Path(paper_id): Path<i64>,
) -> PoemResult<Json<ApiResponse<PaperRecord>>> {
    match db.get_paper(paper_id).await {
        Ok(Some(paper)) => Ok(Json(ApiResponse::success(paper))),
        Ok(None) => Ok(Json(ApiResponse::error("Paper not found".to_string()))),
        Err(e) => Ok(Json(ApiResponse::error(e.to_string()))),
    }
}

#[handler]
pub async fn update_paper(
    db: Data<&Arc<Database>>,
    Path(paper_id): Path<i64>,
    Json(params): Json<PaperUpdate>,
) -> PoemResult<Json<ApiResponse<PaperRecord>>> {
    match db.update_paper(paper_id, params).await {
        Ok(Some(paper)) => Ok(Json(ApiResponse::success(paper))),
        Ok(None) => Ok(Json(ApiResponse::error("Paper not found".to_string()))),
        Err(e) => Ok(Json(ApiResponse::error(format!("{:#}", e)))),
    }
}

#[handler]
pub async fn delete_paper(
    db: Data<&Arc<Database>>,
    Path(paper_id): Path<i64>,
) -> PoemResult<Json<ApiResponse<bool>>> {
    match db.delete_paper(paper_id).await {
        Ok(true) => Ok(Json(ApiResponse::success(true))),
        Ok(false) => Ok(Json(ApiResponse::error("Paper not found".to_string()))),
        Err(e) => Ok(Json(ApiResponse::error(e.to_string()))),
    }
}

// ============ Search Endpoints ============

#[handler]
pub async fn search_papers(
    db: Data<&Arc<Database>>,
    Query(filters): Query<SearchFilters>,
    Query(page): Query<PaginationQuery>,
) -> JsonReply<Vec<PaperRecord>> {
    match db.search_papers(&filters, page.skip, page.limit).await {
        Ok(papers) => (StatusCode::OK, Json(ApiResponse::success(papers))),
        Err(e) => search_failure(e),
    }
}

/// Evaluates a filter tree. The body is parsed here rather than by the `Json` extractor so a
/// malformed query (unknown field or operator, wrong shape) gets the same 400 reply as any
/// other invalid query.
#[handler]
pub async fn search_papers_complex(
    db: Data<&Arc<Database>>,
    body: Body,
) -> JsonReply<Vec<PaperRecord>> {
    let bytes = match body.into_vec().await {
        Ok(bytes) => bytes,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::error(format!("Failed to read body: {}", e))),
            )
        }
    };
    let request: SearchRequest = match serde_json::from_slice(&bytes) {
        Ok(request) => request,
        Err(e) => {
            let err = QueryError::Malformed(e.to_string());
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::error(err.to_string())),
            );
        }
    };

    match db
        .search_papers_complex(&request.query(), request.skip, request.limit)
        .await
    {
        Ok(papers) => {
            tracing::debug!(results = papers.len(), "Complex search completed");
            (StatusCode::OK, Json(ApiResponse::success(papers)))
        }
        Err(e) => search_failure(e),
    }
}

// ============ PDF Endpoints ============

#[handler]
pub async fn upload_pdf(
    db: Data<&Arc<Database>>,
    storage: Data<&Arc<PaperStorage>>,
    Path(paper_id): Path<i64>,
    Query(params): Query<PdfUploadQuery>,
    body: Body,
) -> PoemResult<Json<ApiResponse<PaperRecord>>> {
    let previous_file = match db.get_paper(paper_id).await {
        Ok(Some(record)) => record.paper.pdf_file_path,
        Ok(None) => return Ok(Json(ApiResponse::error("Paper not found".to_string()))),
        Err(e) => return Ok(Json(ApiResponse::error(e.to_string()))),
    };

    let bytes = match body.into_vec().await {
        Ok(bytes) => bytes,
        Err(e) => {
            return Ok(Json(ApiResponse::error(format!(
                "Failed to read body: {}",
                e
            ))))
        }
    };

    let stored = match storage.save_pdf(paper_id, &params.file_name, &bytes).await {
        Ok(stored) => stored,
        Err(e) => return Ok(Json(ApiResponse::error(format!("{:#}", e)))),
    };

    if let Err(e) = db
        .set_paper_file(paper_id, &stored.relative_path, stored.size)
        .await
    {
        return Ok(Json(ApiResponse::error(e.to_string())));
    }

    if let Some(previous) = previous_file.filter(|p| *p != stored.relative_path) {
        if let Err(e) = storage.remove_pdf(&previous).await {
            tracing::warn!(paper_id, path = %previous, error = %e, "Failed to remove replaced PDF");
        }
    }

    match db.get_paper(paper_id).await {
        Ok(Some(paper)) => Ok(Json(ApiResponse::success(paper))),
        Ok(None) => Ok(Json(ApiResponse::error("Paper not found".to_string()))),
        Err(e) => Ok(Json(ApiResponse::error(e.to_string()))),
    }
}

#[handler]
pub async fn download_pdf(
    db: Data<&Arc<Database>>,
    storage: Data<&Arc<PaperStorage>>,
    Path(paper_id): Path<i64>,
) -> PoemResult<Response> {
    let paper = db
        .get_paper(paper_id)
        .await
        .map_err(|e| poem::Error::from_string(e.to_string(), StatusCode::SERVICE_UNAVAILABLE))?
        .ok_or_else(|| poem::Error::from_string("Paper not found", StatusCode::NOT_FOUND))?;

    let path = paper.paper.pdf_file_path.ok_or_else(|| {
        poem::Error::from_string("Paper has no PDF", StatusCode::NOT_FOUND)
    })?;

    let bytes = storage
        .load_pdf(&path)
        .await
        .map_err(|e| poem::Error::from_string(e.to_string(), StatusCode::INTERNAL_SERVER_ERROR))?
        .ok_or_else(|| poem::Error::from_string("PDF file is missing", StatusCode::NOT_FOUND))?;

    let file_name = path.rsplit('/').next().unwrap_or("paper.pdf");
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{}\"", file_name),
        )
        .body(bytes))
}

// ============ Author, Tag and Venue Endpoints ============

#[handler]
pub async fn list_authors(
    db: Data<&Arc<Database>>,
    Query(params): Query<PaginationQuery>,
) -> PoemResult<Json<ApiResponse<Vec<Author>>>> {
    match db.list_authors(params.skip, params.limit).await {
        Ok(authors) => Ok(Json(ApiResponse::success(authors))),
        Err(e) => Ok(Json(ApiResponse::error(e.to_string()))),
    }
}

#[handler]
pub async fn create_author(
    db: Data<&Arc<Database>>,
    Json(params): Json<AuthorCreate>,
) -> PoemResult<Json<ApiResponse<Author>>> {
    match db.create_author(params).await {
        Ok(author) => Ok(Json(ApiResponse::success(author))),
        Err(e) => Ok(Json(ApiResponse::error(e.to_string()))),
    }
}

#[handler]
pub async fn get_author(
    db: Data<&Arc<Database>>,
    Path(author_id): Path<i64>,
) -> PoemResult<Json<ApiResponse<Author>>> {
    match db.get_author(author_id).await {
        Ok(Some(author)) => Ok(Json(ApiResponse::success(author))),
        Ok(None) => Ok(Json(ApiResponse::error("Author not found".to_string()))),
        Err(e) => Ok(Json(ApiResponse::error(e.to_string()))),
    }
}

#[handler]
pub async fn list_tags(db: Data<&Arc<Database>>) -> PoemResult<Json<ApiResponse<Vec<Tag>>>> {
    match db.list_tags().await {
        Ok(tags) => Ok(Json(ApiResponse::success(tags))),
        Err(e) => Ok(Json(ApiResponse::error(e.to_string()))),
    }
}

#[handler]
pub async fn create_tag(
    db: Data<&Arc<Database>>,
    Json(params): Json<TagCreate>,
) -> PoemResult<Json<ApiResponse<Tag>>> {
    match db.create_tag(params).await {
        Ok(tag) => Ok(Json(ApiResponse::success(tag))),
        Err(e) => Ok(Json(ApiResponse::error(e.to_string()))),
    }
}

#[handler]
pub async fn list_venues(db: Data<&Arc<Database>>) -> PoemResult<Json<ApiResponse<Vec<Venue>>>> {
    match db.list_venues().await {
        Ok(venues) => Ok(Json(ApiResponse::success(venues))),
        Err(e) => Ok(Json(ApiResponse::error(e.to_string()))),
    }
}

#[handler]
pub async fn create_venue(
    db: Data<&Arc<Database>>,
    Json(params): Json<VenueCreate>,
) -> PoemResult<Json<ApiResponse<Venue>>> {
    match db.create_venue(params).await {
        Ok(venue) => Ok(Json(ApiResponse::success(venue))),
        Err(e) => Ok(Json(ApiResponse::error(e.to_string()))),
    }
}

#[handler]
pub async fn get_venue(
    db: Data<&Arc<Database>>,
    Path(venue_id): Path<i64>,
) -> PoemResult<Json<ApiResponse<Venue>>> {
    match db.get_venue(venue_id).await {
        Ok(Some(venue)) => Ok(Json(ApiResponse::success(venue))),
        Ok(None) => Ok(Json(ApiResponse::error("Venue not found".to_string()))),
        Err(e) => Ok(Json(ApiResponse::error(e.to_string()))),
    }
}

// ============ Import Endpoints ============

#[handler]
pub async fn import_csv_preview(
    Query(params): Query<ImportQuery>,
    body: Body,
) -> PoemResult<Json<ApiResponse<ImportPreview>>> {
    let content = match read_text_body(body).await {
        Ok(content) => content,
        Err(e) => return Ok(Json(ApiResponse::error(e))),
    };
    match preview_csv(&content, params.delimiter()) {
        Ok(preview) => Ok(Json(ApiResponse::success(preview))),
        Err(e) => Ok(Json(ApiResponse::error(format!("{:#}", e)))),
    }
}

#[handler]
pub async fn import_csv(
    db: Data<&Arc<Database>>,
    Query(params): Query<ImportQuery>,
    body: Body,
) -> PoemResult<Json<ApiResponse<ImportResult>>> {
    let mapping = match parse_mapping(params.mapping.as_deref()) {
        Ok(mapping) => mapping,
        Err(e) => return Ok(Json(ApiResponse::error(e))),
    };
    let content = match read_text_body(body).await {
        Ok(content) => content,
        Err(e) => return Ok(Json(ApiResponse::error(e))),
    };

    match db
        .import_papers_csv(&content, params.delimiter(), &mapping)
        .await
    {
        Ok(result) => Ok(Json(ApiResponse::success(result))),
        Err(e) => Ok(Json(ApiResponse::error(format!("{:#}", e)))),
    }
}

#[handler]
pub async fn import_excel_preview(body: Body) -> PoemResult<Json<ApiResponse<ImportPreview>>> {
    let bytes = match read_body(body).await {
        Ok(bytes) => bytes,
        Err(e) => return Ok(Json(ApiResponse::error(e))),
    };
    match preview_workbook(&bytes) {
        Ok(preview) => Ok(Json(ApiResponse::success(preview))),
        Err(e) => Ok(Json(ApiResponse::error(format!("{:#}", e)))),
    }
}

#[handler]
pub async fn import_excel(
    db: Data<&Arc<Database>>,
    Query(params): Query<WorkbookImportQuery>,
    body: Body,
) -> PoemResult<Json<ApiResponse<ImportResult>>> {
    let mapping = match parse_mapping(params.mapping.as_deref()) {
        Ok(mapping) => mapping,
        Err(e) => return Ok(Json(ApiResponse::error(e))),
    };
    let bytes = match read_body(body).await {
        Ok(bytes) => bytes,
        Err(e) => return Ok(Json(ApiResponse::error(e))),
    };

    match db.import_papers_workbook(&bytes, &mapping).await {
        Ok(result) => Ok(Json(ApiResponse::success(result))),
        Err(e) => Ok(Json(ApiResponse::error(format!("{:#}", e)))),
    }
}
