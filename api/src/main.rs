mod api_handlers;
mod database;
mod paper_storage;
mod request_logging;
mod search;
mod validation;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use database::core::check_schema_applied;
use database::{ColumnMapping, Database, DEFAULT_DATABASE_URL};
use paper_storage::PaperStorage;
use poem::{
    handler, listener::TcpListener, middleware::Cors, web::Json, Endpoint, EndpointExt, Route,
    Server,
};
use request_logging::RequestLogging;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "api-server")]
#[command(about = "Paper library API server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve,
    /// Import papers from a Web of Science export (CSV, TSV or Excel workbook)
    Import {
        /// Path to the export file; `.xlsx`, `.xls` and `.ods` are read as workbooks
        path: PathBuf,
        /// The file is tab-separated
        #[arg(long)]
        tsv: bool,
    },
    /// Check that the database is reachable and migrated
    Doctor,
}

#[derive(Debug, Serialize, Deserialize)]
struct HealthResponse {
    success: bool,
    message: String,
    environment: String,
}

struct AppContext {
    database: Arc<Database>,
    storage: Arc<PaperStorage>,
}

fn database_url() -> String {
    env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

fn data_dir() -> PathBuf {
    env::var("DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./data"))
}

async fn setup_app_context() -> Result<AppContext> {
    let database_url = database_url();
    let database = match Database::new(&database_url).await {
        Ok(db) => {
            tracing::info!("Database initialized at {}", database_url);
            Arc::new(db)
        }
        Err(e) => {
            tracing::error!("Failed to initialize database at {}: {:#}", database_url, e);
            return Err(e.context("Database initialization failed"));
        }
    };

    let data_dir = data_dir();
    tracing::info!("Storing paper PDFs under {}", data_dir.display());
    let storage = Arc::new(PaperStorage::new(data_dir));

    Ok(AppContext { database, storage })
}

#[handler]
async fn health() -> Json<HealthResponse> {
    let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
    Json(HealthResponse {
        success: true,
        message: "Paper library API is running".to_string(),
        environment,
    })
}

fn build_app(database: Arc<Database>, storage: Arc<PaperStorage>) -> impl Endpoint {
    Route::new()
        // Health check
        .at("/api/v1/health", poem::get(health))
        // Paper endpoints
        .at(
            "/api/v1/papers",
            poem::get(api_handlers::list_papers).post(api_handlers::create_paper),
        )
        .at(
            "/api/v1/papers/search",
            poem::get(api_handlers::search_papers),
        )
        .at(
            "/api/v1/papers/search/complex",
            poem::post(api_handlers::search_papers_complex),
        )
        .at(
            "/api/v1/papers/:id",
            poem::get(api_handlers::get_paper)
                .put(api_handlers::update_paper)
                .delete(api_handlers::delete_paper),
        )
        .at(
            "/api/v1/papers/:id/pdf",
            poem::get(api_handlers::download_pdf).put(api_handlers::upload_pdf),
        )
        // Author endpoints
        .at(
            "/api/v1/authors",
            poem::get(api_handlers::list_authors).post(api_handlers::create_author),
        )
        .at("/api/v1/authors/:id", poem::get(api_handlers::get_author))
        // Tag endpoints
        .at(
            "/api/v1/tags",
            poem::get(api_handlers::list_tags).post(api_handlers::create_tag),
        )
        // Venue endpoints
        .at(
            "/api/v1/venues",
            poem::get(api_handlers::list_venues).post(api_handlers::create_venue),
        )
        .at("/api/v1/venues/:id", poem::get(api_handlers::get_venue))
        // Import endpoints
        .at(
            "/api/v1/import/csv/preview",
            poem::post(api_handlers::import_csv_preview),
        )
        .at("/api/v1/import/csv", poem::post(api_handlers::import_csv))
        .at(
            "/api/v1/import/excel/preview",
            poem::post(api_handlers::import_excel_preview),
        )
        .at("/api/v1/import/excel", poem::post(api_handlers::import_excel))
        .data(database)
        .data(storage)
        .with(RequestLogging)
        .with(Cors::new())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load .env file if it exists
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Serve => serve_command().await,
        Commands::Import { path, tsv } => import_command(&path, tsv).await,
        Commands::Doctor => doctor_command().await,
    }
}

async fn serve_command() -> Result<()> {
    let port = env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let addr = format!("0.0.0.0:{}", port);

    let ctx = setup_app_context().await?;

    tracing::info!("Starting paper library API server on {}", addr);

    let app = build_app(ctx.database, ctx.storage);
    Server::new(TcpListener::bind(&addr)).run(app).await?;
    Ok(())
}

fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_lowercase().as_str(), "xlsx" | "xls" | "ods"))
        .unwrap_or(false)
}

async fn import_command(path: &Path, tsv: bool) -> Result<()> {
    let ctx = setup_app_context().await?;
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let mapping = ColumnMapping::default();
    let result = if is_workbook(path) {
        ctx.database.import_papers_workbook(&bytes, &mapping).await?
    } else {
        let content = String::from_utf8(bytes)
            .with_context(|| format!("{} is not valid UTF-8", path.display()))?;
        let delimiter = if tsv { b'\t' } else { b',' };
        ctx.database
            .import_papers_csv(&content, delimiter, &mapping)
            .await?
    };

    for error in &result.errors {
        tracing::warn!(row = error.row, "{}", error.message);
    }
    println!(
        "Imported {} of {} rows ({} failed)",
        result.successful_imports, result.total_rows, result.failed_imports
    );
    Ok(())
}

async fn doctor_command() -> Result<()> {
    let database_url = database_url();
    println!("Checking database at {}", database_url);

    let applied = check_schema_applied(&database_url)
        .await
        .with_context(|| format!("Cannot connect to {}", database_url))?;
    if !applied {
        anyhow::bail!("Database schema is missing; run `api-server serve` once to migrate");
    }
    println!("Database schema: OK");

    let data_dir = data_dir();
    if data_dir.is_dir() {
        println!("Data directory {}: OK", data_dir.display());
    } else {
        println!(
            "Data directory {} does not exist yet; it is created on first upload",
            data_dir.display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod main_tests;
#[cfg(test)]
mod tests;
