use super::*;
use crate::database::test_helpers::setup_test_db;
use crate::database::PaperCreate;
use poem::http::{Method, StatusCode, Uri};
use poem::endpoint::BoxEndpoint;
use poem::{Body, Endpoint, EndpointExt, Request};
use regex::Regex;
use serde_json::{json, Value};
use std::collections::HashSet;
use tempfile::TempDir;

const MAIN_RS_SOURCE: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/src/main.rs"));

fn collect_route_paths(source: &str) -> Vec<String> {
    let regex = Regex::new(r#"\.at\(\s*"([^"]+)""#).expect("invalid route regex");
    regex
        .captures_iter(source)
        .map(|captures| captures[1].to_string())
        .collect()
}

fn duplicate_paths(paths: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for path in paths {
        let inserted = seen.insert(path.clone());
        if !inserted && !duplicates.contains(path) {
            duplicates.push(path.clone());
        }
    }
    duplicates
}

#[test]
fn router_configuration_has_unique_paths() {
    let paths = collect_route_paths(MAIN_RS_SOURCE);
    let duplicates = duplicate_paths(&paths);
    assert!(
        duplicates.is_empty(),
        "Duplicate route paths detected: {:?}",
        duplicates
    );
}

#[test]
fn duplicate_detector_identifies_duplicates() {
    let sample = vec![
        "/first".to_string(),
        "/second".to_string(),
        "/first".to_string(),
        "/second".to_string(),
    ];
    let duplicates = duplicate_paths(&sample);
    assert_eq!(
        duplicates,
        vec!["/first".to_string(), "/second".to_string()]
    );
}

#[test]
fn search_routes_configured() {
    let paths = collect_route_paths(MAIN_RS_SOURCE);
    for expected in ["/api/v1/papers/search", "/api/v1/papers/search/complex"] {
        assert!(
            paths.contains(&expected.to_string()),
            "{} should be configured in routes",
            expected
        );
    }
}

struct TestApp {
    database: Arc<Database>,
    app: BoxEndpoint<'static>,
    data_dir: TempDir,
}

async fn setup_app() -> TestApp {
    let database = Arc::new(setup_test_db().await);
    let data_dir = TempDir::new().unwrap();
    let storage = Arc::new(PaperStorage::new(data_dir.path()));
    let app = build_app(database.clone(), storage).map_to_response().boxed();
    TestApp {
        database,
        app,
        data_dir,
    }
}

async fn send(app: &TestApp, method: Method, uri: &'static str, body: Body) -> poem::Response {
    let request = Request::builder()
        .method(method)
        .uri(Uri::from_static(uri))
        .body(body);
    app.app.get_response(request).await
}

async fn send_json(
    app: &TestApp,
    method: Method,
    uri: &'static str,
    body: Value,
) -> poem::Response {
    let request = Request::builder()
        .method(method)
        .uri(Uri::from_static(uri))
        .content_type("application/json")
        .body(body.to_string());
    app.app.get_response(request).await
}

async fn json_body(response: poem::Response) -> Value {
    let text = response.into_body().into_string().await.unwrap();
    serde_json::from_str(&text).unwrap()
}

async fn add_paper(db: &Database, title: &str, year: i64) -> i64 {
    db.create_paper(PaperCreate {
        title: title.to_string(),
        publication_year: year,
        ..Default::default()
    })
    .await
    .unwrap()
    .paper
    .id
}

fn complex_body(value: Value) -> Body {
    Body::from_string(value.to_string())
}

#[tokio::test]
async fn test_health() {
    let app = setup_app().await;
    let response = send(&app, Method::GET, "/api/v1/health", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["success"], true);
}

#[tokio::test]
async fn test_complex_search_returns_matches() {
    let app = setup_app().await;
    let hit = add_paper(&app.database, "Neural fields", 2021).await;
    add_paper(&app.database, "Graph cuts", 2021).await;

    let body = complex_body(json!({
        "root": {
            "id": "root",
            "operator": "AND",
            "conditions": [
                {"id": "c1", "field": "title_keyword", "operator": "contains", "value": "neural"},
                {"id": "c2", "field": "year_from", "operator": "greater_equal", "value": "2020"}
            ],
            "groups": []
        },
        "skip": 0,
        "limit": 10
    }));
    let response = send(&app, Method::POST, "/api/v1/papers/search/complex", body).await;
    assert_eq!(response.status(), StatusCode::OK);
    let value = json_body(response).await;
    assert_eq!(value["success"], true);
    let data = value["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["id"], hit);
    assert_eq!(data[0]["title"], "Neural fields");
}

#[tokio::test]
async fn test_complex_search_defaults_pagination() {
    let app = setup_app().await;
    add_paper(&app.database, "One", 2020).await;
    let body = complex_body(json!({"root": {"id": "r", "operator": "AND"}}));
    let response = send(&app, Method::POST, "/api/v1/papers/search/complex", body).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_complex_search_no_matches_is_ok() {
    let app = setup_app().await;
    let body = complex_body(json!({
        "root": {
            "id": "r",
            "operator": "OR",
            "conditions": [{"id": "c", "field": "tags", "operator": "in", "value": ["none"]}]
        }
    }));
    let response = send(&app, Method::POST, "/api/v1/papers/search/complex", body).await;
    assert_eq!(response.status(), StatusCode::OK);
    let value = json_body(response).await;
    assert_eq!(value["success"], true);
    assert!(value["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_complex_search_rejects_unknown_operator() {
    let app = setup_app().await;
    let body = complex_body(json!({
        "root": {
            "id": "r",
            "operator": "AND",
            "conditions": [{"id": "c", "field": "title_keyword", "operator": "like", "value": "x"}]
        }
    }));
    let response = send(&app, Method::POST, "/api/v1/papers/search/complex", body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let value = json_body(response).await;
    assert_eq!(value["success"], false);
    assert_eq!(value["retryable"], false);
}

#[tokio::test]
async fn test_complex_search_rejects_operator_not_valid_for_field() {
    let app = setup_app().await;
    let body = complex_body(json!({
        "root": {
            "id": "r",
            "operator": "AND",
            "conditions": [{"id": "c", "field": "tags", "operator": "contains", "value": ["x"]}]
        }
    }));
    let response = send(&app, Method::POST, "/api/v1/papers/search/complex", body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let value = json_body(response).await;
    assert!(value["error"].as_str().unwrap().contains("contains"));
}

#[tokio::test]
async fn test_complex_search_rejects_bad_pagination() {
    let app = setup_app().await;
    let body = complex_body(json!({"root": {"id": "r", "operator": "AND"}, "limit": 0}));
    let response = send(&app, Method::POST, "/api/v1/papers/search/complex", body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_complex_search_store_failure_is_retryable() {
    let app = setup_app().await;
    app.database.pool().close().await;

    let body = complex_body(json!({"root": {"id": "r", "operator": "AND"}}));
    let response = send(&app, Method::POST, "/api/v1/papers/search/complex", body).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let value = json_body(response).await;
    assert_eq!(value["success"], false);
    assert_eq!(value["retryable"], true);
}

#[tokio::test]
async fn test_flat_search_query_string() {
    let app = setup_app().await;
    let hit = add_paper(&app.database, "Neural radiance", 2022).await;
    add_paper(&app.database, "Neural old", 2001).await;

    let response = send(
        &app,
        Method::GET,
        "/api/v1/papers/search?title_keyword=neural&year_from=2020&limit=5",
        Body::empty(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let value = json_body(response).await;
    let data = value["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["id"], hit);
}

#[tokio::test]
async fn test_pdf_upload_and_download() {
    let app = setup_app().await;
    let paper_id = add_paper(&app.database, "With PDF", 2020).await;
    assert_eq!(paper_id, 1);

    let pdf = b"%PDF-1.4 test".to_vec();
    let response = send(
        &app,
        Method::PUT,
        "/api/v1/papers/1/pdf?file_name=paper.pdf",
        Body::from_vec(pdf.clone()),
    )
    .await;
    let value = json_body(response).await;
    assert_eq!(value["success"], true);
    assert_eq!(value["data"]["pdf_file_path"], "papers/1/paper.pdf");
    assert_eq!(value["data"]["file_size"], pdf.len());

    let response = send(&app, Method::GET, "/api/v1/papers/1/pdf", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/pdf"
    );
    let bytes = response.into_body().into_vec().await.unwrap();
    assert_eq!(bytes, pdf);
}

#[tokio::test]
async fn test_pdf_upload_under_new_name_removes_previous_file() {
    let app = setup_app().await;
    add_paper(&app.database, "Revised", 2020).await;

    let response = send(
        &app,
        Method::PUT,
        "/api/v1/papers/1/pdf?file_name=draft.pdf",
        Body::from_vec(b"%PDF-1.4 draft".to_vec()),
    )
    .await;
    assert_eq!(json_body(response).await["success"], true);
    let draft = app.data_dir.path().join("papers/1/draft.pdf");
    assert!(draft.exists());

    let response = send(
        &app,
        Method::PUT,
        "/api/v1/papers/1/pdf?file_name=final.pdf",
        Body::from_vec(b"%PDF-1.4 final".to_vec()),
    )
    .await;
    let value = json_body(response).await;
    assert_eq!(value["data"]["pdf_file_path"], "papers/1/final.pdf");
    assert!(!draft.exists());
    assert!(app.data_dir.path().join("papers/1/final.pdf").exists());
}

#[tokio::test]
async fn test_pdf_download_without_file_is_not_found() {
    let app = setup_app().await;
    add_paper(&app.database, "No PDF", 2020).await;
    let response = send(&app, Method::GET, "/api/v1/papers/1/pdf", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_import_csv_endpoint() {
    let app = setup_app().await;
    let csv = "Article Title,Publication Year,Authors\nImported,2019,\"Doe, J; Roe, R\"\n";
    let response = send(
        &app,
        Method::POST,
        "/api/v1/import/csv",
        Body::from_string(csv.to_string()),
    )
    .await;
    let value = json_body(response).await;
    assert_eq!(value["success"], true);
    assert_eq!(value["data"]["successful_imports"], 1);
    assert_eq!(app.database.list_authors(0, 10).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_import_excel_endpoints() {
    let app = setup_app().await;
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "Title").unwrap();
    sheet.write_string(0, 1, "Year").unwrap();
    sheet.write_string(1, 0, "From a Sheet").unwrap();
    sheet.write_number(1, 1, 2021).unwrap();
    let bytes = workbook.save_to_buffer().unwrap();

    let response = send(
        &app,
        Method::POST,
        "/api/v1/import/excel/preview",
        Body::from_vec(bytes.clone()),
    )
    .await;
    let value = json_body(response).await;
    assert_eq!(value["success"], true);
    assert_eq!(value["data"]["headers"], json!(["Title", "Year"]));
    assert_eq!(value["data"]["total_rows"], 1);

    let response = send(
        &app,
        Method::POST,
        "/api/v1/import/excel?mapping=%7B%22title%22%3A%22Title%22%2C%22publication_year%22%3A%22Year%22%7D",
        Body::from_vec(bytes),
    )
    .await;
    let value = json_body(response).await;
    assert_eq!(value["success"], true);
    assert_eq!(value["data"]["successful_imports"], 1);

    let papers = app.database.list_papers(0, 10).await.unwrap();
    assert_eq!(papers[0].paper.title, "From a Sheet");
    assert_eq!(papers[0].paper.publication_year, 2021);
}

#[tokio::test]
async fn test_import_excel_rejects_invalid_workbook() {
    let app = setup_app().await;
    let response = send(
        &app,
        Method::POST,
        "/api/v1/import/excel",
        Body::from_string("not a workbook".to_string()),
    )
    .await;
    let value = json_body(response).await;
    assert_eq!(value["success"], false);
}

#[tokio::test]
async fn test_create_and_get_paper_endpoints() {
    let app = setup_app().await;
    let response = send_json(
        &app,
        Method::POST,
        "/api/v1/papers",
        json!({
            "title": "Posted",
            "abstract": "Body",
            "publication_year": 2020
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let value = json_body(response).await;
    assert_eq!(value["success"], true);
    assert_eq!(value["data"]["abstract"], "Body");

    let response = send(&app, Method::GET, "/api/v1/papers/1", Body::empty()).await;
    assert_eq!(json_body(response).await["data"]["title"], "Posted");

    let response = send(&app, Method::GET, "/api/v1/papers/2", Body::empty()).await;
    let value = json_body(response).await;
    assert_eq!(value["success"], false);
    assert_eq!(value["error"], "Paper not found");
}
