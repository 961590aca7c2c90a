use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use finsearch_core::{IndexCatalog, IngestDocument};
use http_body_util::BodyExt;
use serde_json::Value;
use std::path::Path;
use tempfile::tempdir;
use tower::ServiceExt;

fn build_tiny_index(base: &Path) {
    let mut catalog = IndexCatalog::new();
    catalog.ingest(IngestDocument {
        doc_id: "doc0".into(),
        title: "Doc 0".into(),
        date: "2018-03-01".into(),
        source: "wsj".into(),
        terms: vec![("rust".into(), 0.8)],
        organizations: vec!["Mozilla".into()],
        persons: vec![],
    })
    .unwrap();
    catalog.ingest(IngestDocument {
        doc_id: "doc1".into(),
        title: "Doc 1".into(),
        terms: vec![("rust".into(), 0.6), ("learn".into(), 0.4)],
        ..Default::default()
    })
    .unwrap();
    catalog.save(base).unwrap();
}

async fn call(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let dir = tempdir().unwrap();
    let base = dir.path().join("idx");
    build_tiny_index(&base);
    let app = server::build_app(base.to_string_lossy().to_string()).unwrap();

    let (status, json) = call(app, get("/search?q=rust&k=2")).await;
    assert_eq!(status, StatusCode::OK);
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 2);
    assert_eq!(arr[0]["doc_id"], "doc0");
    assert_eq!(arr[1]["doc_id"], "doc1");
    assert_eq!(arr[0]["source"], "wsj");
    assert_eq!(json["total_hits"], 2);
    assert_eq!(json["clauses"]["terms"][0], "rust");
}

#[tokio::test]
async fn search_applies_clauses() {
    let dir = tempdir().unwrap();
    let base = dir.path().join("idx");
    build_tiny_index(&base);
    let app = server::build_app(base.to_string_lossy().to_string()).unwrap();

    let (_, json) = call(app.clone(), get("/search?q=ORG:Mozilla")).await;
    assert_eq!(json["results"][0]["doc_id"], "doc0");
    assert_eq!(json["results"][0]["score"], 1.5);

    let (_, json) = call(app, get("/search?q=rust%20-learning")).await;
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 1);
    assert_eq!(arr[0]["doc_id"], "doc0");
}

#[tokio::test]
async fn doc_and_stats_endpoints() {
    let dir = tempdir().unwrap();
    let base = dir.path().join("idx");
    build_tiny_index(&base);
    let app = server::build_app(base.to_string_lossy().to_string()).unwrap();

    let (status, json) = call(app.clone(), get("/doc/doc0")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["title"], "Doc 0");
    assert!(json["text"].as_str().unwrap().contains("doc0"));

    let (status, _) = call(app.clone(), get("/doc/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = call(app, get("/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["documents"], 2);
    assert_eq!(json["terms"], 2);
    assert_eq!(json["organizations"], 1);
}

#[tokio::test]
async fn reload_requires_token() {
    let dir = tempdir().unwrap();
    let base = dir.path().join("idx");
    build_tiny_index(&base);
    let app = server::build_app(base.to_string_lossy().to_string()).unwrap();

    let req = Request::post("/index/reload").body(Body::empty()).unwrap();
    let (status, _) = call(app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[test]
fn missing_index_fails_startup() {
    let dir = tempdir().unwrap();
    assert!(server::build_app(dir.path().join("absent").to_string_lossy().to_string()).is_err());
}

#[test]
fn reload_swaps_in_rebuilt_index() {
    let dir = tempdir().unwrap();
    let base = dir.path().join("idx");
    build_tiny_index(&base);
    let state = server::AppState::open(&base).unwrap();
    assert_eq!(state.catalog.read().total_documents(), 2);

    let mut rebuilt = IndexCatalog::new();
    for id in ["n0", "n1", "n2"] {
        rebuilt.ingest(IngestDocument { doc_id: id.into(), terms: vec![("tokio".into(), 1.0)], ..Default::default() }).unwrap();
    }
    rebuilt.save(&base).unwrap();
    assert_eq!(state.reload().unwrap(), 3);
    assert_eq!(state.catalog.read().search_word("tokio").len(), 3);

    std::fs::remove_file(dir.path().join("idx.words")).unwrap();
    assert!(state.reload().is_err());
    assert_eq!(state.catalog.read().total_documents(), 3);
}
