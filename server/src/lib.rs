use anyhow::{Context, Result};
use axum::{extract::{Path, Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use finsearch_core::{EnglishNormalizer, IndexCatalog, ParsedQuery, QueryEngine, QueryResult, DEFAULT_RESULT_LIMIT};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer, AllowOrigin};
use tower_http::trace::TraceLayer;

const MAX_RESULTS: usize = 100;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { DEFAULT_RESULT_LIMIT }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub clauses: ParsedQuery,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<QueryResult>,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub documents: usize,
    pub terms: usize,
    pub organizations: usize,
    pub persons: usize,
    pub normalized: bool,
}

/// The catalog is shared single-writer / multi-reader: queries take the read
/// lock, a reload swaps the whole catalog under the write lock.
#[derive(Clone)]
pub struct AppState {
    pub index_base: PathBuf,
    pub catalog: Arc<RwLock<IndexCatalog>>,
    pub admin_token: Option<String>,
}

impl AppState {
    pub fn open<P: Into<PathBuf>>(index_base: P) -> Result<Self> {
        let index_base = index_base.into();
        let catalog = IndexCatalog::open(&index_base)
            .with_context(|| format!("loading index from {}", index_base.display()))?;
        let admin_token = std::env::var("ADMIN_TOKEN").ok();
        Ok(Self { index_base, catalog: Arc::new(RwLock::new(catalog)), admin_token })
    }

    /// Read the index files again and swap the result in. The files are read
    /// outside the lock so queries keep running on the old catalog until the
    /// swap; on error the old catalog stays.
    pub fn reload(&self) -> finsearch_core::Result<usize> {
        let fresh = IndexCatalog::open(&self.index_base)?;
        let documents = fresh.total_documents();
        *self.catalog.write() = fresh;
        tracing::info!(index = %self.index_base.display(), documents, "catalog reloaded");
        Ok(documents)
    }
}

pub fn build_app(index_base: String) -> Result<Router> {
    Ok(router(AppState::open(index_base)?))
}

pub fn router(app_state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .route("/stats", get(stats_handler))
        .route("/index/reload", post(reload_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Json<SearchResponse> {
    let start = std::time::Instant::now();
    let k = params.k.clamp(1, MAX_RESULTS);
    let catalog = state.catalog.read();
    let engine = QueryEngine::new(&catalog, EnglishNormalizer);
    let clauses = engine.parse(&params.q);
    let scores = engine.score(&clauses);
    let total_hits = scores.len();
    let results = engine.rank(scores, k);
    drop(catalog);

    let elapsed = start.elapsed();
    tracing::debug!(query = %params.q, total_hits, "search");
    Json(SearchResponse { query: params.q, clauses, took_s: elapsed.as_secs_f64(), total_hits, results })
}

pub async fn doc_handler(
    State(state): State<AppState>,
    Path(doc_id): Path<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let catalog = state.catalog.read();
    match catalog.document(&doc_id) {
        Some(meta) => {
            let engine = QueryEngine::new(&catalog, EnglishNormalizer);
            Ok(Json(serde_json::json!({
                "doc_id": doc_id,
                "title": meta.title,
                "date": meta.date,
                "source": meta.source,
                "text": engine.full_article(&doc_id),
            })))
        }
        None => Err((StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "not found" })))),
    }
}

pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let catalog = state.catalog.read();
    Json(StatsResponse {
        documents: catalog.total_documents(),
        terms: catalog.term_count(),
        organizations: catalog.organization_count(),
        persons: catalog.person_count(),
        normalized: catalog.is_normalized(),
    })
}

// --- Admin endpoints ---
async fn reload_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    let documents = state.reload().map_err(|e| {
        tracing::error!(error = %e, "reload failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    Ok(Json(serde_json::json!({ "reloaded": true, "documents": documents })))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
