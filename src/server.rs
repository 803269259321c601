//! JSON HTTP API.
//!
//! Exposes the search / scrape / summarize / ask / upload operations over
//! HTTP for UI frontends. One [`Session`] is shared behind a mutex: requests
//! that touch the index or the LLM serialize, matching the one-action-at-a-
//! time model of the CLI. The on-disk index file is still unguarded against
//! other processes.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/search` | Search the movie catalog by title |
//! | `POST` | `/reviews` | Scrape a review page |
//! | `POST` | `/summarize` | Scrape and summarize, optionally upload/index |
//! | `POST` | `/ask` | Answer a question over indexed reviews |
//! | `POST` | `/upload` | Upload text to content-addressed storage |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "title must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `upstream` (502), `internal` (500).

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::models::{MovieRecord, UploadReceipt};
use crate::scrape::{self, ScrapeError};
use crate::search;
use crate::session::Session;
use crate::storage::BridgeClient;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    session: Arc<Mutex<Session>>,
    /// Constructed once at startup when `[storage]` is configured; its auth
    /// tokens live for the life of the server.
    bridge: Option<Arc<BridgeClient>>,
    http: reqwest::Client,
}

/// Start the HTTP server on the configured bind address.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let session = Session::open(config)?;

    let bridge = match &config.storage {
        Some(storage) => Some(Arc::new(BridgeClient::new(storage)?)),
        None => None,
    };

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.scrape.timeout_secs))
        .build()?;

    let state = AppState {
        config: Arc::new(config.clone()),
        session: Arc::new(Mutex::new(session)),
        bridge,
        http,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let bind_addr = config.server.bind.clone();
    let app = router(state).layer(cors);

    println!("cinescout server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/search", post(handle_search))
        .route("/reviews", post(handle_reviews))
        .route("/summarize", post(handle_summarize))
        .route("/ask", post(handle_ask))
        .route("/upload", post(handle_upload))
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

/// A dependency outside this process failed: the catalog, the review page,
/// the LLM, the embedder, or the storage bridge.
fn upstream(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "upstream".to_string(),
        message: message.into(),
    }
}

fn internal(err: anyhow::Error) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: err.to_string(),
    }
}

fn scrape_error(err: ScrapeError) -> AppError {
    match err {
        ScrapeError::Selector(_) => bad_request(err.to_string()),
        _ => upstream(err.to_string()),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchRequest {
    title: String,
}

#[derive(Serialize)]
struct SearchResponse {
    movies: Vec<MovieRecord>,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    if req.title.trim().is_empty() {
        return Err(bad_request("title must not be empty"));
    }

    let movies = search::search_movies(&state.http, &state.config.catalog, &req.title)
        .await
        .map_err(|e| upstream(e.to_string()))?;

    Ok(Json(SearchResponse { movies }))
}

// ============ POST /reviews ============

#[derive(Deserialize)]
struct ReviewsRequest {
    movie_id: Option<String>,
    url: Option<String>,
}

#[derive(Serialize)]
struct ReviewsResponse {
    url: String,
    text: String,
}

fn resolve_url(config: &Config, movie_id: Option<&str>, url: Option<&str>) -> Option<String> {
    match (movie_id, url) {
        (Some(id), _) => Some(search::review_url(&config.catalog, id)),
        (None, Some(url)) => Some(url.to_string()),
        (None, None) => None,
    }
}

async fn handle_reviews(
    State(state): State<AppState>,
    Json(req): Json<ReviewsRequest>,
) -> Result<Json<ReviewsResponse>, AppError> {
    let url = resolve_url(&state.config, req.movie_id.as_deref(), req.url.as_deref())
        .ok_or_else(|| bad_request("provide movie_id or url"))?;

    let text = scrape::scrape_reviews(&state.http, &state.config.scrape, &url)
        .await
        .map_err(scrape_error)?;

    Ok(Json(ReviewsResponse { url, text }))
}

// ============ POST /summarize ============

#[derive(Deserialize)]
struct SummarizeRequest {
    movie_id: Option<String>,
    url: Option<String>,
    title: Option<String>,
    #[serde(default)]
    upload: bool,
    #[serde(default)]
    index: bool,
}

#[derive(Serialize)]
struct SummarizeResponse {
    summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    upload: Option<UploadReceipt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    chunks_indexed: Option<usize>,
}

async fn handle_summarize(
    State(state): State<AppState>,
    Json(req): Json<SummarizeRequest>,
) -> Result<Json<SummarizeResponse>, AppError> {
    let url = resolve_url(&state.config, req.movie_id.as_deref(), req.url.as_deref())
        .ok_or_else(|| bad_request("provide movie_id or url"))?;

    let content = scrape::scrape_reviews(&state.http, &state.config.scrape, &url)
        .await
        .map_err(scrape_error)?;

    let mut session = state.session.lock().await;

    let summary = session
        .summarize(&content)
        .await
        .map_err(|e| upstream(e.to_string()))?;

    let upload = if req.upload {
        let bridge = state
            .bridge
            .as_ref()
            .ok_or_else(|| bad_request("upload requested but [storage] is not configured"))?;
        let title = req
            .title
            .or(req.movie_id)
            .unwrap_or_else(|| "review".to_string());
        let receipt = bridge
            .upload_text(&summary, &title)
            .await
            .map_err(|e| upstream(e.to_string()))?;
        Some(receipt)
    } else {
        None
    };

    let chunks_indexed = if req.index {
        let stored = session
            .ingest(&content, &url)
            .await
            .map_err(|e| upstream(e.to_string()))?;
        Some(stored)
    } else {
        None
    };

    Ok(Json(SummarizeResponse {
        summary,
        upload,
        chunks_indexed,
    }))
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
}

async fn handle_ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    if req.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }

    let session = state.session.lock().await;
    let answer = session
        .ask(&req.question)
        .await
        .map_err(|e| upstream(e.to_string()))?;

    Ok(Json(AskResponse { answer }))
}

// ============ POST /upload ============

#[derive(Deserialize)]
struct UploadRequest {
    text: String,
    title: Option<String>,
}

async fn handle_upload(
    State(state): State<AppState>,
    Json(req): Json<UploadRequest>,
) -> Result<Json<UploadReceipt>, AppError> {
    if req.text.is_empty() {
        return Err(bad_request("text must not be empty"));
    }

    let bridge = state
        .bridge
        .as_ref()
        .ok_or_else(|| bad_request("[storage] is not configured"))?;

    let title = req.title.unwrap_or_else(|| "untitled".to_string());
    let receipt = bridge
        .upload_text(&req.text, &title)
        .await
        .map_err(internal)?;

    Ok(Json(receipt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_state(tmp: &TempDir) -> AppState {
        let mut config = Config::minimal();
        config.index.path = tmp.path().join("reviews.idx");
        config.embedding.dims = 2;

        AppState {
            session: Arc::new(Mutex::new(Session::open(&config).unwrap())),
            config: Arc::new(config),
            bridge: None,
            http: reqwest::Client::new(),
        }
    }

    async fn serve(state: AppState) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_health() {
        let tmp = TempDir::new().unwrap();
        let base = serve(test_state(&tmp).await).await;

        let body: serde_json::Value = reqwest::get(format!("{}/health", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_ask_empty_index_returns_fixed_answer() {
        let tmp = TempDir::new().unwrap();
        let base = serve(test_state(&tmp).await).await;

        let client = reqwest::Client::new();
        let body: serde_json::Value = client
            .post(format!("{}/ask", base))
            .json(&serde_json::json!({"question": "any good?"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["answer"], "No relevant information found.");
    }

    #[tokio::test]
    async fn test_ask_rejects_blank_question() {
        let tmp = TempDir::new().unwrap();
        let base = serve(test_state(&tmp).await).await;

        let client = reqwest::Client::new();
        let resp = client
            .post(format!("{}/ask", base))
            .json(&serde_json::json!({"question": "  "}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400);

        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn test_upload_without_storage_is_bad_request() {
        let tmp = TempDir::new().unwrap();
        let base = serve(test_state(&tmp).await).await;

        let client = reqwest::Client::new();
        let resp = client
            .post(format!("{}/upload", base))
            .json(&serde_json::json!({"text": "a summary"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400);
    }

    #[tokio::test]
    async fn test_reviews_requires_target() {
        let tmp = TempDir::new().unwrap();
        let base = serve(test_state(&tmp).await).await;

        let client = reqwest::Client::new();
        let resp = client
            .post(format!("{}/reviews", base))
            .json(&serde_json::json!({}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400);
    }
}
