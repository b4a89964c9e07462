//! HTTP question-answering server.
//!
//! Serves the loaded snapshot over a small JSON API. All handlers share one
//! [`AppContext`], built once at startup and passed through Axum's `State`
//! extractor; the snapshot inside it is read-only, so requests never lock.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Service name, version and endpoint list |
//! | `GET`  | `/health` | `ok` when the index is loaded, `warning` otherwise |
//! | `GET`  | `/stats` | Index statistics |
//! | `GET`  | `/ask?query=...&k=3&model=...` | Answer a question |
//! | `POST` | `/ask` | Same, with a JSON body `{query, k, model}` |
//! | `POST` | `/ask_post` | Alias of `POST /ask` |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must be at least 3 characters" } }
//! ```
//!
//! Error codes: `bad_request` (400), `index_unavailable` (503),
//! `upstream_error` (502), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser front-ends can
//! call the API directly.

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::ask_cmd::AnswerWithCost;
use crate::config::{Config, RetrievalConfig};
use crate::error::RagError;
use crate::models::IndexStats;
use crate::retriever::Retriever;

const MIN_QUERY_CHARS: usize = 3;

/// Everything a request handler needs, created once per process.
pub struct AppContext {
    retriever: Option<Retriever>,
    startup_error: Option<String>,
    retrieval: RetrievalConfig,
}

impl AppContext {
    /// Load the snapshot and clients. A failure is recorded, not returned, so
    /// the server still starts and reports the problem on `/health`.
    pub fn from_config(config: &Config) -> Self {
        match Retriever::from_config(config) {
            Ok(retriever) => Self::with_retriever(retriever, config.retrieval.clone()),
            Err(e) => {
                let message = match &e {
                    RagError::IndexNotFound(_) => {
                        format!("{}. Run `lrag build` to create the index.", e)
                    }
                    _ => e.to_string(),
                };
                tracing::warn!(error = %message, "starting without an index");
                Self::unavailable(message, config.retrieval.clone())
            }
        }
    }

    pub fn with_retriever(retriever: Retriever, retrieval: RetrievalConfig) -> Self {
        Self {
            retriever: Some(retriever),
            startup_error: None,
            retrieval,
        }
    }

    pub fn unavailable(message: impl Into<String>, retrieval: RetrievalConfig) -> Self {
        Self {
            retriever: None,
            startup_error: Some(message.into()),
            retrieval,
        }
    }

    fn retriever(&self) -> Result<&Retriever, AppError> {
        self.retriever.as_ref().ok_or_else(|| AppError {
            status: StatusCode::SERVICE_UNAVAILABLE,
            code: "index_unavailable".to_string(),
            message: self
                .startup_error
                .clone()
                .unwrap_or_else(|| "index not loaded".to_string()),
        })
    }
}

/// Starts the HTTP server on `[server].bind` and runs until the process is
/// terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let ctx = Arc::new(AppContext::from_config(config));
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    println!("lrag server listening on http://{}", config.server.bind);
    serve(listener, ctx).await
}

/// Serve `ctx` on an already-bound listener.
pub async fn serve(listener: tokio::net::TcpListener, ctx: Arc<AppContext>) -> anyhow::Result<()> {
    axum::serve(listener, router(ctx)).await?;
    Ok(())
}

pub fn router(ctx: Arc<AppContext>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/stats", get(handle_stats))
        .route("/ask", get(handle_ask_get).post(handle_ask_post))
        .route("/ask_post", axum::routing::post(handle_ask_post))
        .layer(cors)
        .with_state(ctx)
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
#[derive(Debug)]
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

impl From<RagError> for AppError {
    fn from(e: RagError) -> Self {
        let (status, code) = if e.is_upstream() {
            (StatusCode::BAD_GATEWAY, "upstream_error")
        } else {
            (StatusCode::INTERNAL_SERVER_ERROR, "internal")
        };
        tracing::error!(error = %e, "request failed");
        AppError {
            status,
            code: code.to_string(),
            message: e.to_string(),
        }
    }
}

// ============ GET / ============

async fn handle_root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "legal-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Ask questions about a collection of legal documents",
        "endpoints": {
            "/health": "Service and index status",
            "/ask": "Ask a question (GET ?query=... or POST JSON)",
            "/ask_post": "Ask a question (POST JSON)",
            "/stats": "Index statistics"
        }
    }))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    message: String,
    index_loaded: bool,
}

async fn handle_health(State(ctx): State<Arc<AppContext>>) -> Json<HealthResponse> {
    let response = match &ctx.retriever {
        Some(_) => HealthResponse {
            status: "ok".to_string(),
            message: "API operational".to_string(),
            index_loaded: true,
        },
        None => HealthResponse {
            status: "warning".to_string(),
            message: ctx
                .startup_error
                .clone()
                .unwrap_or_else(|| "index not loaded".to_string()),
            index_loaded: false,
        },
    };
    Json(response)
}

// ============ GET /stats ============

#[derive(Serialize)]
struct StatsResponse {
    #[serde(flatten)]
    stats: IndexStats,
    index_loaded: bool,
}

async fn handle_stats(State(ctx): State<Arc<AppContext>>) -> Result<Json<StatsResponse>, AppError> {
    let retriever = ctx.retriever()?;
    Ok(Json(StatsResponse {
        stats: retriever.snapshot().stats(),
        index_loaded: true,
    }))
}

// ============ /ask ============

#[derive(Debug, Deserialize)]
struct AskParams {
    query: Option<String>,
    k: Option<usize>,
    model: Option<String>,
}

async fn handle_ask_get(
    State(ctx): State<Arc<AppContext>>,
    params: Result<Query<AskParams>, QueryRejection>,
) -> Result<Json<AnswerWithCost>, AppError> {
    let Query(params) = params.map_err(|e| bad_request(e.body_text()))?;
    answer(&ctx, params).await
}

async fn handle_ask_post(
    State(ctx): State<Arc<AppContext>>,
    body: Result<Json<AskParams>, JsonRejection>,
) -> Result<Json<AnswerWithCost>, AppError> {
    let Json(params) = body.map_err(|e| bad_request(e.body_text()))?;
    answer(&ctx, params).await
}

async fn answer(ctx: &AppContext, params: AskParams) -> Result<Json<AnswerWithCost>, AppError> {
    let (query, k) = validate(&params, &ctx.retrieval)?;
    let retriever = ctx.retriever()?;
    let record = retriever.ask(query, k, params.model.as_deref()).await?;
    Ok(Json(AnswerWithCost::from(record)))
}

/// Check the query length and `k` range before touching the index.
fn validate<'a>(params: &'a AskParams, retrieval: &RetrievalConfig) -> Result<(&'a str, usize), AppError> {
    // Length counts the query as sent, surrounding whitespace included.
    let query = params.query.as_deref().unwrap_or_default();
    if query.chars().count() < MIN_QUERY_CHARS {
        return Err(bad_request(format!(
            "query must be at least {} characters",
            MIN_QUERY_CHARS
        )));
    }

    let k = params.k.unwrap_or(retrieval.default_k);
    if k == 0 || k > retrieval.max_k {
        return Err(bad_request(format!(
            "k must be between 1 and {}",
            retrieval.max_k
        )));
    }
    Ok((query, k))
}
