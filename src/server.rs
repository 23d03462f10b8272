//! HTTP server.
//!
//! Exposes the question pipeline and the chat router as a small JSON API
//! for the web front end.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Liveness banner |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/datasets` | Catalog dataset names |
//! | `POST` | `/query` | Run the pipeline for one question |
//! | `POST` | `/message` | Route one chat message |
//!
//! # Error Contract
//!
//! All error responses share one shape:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404).
//!
//! `POST /message` never returns an error for a non-empty message; every
//! failure inside the router is absorbed by its fallback ladder.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support the
//! browser-based front end.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, info_span, warn, Instrument};

use crate::catalog::CkanClient;
use crate::config::Config;
use crate::llm::ChatClient;
use crate::models::{QueryAnswer, Record};
use crate::pipeline::QueryPipeline;
use crate::router::{short_request_id, MessageRouter};
use crate::traits::{CatalogClient, LanguageModel};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    router: Arc<MessageRouter>,
}

impl AppState {
    pub fn new(router: MessageRouter) -> Self {
        Self {
            router: Arc::new(router),
        }
    }

    fn pipeline(&self) -> &QueryPipeline {
        self.router.pipeline()
    }
}

/// Wire the production collaborators described by `config`.
///
/// # Errors
///
/// Fails if the model API key is missing or an HTTP client cannot be built.
pub fn build_message_router(config: &Config) -> anyhow::Result<MessageRouter> {
    let catalog: Arc<dyn CatalogClient> = Arc::new(CkanClient::new(&config.catalog)?);
    let model: Arc<dyn LanguageModel> = Arc::new(ChatClient::new(&config.llm)?);
    let pipeline = QueryPipeline::new(model.clone(), catalog);
    Ok(MessageRouter::from_config(config, model, pipeline))
}

/// The application's routes and layers, without a listener.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/datasets", get(handle_datasets))
        .route("/query", post(handle_query))
        .route("/message", post(handle_message))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server.
///
/// Binds to the address configured in `[server].bind` and runs until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let state = AppState::new(build_message_router(config)?);
    let bind_addr = config.server.bind.clone();

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(bind = %bind_addr, "server listening");
    axum::serve(listener, app(state)).await?;

    Ok(())
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

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

// ============ GET / and GET /health ============

#[derive(Serialize)]
struct RootResponse {
    status: &'static str,
    message: &'static str,
}

async fn handle_root() -> Json<RootResponse> {
    Json(RootResponse {
        status: "active",
        message: "Recife Data API is running",
    })
}

#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /datasets ============

#[derive(Serialize)]
struct DatasetsResponse {
    datasets: Vec<String>,
}

/// Returns `404` when the catalog yields no datasets, whether it is empty
/// or unreachable.
async fn handle_datasets(State(state): State<AppState>) -> Result<Json<DatasetsResponse>, AppError> {
    let datasets = state.pipeline().catalog().list_datasets().await;
    if datasets.is_empty() {
        return Err(not_found("No datasets found"));
    }
    Ok(Json(DatasetsResponse { datasets }))
}

// ============ POST /query ============

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
}

#[derive(Serialize)]
struct QueryResponse {
    answer: String,
    dataset: Option<String>,
    resource: Option<String>,
    sql_query: Option<String>,
    data: Vec<Record>,
}

impl From<QueryAnswer> for QueryResponse {
    fn from(a: QueryAnswer) -> Self {
        Self {
            answer: a.answer,
            dataset: a.dataset,
            resource: a.resource,
            sql_query: a.sql_query,
            data: a.data,
        }
    }
}

/// Handler for `POST /query`.
///
/// Returns `400` for an empty question and for pipeline failures (empty
/// catalog, unusable selection, unresolvable dataset).
async fn handle_query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    let query = req.query.trim();
    if query.is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    let span = info_span!("query", request_id = %short_request_id());
    async move {
        info!(query = %query, "processing query request");
        match state.pipeline().answer_query(query).await {
            Ok(answer) => Ok(Json(answer.into())),
            Err(e) => {
                warn!(error = %e, "query failed");
                Err(bad_request(e.to_string()))
            }
        }
    }
    .instrument(span)
    .await
}

// ============ POST /message ============

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default)]
    conversation_id: Option<String>,
    #[serde(default)]
    tipo_agente: Option<String>,
}

#[derive(Serialize)]
struct ChatResponse {
    answer: String,
    conversation_id: String,
    is_data_query: bool,
    agent_type: String,
}

async fn handle_message(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if req.message.trim().is_empty() {
        return Err(bad_request("message must not be empty"));
    }

    let answer = state
        .router
        .answer_message(
            &req.message,
            req.conversation_id.as_deref(),
            req.tipo_agente.as_deref(),
        )
        .await;

    Ok(Json(ChatResponse {
        answer: answer.answer,
        conversation_id: answer.conversation_id,
        is_data_query: answer.used_pipeline,
        agent_type: answer.persona.tag().to_string(),
    }))
}
