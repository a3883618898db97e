//! HTTP surface for docsearch.
//!
//! - `GET /` – Service name, version and endpoint map.
//! - `GET /health` – Readiness plus per-dependency probe results. Always answers 200.
//! - `POST /search-files` – Best chunk per file for a query (top 50 chunks, top 5 files).
//! - `POST /search` – Raw chunk hits for a query.
//! - `POST /documents` – Embed and store documents.
//! - `DELETE /documents` – Remove every chunk of the given files.
//! - `GET /collection` – Describe the configured collection.
//! - `POST /chat` – Answer a question from chunks of the given files.
//! - `GET /metrics` – Activity counters.
//!
//! Validation failures (malformed JSON included) answer 422, services that did not start answer
//! 503, and anything else answers 500.

use crate::app::{DocumentApi, ServiceError};
use crate::chat::ChatReply;
use crate::document::{Document, FileHit, SearchResult};
use crate::metrics::MetricsSnapshot;
use crate::vector_store::CollectionInfo;
use axum::{
    Json, Router, async_trait,
    extract::{FromRequest, Request, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

const MAX_QUERY_CHARS: usize = 1000;
const MAX_RESULT_LIMIT: usize = 100;
const DEFAULT_SEARCH_LIMIT: usize = 10;
const FILE_SEARCH_CHUNKS: usize = 50;
const FILE_SEARCH_TOP_FILES: usize = 5;

/// Build the HTTP router over any [`DocumentApi`] implementation.
///
/// `expose_details` adds the underlying error text to 500 responses. `cors_origins` containing
/// `*` allows any origin.
pub fn create_router<S>(service: Arc<S>, expose_details: bool, cors_origins: &[String]) -> Router
where
    S: DocumentApi + 'static,
{
    let state = AppState {
        service,
        expose_details,
    };

    Router::new()
        .route("/", get(root))
        .route("/health", get(health::<S>))
        .route("/search-files", post(search_files::<S>))
        .route("/search", post(search::<S>))
        .route(
            "/documents",
            post(index_documents::<S>).delete(delete_documents::<S>),
        )
        .route("/collection", get(collection_info::<S>))
        .route("/chat", post(chat::<S>))
        .route("/metrics", get(metrics::<S>))
        .with_state(state)
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() || origins.iter().any(|origin| origin.trim() == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.trim().parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

struct AppState<S> {
    service: Arc<S>,
    expose_details: bool,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            expose_details: self.expose_details,
        }
    }
}

impl<S> AppState<S> {
    fn error(&self, operation: &str, error: ServiceError) -> ApiError {
        if error.is_unavailable() {
            tracing::warn!(operation, error = %error, "Service unavailable");
            return ApiError::Unavailable(error.to_string());
        }
        tracing::error!(operation, error = %error, "Request failed");
        ApiError::Internal(self.expose_details.then(|| error.to_string()))
    }
}

#[derive(Debug, Serialize)]
struct FieldError {
    field: &'static str,
    message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

trait Validate {
    fn validate(&self) -> Vec<FieldError>;
}

fn check_text(field: &'static str, value: &str, errors: &mut Vec<FieldError>) {
    let chars = value.chars().count();
    if chars == 0 {
        errors.push(FieldError::new(field, "must not be empty"));
    } else if chars > MAX_QUERY_CHARS {
        errors.push(FieldError::new(
            field,
            format!("must be at most {MAX_QUERY_CHARS} characters"),
        ));
    }
}

fn check_limit(field: &'static str, value: Option<usize>, errors: &mut Vec<FieldError>) {
    if let Some(value) = value
        && !(1..=MAX_RESULT_LIMIT).contains(&value)
    {
        errors.push(FieldError::new(
            field,
            format!("must be between 1 and {MAX_RESULT_LIMIT}"),
        ));
    }
}

/// JSON body that has been deserialized and validated.
struct ValidatedJson<T>(T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(request, state)
            .await
            .map_err(|rejection| {
                ApiError::Validation(vec![FieldError::new("body", rejection.body_text())])
            })?;

        let errors = value.validate();
        if errors.is_empty() {
            Ok(Self(value))
        } else {
            Err(ApiError::Validation(errors))
        }
    }
}

#[derive(Serialize)]
struct RootResponse {
    message: &'static str,
    version: &'static str,
    endpoints: BTreeMap<&'static str, &'static str>,
}

async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Document Search API",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: BTreeMap::from([
            ("health", "/health"),
            ("search_files", "/search-files"),
            ("search", "/search"),
            ("documents", "/documents"),
            ("collection", "/collection"),
            ("chat", "/chat"),
            ("metrics", "/metrics"),
        ]),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    message: &'static str,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    services: BTreeMap<String, bool>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    errors: BTreeMap<String, String>,
}

async fn health<S>(State(state): State<AppState<S>>) -> Json<HealthResponse>
where
    S: DocumentApi,
{
    let health = state.service.health().await;
    let message = if !health.ready {
        "Search service not available"
    } else if health.report.is_healthy() {
        "Document Search API is running"
    } else {
        "Document Search API is running with unhealthy dependencies"
    };

    Json(HealthResponse {
        status: if health.is_healthy() {
            "healthy"
        } else {
            "unhealthy"
        },
        message,
        services: health.report.statuses(),
        errors: health.report.errors(),
    })
}

#[derive(Deserialize)]
struct SearchFilesRequest {
    query: String,
}

impl Validate for SearchFilesRequest {
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        check_text("query", &self.query, &mut errors);
        errors
    }
}

#[derive(Serialize)]
struct SearchResponse<T> {
    query: String,
    total_results: usize,
    results: Vec<T>,
}

impl<T> SearchResponse<T> {
    fn new(query: String, results: Vec<T>) -> Self {
        Self {
            query,
            total_results: results.len(),
            results,
        }
    }
}

async fn search_files<S>(
    State(state): State<AppState<S>>,
    ValidatedJson(request): ValidatedJson<SearchFilesRequest>,
) -> Result<Json<SearchResponse<FileHit>>, ApiError>
where
    S: DocumentApi,
{
    tracing::info!(query = %request.query, "File search requested");
    let results = state
        .service
        .search_files(&request.query, FILE_SEARCH_CHUNKS, FILE_SEARCH_TOP_FILES)
        .await
        .map_err(|error| state.error("search_files", error))?;
    tracing::info!(files = results.len(), "File search completed");
    Ok(Json(SearchResponse::new(request.query, results)))
}

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    limit: Option<usize>,
}

impl Validate for SearchRequest {
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        check_text("query", &self.query, &mut errors);
        check_limit("limit", self.limit, &mut errors);
        errors
    }
}

async fn search<S>(
    State(state): State<AppState<S>>,
    ValidatedJson(request): ValidatedJson<SearchRequest>,
) -> Result<Json<SearchResponse<SearchResult>>, ApiError>
where
    S: DocumentApi,
{
    let limit = request.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    let results = state
        .service
        .search(&request.query, limit)
        .await
        .map_err(|error| state.error("search", error))?;
    Ok(Json(SearchResponse::new(request.query, results)))
}

#[derive(Deserialize)]
struct IndexRequest {
    documents: Vec<Document>,
}

impl Validate for IndexRequest {
    fn validate(&self) -> Vec<FieldError> {
        if self
            .documents
            .iter()
            .any(|document| document.file_id.trim().is_empty())
        {
            vec![FieldError::new("documents.file_id", "must not be blank")]
        } else {
            Vec::new()
        }
    }
}

#[derive(Serialize)]
struct IndexResponse {
    message: String,
    documents_processed: usize,
}

async fn index_documents<S>(
    State(state): State<AppState<S>>,
    ValidatedJson(request): ValidatedJson<IndexRequest>,
) -> Result<Json<IndexResponse>, ApiError>
where
    S: DocumentApi,
{
    let outcome = state
        .service
        .index_documents(request.documents)
        .await
        .map_err(|error| state.error("index_documents", error))?;
    Ok(Json(IndexResponse {
        message: format!(
            "Successfully indexed {} documents",
            outcome.documents_processed
        ),
        documents_processed: outcome.documents_processed,
    }))
}

#[derive(Deserialize)]
struct DeleteRequest {
    file_ids: Vec<String>,
}

impl Validate for DeleteRequest {
    fn validate(&self) -> Vec<FieldError> {
        Vec::new()
    }
}

#[derive(Serialize)]
struct DeleteResponse {
    message: String,
    deleted_count: usize,
}

async fn delete_documents<S>(
    State(state): State<AppState<S>>,
    ValidatedJson(request): ValidatedJson<DeleteRequest>,
) -> Result<Json<DeleteResponse>, ApiError>
where
    S: DocumentApi,
{
    let deleted_count = state
        .service
        .delete_documents(&request.file_ids)
        .await
        .map_err(|error| state.error("delete_documents", error))?;
    Ok(Json(DeleteResponse {
        message: format!("Deleted documents for {deleted_count} file ids"),
        deleted_count,
    }))
}

async fn collection_info<S>(
    State(state): State<AppState<S>>,
) -> Result<Json<CollectionInfo>, ApiError>
where
    S: DocumentApi,
{
    let info = state
        .service
        .collection_info()
        .await
        .map_err(|error| state.error("collection_info", error))?;
    Ok(Json(info))
}

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    file_ids: Vec<String>,
    message: String,
    #[serde(default)]
    max_chunks: Option<usize>,
}

impl Validate for ChatRequest {
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        check_text("message", &self.message, &mut errors);
        check_limit("max_chunks", self.max_chunks, &mut errors);
        errors
    }
}

async fn chat<S>(
    State(state): State<AppState<S>>,
    ValidatedJson(request): ValidatedJson<ChatRequest>,
) -> Result<Json<ChatReply>, ApiError>
where
    S: DocumentApi,
{
    let reply = state
        .service
        .chat(&request.file_ids, &request.message, request.max_chunks)
        .await
        .map_err(|error| state.error("chat", error))?;
    tracing::info!(
        files = request.file_ids.len(),
        chunks = reply.total_chunks,
        "Chat answered"
    );
    Ok(Json(reply))
}

async fn metrics<S>(State(state): State<AppState<S>>) -> Json<MetricsSnapshot>
where
    S: DocumentApi,
{
    Json(state.service.metrics_snapshot())
}

enum ApiError {
    Validation(Vec<FieldError>),
    Unavailable(String),
    Internal(Option<String>),
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorBody {
                    error: "validation_error",
                    message: "Request validation failed".into(),
                    details: Some(json!(errors)),
                },
            ),
            Self::Unavailable(message) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorBody {
                    error: "service_unavailable",
                    message,
                    details: None,
                },
            ),
            Self::Internal(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    error: "internal_server_error",
                    message: "An unexpected error occurred".into(),
                    details: details.map(Value::String),
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}
