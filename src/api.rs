//! HTTP surface for the knowledge base.
//!
//! This module exposes a compact Axum router:
//!
//! - `GET /health` – Liveness probe with service name and version.
//! - `POST /upload` – Extract, chunk, embed, and index a batch of files (text, markdown, csv,
//!   PDF, DOCX). Binary files are sent base64-encoded. Each file is reported individually; one
//!   failing file never fails its siblings.
//! - `POST /query` – Retrieve relevant chunks and synthesise an answer with the configured model.
//! - `POST /search` – Retrieval only, returning ranked chunks with similarity scores.
//! - `GET /stats` – Indexed chunk count and collection name.
//! - `DELETE /clear` – Remove every indexed chunk.
//! - `GET /test-llm` – Send a short probe prompt to the language model.
//! - `GET /metrics` – Ingestion and query counters.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.
//!
//! The HTTP surface shares the same [`KnowledgeBaseApi`] with the MCP server, so behavior is
//! identical across interfaces.

use crate::extract::{ContentEncoding, decode_content};
use crate::processing::{KnowledgeBaseApi, PipelineError, SearchResult};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Build the HTTP router exposing the knowledge base.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: KnowledgeBaseApi + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route("/upload", post(upload_documents::<S>))
        .route("/query", post(query_knowledge_base::<S>))
        .route("/search", post(search_knowledge_base::<S>))
        .route("/stats", get(get_stats::<S>))
        .route("/clear", delete(clear_knowledge_base::<S>))
        .route("/test-llm", get(test_llm::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .with_state(service)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "Knowledge Base Search Engine",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// One uploaded file.
#[derive(Deserialize)]
struct UploadFile {
    filename: String,
    /// File body, either text or base64 depending on `encoding`.
    content: String,
    #[serde(default)]
    encoding: ContentEncoding,
}

/// Request body for `POST /upload`.
#[derive(Deserialize)]
struct UploadRequest {
    files: Vec<UploadFile>,
}

/// Outcome for a single uploaded file.
#[derive(Serialize)]
struct UploadResult {
    filename: String,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_chunks: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct UploadResponse {
    results: Vec<UploadResult>,
}

/// Index every file in the request, collecting a per-file outcome.
async fn upload_documents<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<UploadRequest>,
) -> Json<UploadResponse>
where
    S: KnowledgeBaseApi,
{
    let mut results = Vec::with_capacity(request.files.len());
    for file in request.files {
        let ingested = match decode_content(&file.content, file.encoding) {
            Ok(bytes) => service.ingest_file(&file.filename, &bytes).await,
            Err(error) => Err(error.into()),
        };
        let result = match ingested {
            Ok(outcome) => UploadResult {
                filename: file.filename,
                success: true,
                num_chunks: Some(outcome.num_chunks),
                message: Some(format!(
                    "Successfully processed and indexed {} chunks",
                    outcome.num_chunks
                )),
                error: None,
            },
            Err(error) => {
                tracing::warn!(filename = %file.filename, error = %error, "Upload failed");
                UploadResult {
                    filename: file.filename,
                    success: false,
                    num_chunks: None,
                    message: None,
                    error: Some(error.to_string()),
                }
            }
        };
        results.push(result);
    }

    let succeeded = results.iter().filter(|result| result.success).count();
    tracing::info!(
        files = results.len(),
        succeeded,
        "Upload request completed"
    );
    Json(UploadResponse { results })
}

/// Request body shared by `POST /query` and `POST /search`.
#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    #[serde(default)]
    top_k: Option<usize>,
}

#[derive(Serialize)]
struct QueryResponse {
    success: bool,
    answer: String,
    query: String,
    sources: Vec<SearchResult>,
    num_sources: usize,
    model: String,
}

/// Answer a question from the indexed documents.
async fn query_knowledge_base<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError>
where
    S: KnowledgeBaseApi,
{
    let answer = service.ask(&request.query, request.top_k).await?;
    Ok(Json(QueryResponse {
        success: true,
        answer: answer.answer,
        query: answer.query,
        sources: answer.sources,
        num_sources: answer.num_sources,
        model: answer.model,
    }))
}

#[derive(Serialize)]
struct SearchResponse {
    success: bool,
    results: Vec<SearchResult>,
}

/// Return ranked chunks without invoking the language model.
async fn search_knowledge_base<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<SearchResponse>, AppError>
where
    S: KnowledgeBaseApi,
{
    let results = service.search(&request.query, request.top_k).await?;
    Ok(Json(SearchResponse {
        success: true,
        results,
    }))
}

async fn get_stats<S>(State(service): State<Arc<S>>) -> Result<Json<serde_json::Value>, AppError>
where
    S: KnowledgeBaseApi,
{
    let stats = service.stats().await?;
    Ok(Json(json!({
        "success": true,
        "total_chunks": stats.total_chunks,
        "collection_name": stats.collection_name,
    })))
}

async fn clear_knowledge_base<S>(
    State(service): State<Arc<S>>,
) -> Result<Json<serde_json::Value>, AppError>
where
    S: KnowledgeBaseApi,
{
    service.clear().await?;
    Ok(Json(json!({
        "success": true,
        "message": "Collection cleared successfully",
    })))
}

async fn test_llm<S>(State(service): State<Arc<S>>) -> Result<Json<serde_json::Value>, AppError>
where
    S: KnowledgeBaseApi,
{
    let response = service.check_generator().await?;
    Ok(Json(json!({
        "success": true,
        "model": service.model(),
        "message": "Connection successful",
        "response": response,
    })))
}

/// Return ingestion and query counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<crate::metrics::MetricsSnapshot>
where
    S: KnowledgeBaseApi,
{
    Json(service.metrics_snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "upload",
                method: "POST",
                path: "/upload",
                description: "Chunk, embed, and index text, PDF, or DOCX files. Binary files use \"encoding\": \"base64\". Returns one result per file.",
                request_example: Some(json!({
                    "files": [
                        { "filename": "notes.md", "content": "Document contents" },
                        { "filename": "report.pdf", "content": "JVBERi0xLjQK...", "encoding": "base64" }
                    ]
                })),
            },
            CommandDescriptor {
                name: "query",
                method: "POST",
                path: "/query",
                description: "Answer a question using the most relevant indexed chunks.",
                request_example: Some(json!({ "query": "What does the report conclude?", "top_k": 5 })),
            },
            CommandDescriptor {
                name: "search",
                method: "POST",
                path: "/search",
                description: "Return ranked chunks with similarity scores without generating an answer.",
                request_example: Some(json!({ "query": "quarterly revenue", "top_k": 3 })),
            },
            CommandDescriptor {
                name: "stats",
                method: "GET",
                path: "/stats",
                description: "Return the number of indexed chunks and the collection name.",
                request_example: None,
            },
            CommandDescriptor {
                name: "clear",
                method: "DELETE",
                path: "/clear",
                description: "Remove every indexed chunk.",
                request_example: None,
            },
            CommandDescriptor {
                name: "test_llm",
                method: "GET",
                path: "/test-llm",
                description: "Check that the configured language model answers a short prompt.",
                request_example: None,
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return ingestion and query counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

struct AppError(PipelineError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        tracing::error!(%status, error = %self.0, "Request failed");
        (
            status,
            Json(json!({ "success": false, "error": self.0.to_string() })),
        )
            .into_response()
    }
}

impl From<PipelineError> for AppError {
    fn from(inner: PipelineError) -> Self {
        Self(inner)
    }
}
