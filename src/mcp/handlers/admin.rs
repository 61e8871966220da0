//! Handlers for collection statistics, clearing, and metrics.

use std::sync::Arc;

use crate::processing::KnowledgeBaseApi;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use serde_json::json;

use super::pipeline_error;

/// Handle the `stats` tool.
pub(crate) async fn handle_stats(
    knowledge_base: &Arc<dyn KnowledgeBaseApi>,
) -> Result<CallToolResult, McpError> {
    let stats = knowledge_base.stats().await.map_err(pipeline_error)?;
    Ok(CallToolResult::structured(json!({
        "totalChunks": stats.total_chunks,
        "collectionName": stats.collection_name,
    })))
}

/// Handle the `clear` tool, dropping every indexed chunk.
pub(crate) async fn handle_clear(
    knowledge_base: &Arc<dyn KnowledgeBaseApi>,
) -> Result<CallToolResult, McpError> {
    knowledge_base.clear().await.map_err(pipeline_error)?;
    Ok(CallToolResult::structured(json!({
        "status": "ok",
        "message": "Collection cleared successfully",
    })))
}

/// Handle the `metrics` tool, returning the current counters.
pub(crate) async fn handle_metrics(
    knowledge_base: &Arc<dyn KnowledgeBaseApi>,
) -> Result<CallToolResult, McpError> {
    let snapshot = knowledge_base.metrics_snapshot();
    Ok(CallToolResult::structured(json!({
        "documentsIndexed": snapshot.documents_indexed,
        "chunksIndexed": snapshot.chunks_indexed,
        "queriesAnswered": snapshot.queries_answered,
    })))
}
