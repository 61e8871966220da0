//! Handlers for the `search` and `ask` tools.

use std::sync::Arc;

use crate::processing::{KnowledgeBaseApi, SearchResult};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, JsonObject},
};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{parse_arguments, pipeline_error};

/// Arguments shared by the retrieval tools.
#[derive(Debug, Deserialize)]
pub(crate) struct QueryToolRequest {
    /// Question or search phrase.
    pub(crate) query: String,
    /// Optional cap on retrieved chunks.
    #[serde(default)]
    pub(crate) top_k: Option<usize>,
}

fn parse_query(arguments: Option<JsonObject>) -> Result<QueryToolRequest, McpError> {
    let args: QueryToolRequest = parse_arguments(arguments)?;
    if args.query.trim().is_empty() {
        return Err(McpError::invalid_params("`query` must not be empty", None));
    }
    if args.top_k == Some(0) {
        return Err(McpError::invalid_params("`top_k` must be at least 1", None));
    }
    Ok(args)
}

fn format_sources(results: Vec<SearchResult>) -> Vec<Value> {
    results
        .into_iter()
        .map(|result| {
            json!({
                "text": result.document,
                "filename": result.metadata.filename,
                "chunkIndex": result.metadata.chunk_index,
                "totalChunks": result.metadata.total_chunks,
                "similarity": result.similarity,
            })
        })
        .collect()
}

/// Handle the `search` tool, returning ranked chunks.
pub(crate) async fn handle_search(
    knowledge_base: &Arc<dyn KnowledgeBaseApi>,
    arguments: Option<JsonObject>,
) -> Result<CallToolResult, McpError> {
    let args = parse_query(arguments)?;
    let results = knowledge_base
        .search(&args.query, args.top_k)
        .await
        .map_err(pipeline_error)?;

    tracing::debug!(query_len = args.query.len(), hits = results.len(), "MCP search");
    Ok(CallToolResult::structured(json!({
        "query": args.query,
        "results": format_sources(results),
    })))
}

/// Handle the `ask` tool, returning a synthesised answer and its sources.
pub(crate) async fn handle_ask(
    knowledge_base: &Arc<dyn KnowledgeBaseApi>,
    arguments: Option<JsonObject>,
) -> Result<CallToolResult, McpError> {
    let args = parse_query(arguments)?;
    let answer = knowledge_base
        .ask(&args.query, args.top_k)
        .await
        .map_err(pipeline_error)?;

    Ok(CallToolResult::structured(json!({
        "answer": answer.answer,
        "query": answer.query,
        "model": answer.model,
        "numSources": answer.num_sources,
        "sources": format_sources(answer.sources),
    })))
}
