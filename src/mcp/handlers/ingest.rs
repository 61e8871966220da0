//! MCP handler for document ingestion.

use std::sync::Arc;

use crate::extract::{ContentEncoding, decode_content};
use crate::processing::{KnowledgeBaseApi, PipelineError};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, JsonObject},
};
use serde::Deserialize;
use serde_json::json;

use super::{parse_arguments, pipeline_error};

/// Request payload accepted by the `upload` tool.
#[derive(Debug, Deserialize)]
pub(crate) struct UploadToolRequest {
    /// Name the chunks are attributed to.
    pub(crate) filename: String,
    /// Raw document text to ingest, or base64 file bytes.
    pub(crate) text: String,
    /// How `text` is encoded.
    #[serde(default)]
    pub(crate) encoding: ContentEncoding,
}

/// Handle the `upload` tool by extracting, cleaning, chunking, embedding, and indexing the
/// supplied document.
pub(crate) async fn handle_upload(
    knowledge_base: &Arc<dyn KnowledgeBaseApi>,
    arguments: Option<JsonObject>,
) -> Result<CallToolResult, McpError> {
    let args: UploadToolRequest = parse_arguments(arguments)?;
    if args.filename.trim().is_empty() {
        return Err(McpError::invalid_params(
            "`filename` must not be empty",
            None,
        ));
    }
    if args.text.trim().is_empty() {
        return Err(McpError::invalid_params("`text` must not be empty", None));
    }

    let bytes = decode_content(&args.text, args.encoding)
        .map_err(|error| pipeline_error(PipelineError::from(error)))?;
    let outcome = knowledge_base
        .ingest_file(&args.filename, &bytes)
        .await
        .map_err(pipeline_error)?;

    Ok(CallToolResult::structured(json!({
        "status": "ok",
        "filename": outcome.filename,
        "chunksIndexed": outcome.num_chunks,
    })))
}
