//! Tool handlers for the MCP server.

use crate::processing::PipelineError;
use rmcp::{ErrorData as McpError, model::JsonObject};
use serde::de::DeserializeOwned;
use serde_json::Value;

pub mod admin;
pub mod ingest;
pub mod retrieval;

/// Parse structured arguments supplied to a tool invocation.
pub(crate) fn parse_arguments<T: DeserializeOwned>(
    arguments: Option<JsonObject>,
) -> Result<T, McpError> {
    let value = arguments
        .map(Value::Object)
        .unwrap_or_else(|| Value::Object(JsonObject::new()));
    serde_json::from_value(value)
        .map_err(|err| McpError::invalid_params(format!("Invalid arguments: {err}"), None))
}

/// Map a pipeline failure onto the MCP error taxonomy.
pub(crate) fn pipeline_error(error: PipelineError) -> McpError {
    if error.is_client_error() {
        McpError::invalid_params(error.to_string(), None)
    } else {
        McpError::internal_error(error.to_string(), None)
    }
}
