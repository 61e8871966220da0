//! MCP server bootstrap and request dispatch.

use std::{borrow::Cow, sync::Arc};

use crate::{
    mcp::{
        handlers::{
            admin::{handle_clear, handle_metrics, handle_stats},
            ingest::handle_upload,
            retrieval::{handle_ask, handle_search},
        },
        registry, schemas,
    },
    processing::KnowledgeBaseApi,
};
use rmcp::{
    ErrorData as McpError,
    handler::server::ServerHandler,
    model::{
        CallToolRequestParam, CallToolResult, ListToolsResult, ServerCapabilities, ServerInfo,
        Tool, ToolAnnotations,
    },
};

/// MCP server implementation exposing knowledge base operations.
#[derive(Clone)]
pub struct KnowledgeBaseMcpServer {
    knowledge_base: Arc<dyn KnowledgeBaseApi>,
    registry: Arc<registry::Registry>,
}

impl KnowledgeBaseMcpServer {
    /// Create a new MCP server on top of the supplied knowledge base.
    pub fn new(knowledge_base: Arc<dyn KnowledgeBaseApi>) -> Self {
        let mut registry = registry::Registry::new();
        registry.register_tool("upload", tool_upload);
        registry.register_tool("search", tool_search);
        registry.register_tool("ask", tool_ask);
        registry.register_tool("stats", tool_stats);
        registry.register_tool("clear", tool_clear);
        registry.register_tool("metrics", tool_metrics);

        Self {
            knowledge_base,
            registry: Arc::new(registry),
        }
    }

    fn describe_tools(&self) -> Vec<Tool> {
        let query_schema = Arc::new(schemas::query_input_schema());
        let empty_schema = Arc::new(schemas::empty_object_schema());
        vec![
            Tool {
                name: Cow::Borrowed("upload"),
                title: Some("Upload Document".to_string()),
                description: Some(Cow::Borrowed(
                    "Add a text document to the knowledge base so later questions can cite it.",
                )),
                input_schema: Arc::new(schemas::upload_input_schema()),
                output_schema: None,
                annotations: Some(
                    ToolAnnotations::with_title("Upload Document")
                        .destructive(false)
                        .idempotent(false)
                        .open_world(false),
                ),
                icons: None,
            },
            Tool {
                name: Cow::Borrowed("search"),
                title: Some("Search Knowledge Base".to_string()),
                description: Some(Cow::Borrowed(
                    "Retrieve the chunks most similar to a query, with filenames and similarity scores.",
                )),
                input_schema: query_schema.clone(),
                output_schema: None,
                annotations: Some(
                    ToolAnnotations::with_title("Search Knowledge Base")
                        .read_only(true)
                        .idempotent(true)
                        .open_world(false),
                ),
                icons: None,
            },
            Tool {
                name: Cow::Borrowed("ask"),
                title: Some("Ask Knowledge Base".to_string()),
                description: Some(Cow::Borrowed(
                    "Answer a question using only the indexed documents; sources are returned alongside the answer.",
                )),
                input_schema: query_schema,
                output_schema: None,
                annotations: Some(
                    ToolAnnotations::with_title("Ask Knowledge Base")
                        .read_only(true)
                        .idempotent(false)
                        .open_world(true),
                ),
                icons: None,
            },
            Tool {
                name: Cow::Borrowed("stats"),
                title: Some("Collection Stats".to_string()),
                description: Some(Cow::Borrowed(
                    "Report how many chunks are indexed and in which collection.",
                )),
                input_schema: empty_schema.clone(),
                output_schema: None,
                annotations: Some(
                    ToolAnnotations::with_title("Collection Stats")
                        .read_only(true)
                        .idempotent(true)
                        .open_world(false),
                ),
                icons: None,
            },
            Tool {
                name: Cow::Borrowed("clear"),
                title: Some("Clear Knowledge Base".to_string()),
                description: Some(Cow::Borrowed(
                    "Delete every indexed chunk. The collection stays usable.",
                )),
                input_schema: empty_schema.clone(),
                output_schema: None,
                annotations: Some(
                    ToolAnnotations::with_title("Clear Knowledge Base")
                        .destructive(true)
                        .idempotent(true)
                        .open_world(false),
                ),
                icons: None,
            },
            Tool {
                name: Cow::Borrowed("metrics"),
                title: Some("Metrics Snapshot".to_string()),
                description: Some(Cow::Borrowed(
                    "Check ingestion volume and answered queries at a glance.",
                )),
                input_schema: empty_schema,
                output_schema: None,
                annotations: Some(
                    ToolAnnotations::with_title("Metrics Snapshot")
                        .read_only(true)
                        .idempotent(true)
                        .open_world(false),
                ),
                icons: None,
            },
        ]
    }
}

fn tool_upload(
    server: &KnowledgeBaseMcpServer,
    request: CallToolRequestParam,
) -> registry::ToolFuture {
    let knowledge_base = server.knowledge_base.clone();
    Box::pin(async move { handle_upload(&knowledge_base, request.arguments).await })
}

fn tool_search(
    server: &KnowledgeBaseMcpServer,
    request: CallToolRequestParam,
) -> registry::ToolFuture {
    let knowledge_base = server.knowledge_base.clone();
    Box::pin(async move { handle_search(&knowledge_base, request.arguments).await })
}

fn tool_ask(server: &KnowledgeBaseMcpServer, request: CallToolRequestParam) -> registry::ToolFuture {
    let knowledge_base = server.knowledge_base.clone();
    Box::pin(async move { handle_ask(&knowledge_base, request.arguments).await })
}

fn tool_stats(
    server: &KnowledgeBaseMcpServer,
    _request: CallToolRequestParam,
) -> registry::ToolFuture {
    let knowledge_base = server.knowledge_base.clone();
    Box::pin(async move { handle_stats(&knowledge_base).await })
}

fn tool_clear(
    server: &KnowledgeBaseMcpServer,
    _request: CallToolRequestParam,
) -> registry::ToolFuture {
    let knowledge_base = server.knowledge_base.clone();
    Box::pin(async move { handle_clear(&knowledge_base).await })
}

fn tool_metrics(
    server: &KnowledgeBaseMcpServer,
    _request: CallToolRequestParam,
) -> registry::ToolFuture {
    let knowledge_base = server.knowledge_base.clone();
    Box::pin(async move { handle_metrics(&knowledge_base).await })
}

impl ServerHandler for KnowledgeBaseMcpServer {
    fn get_info(&self) -> ServerInfo {
        let mut implementation = rmcp::model::Implementation::from_build_env();
        implementation.name = "kbsearch".to_string();
        implementation.title = Some("Knowledge Base Search".to_string());
        implementation.version = env!("CARGO_PKG_VERSION").to_string();

        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: implementation,
            instructions: Some(
                "Upload text documents, then ask questions answered only from them. Use search to inspect the retrieved chunks without generating an answer.".into(),
            ),
            ..ServerInfo::default()
        }
    }

    fn list_tools(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let tools = self.describe_tools();
        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }

    #[allow(clippy::manual_async_fn)]
    fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        async move {
            if let Some(handler) = self.registry.tools.get(request.name.as_ref()) {
                tracing::debug!(tool = %request.name, "Dispatching MCP tool");
                return handler(self, request).await;
            }

            Err(McpError::invalid_params(
                format!("Unknown tool: {}", request.name),
                None,
            ))
        }
    }
}
