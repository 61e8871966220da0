//! MCP server entrypoint (stdio transport).
//!
//! Exposes the knowledge base tools over stdio for editor and agent integrations. Shares all
//! runtime configuration with the HTTP binary; logs go to stderr because stdout carries
//! protocol frames.
use anyhow::{Context, Result};
use kbsearch::{config, logging, mcp::KnowledgeBaseMcpServer, processing::KnowledgeBase};
use rmcp::{service::ServiceExt, transport::stdio};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::init_config().context("failed to load configuration")?;
    logging::init_tracing_stderr();

    let knowledge_base = Arc::new(KnowledgeBase::from_config(config).await?);
    let server = KnowledgeBaseMcpServer::new(knowledge_base);

    let service = server
        .serve(stdio())
        .await
        .context("failed to start MCP server over stdio")?;

    service
        .waiting()
        .await
        .context("MCP server terminated unexpectedly")?;

    Ok(())
}
