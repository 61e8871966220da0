//! Model Context Protocol (MCP) integration for the knowledge base.
//!
//! This module wires the retrieval pipeline into an MCP server so editors and agent hosts can
//! upload documents and ask questions over stdio. Tools: `upload`, `search`, `ask`, `stats`,
//! `clear`, and `metrics`.

mod handlers;
mod registry;
mod schemas;
mod server;

pub use server::KnowledgeBaseMcpServer;
