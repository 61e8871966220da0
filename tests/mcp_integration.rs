use std::{
    io::{Cursor, Write},
    sync::Arc,
};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use httpmock::{Method::POST, MockServer};
use kbsearch::{
    embedding::HashedEmbeddingClient,
    generation::OllamaGenerator,
    mcp::KnowledgeBaseMcpServer,
    processing::{KnowledgeBase, KnowledgeBaseSettings},
    store::MemoryStore,
};
use rmcp::{
    handler::client::ClientHandler,
    model::{self, CallToolRequestParam, ClientInfo, PaginatedRequestParam},
    service::{RoleClient, RoleServer, RunningService, Service, serve_directly},
    transport::async_rw::AsyncRwTransport,
};
use serde_json::{Value, json};
use tokio::io::split;
use zip::{ZipWriter, write::SimpleFileOptions};

const DIMENSION: usize = 64;

#[derive(Clone, Default)]
struct DummyClientHandler;

impl ClientHandler for DummyClientHandler {
    fn get_info(&self) -> ClientInfo {
        ClientInfo::default()
    }
}

struct TestHarness {
    service: RunningService<RoleClient, DummyClientHandler>,
    server: RunningService<RoleServer, KnowledgeBaseMcpServer>,
    _llm: MockServer,
}

impl TestHarness {
    async fn new() -> Self {
        let llm = MockServer::start_async().await;
        llm.mock_async(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(200).json_body(json!({
                "response": "The cat sat on the mat.",
                "done": true
            }));
        })
        .await;

        let knowledge_base = KnowledgeBase::new(
            Arc::new(HashedEmbeddingClient::new(DIMENSION)),
            Arc::new(MemoryStore::new("knowledge_base", DIMENSION)),
            Arc::new(OllamaGenerator::new(
                reqwest::Client::new(),
                llm.base_url(),
                "llama3".into(),
            )),
            KnowledgeBaseSettings {
                chunk_size: 1000,
                chunk_overlap: 200,
                top_k: 5,
                similarity_threshold: 0.0,
                max_answer_tokens: 500,
                max_file_size_mb: 10,
            },
        );
        let server = KnowledgeBaseMcpServer::new(Arc::new(knowledge_base));

        let (client_stream, server_stream) = tokio::io::duplex(64 * 1024);
        let (client_read, client_write) = split(client_stream);
        let (server_read, server_write) = split(server_stream);

        let client_transport = AsyncRwTransport::new_client(client_read, client_write);
        let server_transport = AsyncRwTransport::new_server(server_read, server_write);

        let server_info = server.get_info();
        let client_handler = DummyClientHandler;
        let client_info = ClientHandler::get_info(&client_handler);

        let server =
            serve_directly::<RoleServer, _, _, _, _>(server, server_transport, Some(client_info));
        let service = serve_directly::<RoleClient, _, _, _, _>(
            client_handler,
            client_transport,
            Some(server_info),
        );

        Self {
            service,
            server,
            _llm: llm,
        }
    }

    async fn call(&self, name: &'static str, arguments: Value) -> Value {
        let response = self
            .service
            .call_tool(CallToolRequestParam {
                name: name.into(),
                arguments: arguments.as_object().cloned(),
            })
            .await
            .unwrap_or_else(|err| panic!("{name} tool call failed: {err:?}"));
        assert_eq!(response.is_error, Some(false));
        response.structured_content.expect("structured payload")
    }

    async fn shutdown(self) {
        let Self {
            service, server, ..
        } = self;
        let _ = service.cancel().await;
        let _ = server.cancel().await;
    }
}

#[tokio::test]
async fn initialize_and_list_tools() {
    let harness = TestHarness::new().await;
    let service = &harness.service;

    let info = service
        .peer_info()
        .expect("server info should be initialized");
    assert_eq!(info.server_info.name, "kbsearch");
    assert!(info.capabilities.tools.is_some());

    let tools_result = service
        .list_tools(Some(PaginatedRequestParam { cursor: None }))
        .await
        .expect("list_tools");
    let names: Vec<_> = tools_result
        .tools
        .iter()
        .map(|tool| tool.name.as_ref())
        .collect();

    for expected in ["upload", "search", "ask", "stats", "clear"] {
        assert!(names.contains(&expected), "missing tool {expected}");
    }

    harness.shutdown().await;
}

#[tokio::test]
async fn upload_search_ask_roundtrip() {
    let harness = TestHarness::new().await;

    let upload = harness
        .call(
            "upload",
            json!({ "filename": "pets.txt", "text": "The cat sat on the mat." }),
        )
        .await;
    assert_eq!(upload["status"], "ok");
    assert_eq!(upload["chunksIndexed"], 1);

    let search = harness
        .call("search", json!({ "query": "cat on mat", "top_k": 3 }))
        .await;
    let results = search["results"].as_array().expect("results array");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["filename"], "pets.txt");

    let ask = harness
        .call("ask", json!({ "query": "Where did the cat sit?" }))
        .await;
    assert_eq!(ask["answer"], "The cat sat on the mat.");
    assert_eq!(ask["model"], "llama3");
    assert_eq!(ask["numSources"], 1);

    let stats = harness.call("stats", json!({})).await;
    assert_eq!(stats["totalChunks"], 1);
    assert_eq!(stats["collectionName"], "knowledge_base");

    let metrics = harness.call("metrics", json!({})).await;
    assert_eq!(metrics["documentsIndexed"], 1);
    assert_eq!(metrics["queriesAnswered"], 1);

    harness.call("clear", json!({})).await;
    let stats = harness.call("stats", json!({})).await;
    assert_eq!(stats["totalChunks"], 0);

    harness.shutdown().await;
}

#[tokio::test]
async fn ask_on_empty_knowledge_base_returns_fallback() {
    let harness = TestHarness::new().await;

    let ask = harness.call("ask", json!({ "query": "Anything?" })).await;
    assert_eq!(ask["numSources"], 0);
    assert!(
        ask["answer"]
            .as_str()
            .unwrap()
            .starts_with("I couldn't find any relevant information")
    );

    assert!(ask["sources"].as_array().unwrap().is_empty());

    harness.shutdown().await;
}

#[tokio::test]
async fn invalid_payload_returns_error() {
    let harness = TestHarness::new().await;
    let service = &harness.service;

    let err = service
        .call_tool(CallToolRequestParam {
            name: "upload".into(),
            arguments: Some(
                json!({ "filename": "empty.txt", "text": "" })
                    .as_object()
                    .unwrap()
                    .clone(),
            ),
        })
        .await
        .expect_err("upload should fail");

    match err {
        rmcp::service::ServiceError::McpError(data) => {
            assert_eq!(data.code, model::ErrorCode::INVALID_PARAMS);
        }
        other => panic!("expected MCP error, got {other:?}"),
    }

    harness.shutdown().await;
}

fn docx_bytes(paragraph: &str) -> Vec<u8> {
    let xml = format!(
        r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>{paragraph}</w:t></w:r></w:p></w:body></w:document>"#
    );
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("word/document.xml", SimpleFileOptions::default())
        .expect("start docx part");
    writer.write_all(xml.as_bytes()).expect("write docx part");
    writer.finish().expect("finish docx").into_inner()
}

#[tokio::test]
async fn base64_docx_upload_is_searchable() {
    let harness = TestHarness::new().await;

    let upload = harness
        .call(
            "upload",
            json!({
                "filename": "handbook.docx",
                "text": STANDARD.encode(docx_bytes("Vacation requests need two weeks notice.")),
                "encoding": "base64"
            }),
        )
        .await;
    assert_eq!(upload["chunksIndexed"], 1);

    let search = harness
        .call("search", json!({ "query": "vacation notice" }))
        .await;
    assert_eq!(
        search["results"][0]["text"],
        "Vacation requests need two weeks notice."
    );
    assert_eq!(search["results"][0]["filename"], "handbook.docx");

    let err = harness
        .service
        .call_tool(CallToolRequestParam {
            name: "upload".into(),
            arguments: json!({ "filename": "x.docx", "text": "%%%", "encoding": "base64" })
                .as_object()
                .cloned(),
        })
        .await
        .expect_err("bad base64 should fail");
    match err {
        rmcp::service::ServiceError::McpError(data) => {
            assert_eq!(data.code, model::ErrorCode::INVALID_PARAMS);
        }
        other => panic!("expected MCP error, got {other:?}"),
    }

    harness.shutdown().await;
}
