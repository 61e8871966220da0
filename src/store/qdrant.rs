//! HTTP client wrapper storing chunks in a Qdrant collection.

use super::{ChunkMetadata, IndexEntry, StoreError, StoredMatch, VectorStore};
use crate::config::Config;
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::time::Duration;
use time::OffsetDateTime;

/// Vector store backed by a single Qdrant collection using cosine distance.
pub struct QdrantStore {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    pub(crate) collection: String,
    pub(crate) dimension: usize,
}

impl QdrantStore {
    /// Connect using configuration values and make sure the collection exists.
    pub async fn connect(config: &Config) -> Result<Self, StoreError> {
        let client = Client::builder()
            .user_agent("kbsearch/0.1")
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        let base_url = normalize_base_url(&config.qdrant_url).map_err(StoreError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            has_api_key = config
                .qdrant_api_key
                .as_deref()
                .map(|value| !value.is_empty())
                .unwrap_or(false),
            "Initialized Qdrant HTTP client"
        );

        let store = Self {
            client,
            base_url,
            api_key: config.qdrant_api_key.clone(),
            collection: config.qdrant_collection_name.clone(),
            dimension: config.embedding_dimension,
        };
        store.create_collection_if_not_exists().await?;
        Ok(store)
    }

    async fn create_collection_if_not_exists(&self) -> Result<(), StoreError> {
        if self.collection_exists().await? {
            return Ok(());
        }
        self.create_collection().await
    }

    async fn create_collection(&self) -> Result<(), StoreError> {
        let body = json!({
            "vectors": {
                "size": self.dimension,
                "distance": "Cosine"
            }
        });

        let response = self
            .request(Method::PUT, &format!("collections/{}", self.collection))
            .json(&body)
            .send()
            .await?;

        ensure_success(response, || {
            tracing::debug!(
                collection = %self.collection,
                vector_size = self.dimension,
                "Collection created"
            );
        })
        .await
    }

    async fn collection_exists(&self) -> Result<bool, StoreError> {
        let response = self
            .request(Method::GET, &format!("collections/{}", self.collection))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = StoreError::UnexpectedStatus { status, body };
                tracing::error!(collection = %self.collection, error = %error, "Collection existence check failed");
                Err(error)
            }
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        req
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    fn name(&self) -> &str {
        &self.collection
    }

    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<(), StoreError> {
        if entries.is_empty() {
            return Ok(());
        }

        let now = current_timestamp_rfc3339();
        let points: Vec<Value> = entries
            .into_iter()
            .map(|entry| {
                json!({
                    "id": entry.id,
                    "vector": entry.vector,
                    "payload": build_payload(&entry.document, &entry.metadata, &now),
                })
            })
            .collect();

        let point_count = points.len();
        let response = self
            .request(
                Method::PUT,
                &format!("collections/{}/points", self.collection),
            )
            .query(&[("wait", true)])
            .json(&json!({ "points": points }))
            .send()
            .await?;

        ensure_success(response, || {
            tracing::debug!(
                collection = %self.collection,
                points = point_count,
                "Points indexed"
            );
        })
        .await
    }

    async fn query(&self, vector: Vec<f32>, k: usize) -> Result<Vec<StoredMatch>, StoreError> {
        if vector.len() != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let body = json!({
            "query": vector,
            "limit": k,
            "with_payload": true,
        });

        let response = self
            .request(
                Method::POST,
                &format!("collections/{}/points/query", self.collection),
            )
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = StoreError::UnexpectedStatus { status, body };
            tracing::error!(collection = %self.collection, error = %error, "Qdrant search failed");
            return Err(error);
        }

        let payload: QueryResponse = response.json().await?;
        let points = match payload.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points } => points,
        };

        Ok(points.into_iter().map(map_query_point).collect())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let response = self
            .request(
                Method::POST,
                &format!("collections/{}/points/count", self.collection),
            )
            .json(&json!({ "exact": true }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = StoreError::UnexpectedStatus { status, body };
            tracing::error!(collection = %self.collection, error = %error, "Qdrant count failed");
            return Err(error);
        }

        let CountResponse { result } = response.json().await?;
        Ok(result.count)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let response = self
            .request(Method::DELETE, &format!("collections/{}", self.collection))
            .send()
            .await?;

        if response.status() != StatusCode::NOT_FOUND {
            ensure_success(response, || {
                tracing::debug!(collection = %self.collection, "Collection deleted");
            })
            .await?;
        }

        self.create_collection().await?;
        tracing::info!(collection = %self.collection, "Collection cleared");
        Ok(())
    }
}

async fn ensure_success<F>(response: reqwest::Response, on_success: F) -> Result<(), StoreError>
where
    F: FnOnce(),
{
    if response.status().is_success() {
        on_success();
        Ok(())
    } else {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let error = StoreError::UnexpectedStatus { status, body };
        tracing::error!(error = %error, "Qdrant request failed");
        Err(error)
    }
}

/// Build the payload object stored alongside each indexed chunk.
fn build_payload(text: &str, metadata: &ChunkMetadata, indexed_at: &str) -> Value {
    let mut payload = Map::new();
    payload.insert("text".into(), Value::String(text.to_string()));
    payload.insert("filename".into(), Value::String(metadata.filename.clone()));
    payload.insert("chunk_index".into(), Value::from(metadata.chunk_index));
    payload.insert("total_chunks".into(), Value::from(metadata.total_chunks));
    payload.insert("indexed_at".into(), Value::String(indexed_at.to_string()));
    Value::Object(payload)
}

fn map_query_point(point: QueryPoint) -> StoredMatch {
    let QueryPoint { id, score, payload } = point;
    let mut payload = payload.unwrap_or_default();
    let document = match payload.remove("text") {
        Some(Value::String(text)) => text,
        _ => String::new(),
    };
    let metadata = serde_json::from_value(Value::Object(payload))
        .unwrap_or_else(|_| ChunkMetadata::new("Unknown", 0, 0));

    StoredMatch {
        id: stringify_point_id(id),
        document,
        metadata,
        // Qdrant reports cosine similarity as the score.
        distance: 1.0 - score,
    }
}

fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

fn stringify_point_id(id: Value) -> String {
    match id {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Deserialize)]
struct QueryResponse {
    result: QueryResponseResult,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QueryResponseResult {
    Points(Vec<QueryPoint>),
    Object {
        #[serde(default)]
        points: Vec<QueryPoint>,
    },
}

#[derive(Deserialize)]
struct QueryPoint {
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
struct CountResponse {
    result: CountResult,
}

#[derive(Deserialize)]
struct CountResult {
    count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{
        Method::{DELETE, POST, PUT},
        MockServer,
    };

    fn store_for(server: &MockServer) -> QdrantStore {
        QdrantStore {
            client: Client::builder()
                .user_agent("kbsearch-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
            api_key: Some("secret".into()),
            collection: "kb".into(),
            dimension: 2,
        }
    }

    #[tokio::test]
    async fn query_converts_scores_to_distances() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/kb/points/query")
                    .header("api-key", "secret");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": {
                        "points": [
                            {
                                "id": "chunk-1",
                                "score": 0.75,
                                "payload": {
                                    "text": "The cat sat.",
                                    "filename": "a.txt",
                                    "chunk_index": 0,
                                    "total_chunks": 2
                                }
                            },
                            { "id": 7, "score": 0.5, "payload": { "text": "orphan" } }
                        ]
                    }
                }));
            })
            .await;

        let hits = store_for(&server)
            .query(vec![0.1, 0.2], 2)
            .await
            .expect("query");

        mock.assert();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "chunk-1");
        assert_eq!(hits[0].document, "The cat sat.");
        assert_eq!(hits[0].metadata, ChunkMetadata::new("a.txt", 0, 2));
        assert!((hits[0].distance - 0.25).abs() < 1e-6);
        assert_eq!(hits[1].id, "7");
        assert_eq!(hits[1].metadata.filename, "Unknown");
    }

    #[tokio::test]
    async fn upsert_writes_payload_with_metadata() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/kb/points")
                    .query_param("wait", "true")
                    .body_contains("\"filename\":\"b.txt\"")
                    .body_contains("\"chunk_index\":1");
                then.status(200)
                    .json_body(json!({ "status": "ok", "result": { "status": "completed" } }));
            })
            .await;

        store_for(&server)
            .upsert(vec![IndexEntry {
                id: "id-1".into(),
                vector: vec![1.0, 0.0],
                document: "The dog ran.".into(),
                metadata: ChunkMetadata::new("b.txt", 1, 2),
            }])
            .await
            .expect("upsert");

        mock.assert();
    }

    #[tokio::test]
    async fn count_reads_exact_total() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/kb/points/count");
                then.status(200)
                    .json_body(json!({ "status": "ok", "result": { "count": 42 } }));
            })
            .await;

        assert_eq!(store_for(&server).count().await.expect("count"), 42);
    }

    #[tokio::test]
    async fn clear_recreates_collection() {
        let server = MockServer::start_async().await;
        let delete = server
            .mock_async(|when, then| {
                when.method(DELETE).path("/collections/kb");
                then.status(200).json_body(json!({ "status": "ok", "result": true }));
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/kb")
                    .body_contains("\"distance\":\"Cosine\"");
                then.status(200).json_body(json!({ "status": "ok", "result": true }));
            })
            .await;

        store_for(&server).clear().await.expect("clear");

        delete.assert();
        create.assert();
    }

    #[tokio::test]
    async fn rejected_write_surfaces_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/kb/points");
                then.status(400).body("wrong vector size");
            })
            .await;

        let error = store_for(&server)
            .upsert(vec![IndexEntry {
                id: "id-1".into(),
                vector: vec![1.0, 0.0],
                document: "text".into(),
                metadata: ChunkMetadata::new("c.txt", 0, 1),
            }])
            .await
            .expect_err("rejected");

        assert!(matches!(
            error,
            StoreError::UnexpectedStatus { status, .. } if status == StatusCode::BAD_REQUEST
        ));
    }
}
