//! Chroma-style HTTP [`VectorStore`] backend.
//!
//! Talks to a remote vector database over its REST API: collection
//! get-or-create, `/upsert`, `/delete`, `/query` with a `where` metadata
//! filter, and `/get` for collection statistics. The backend computes
//! embeddings server-side from the submitted document text.
//!
//! Every transport or non-2xx failure maps to
//! [`PipelineError::StoreUnavailable`] — there is no local fallback for
//! similarity search, so callers treat it as fatal to the operation.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::config::StoreConfig;
use crate::error::PipelineError;
use crate::models::{Chunk, Fragment};

use super::{CollectionStats, VectorStore};

pub struct HttpVectorStore {
    base_url: String,
    collection: String,
    client: reqwest::Client,
    /// Backend collection id, resolved once on first use.
    collection_id: OnceCell<String>,
    timeout: Duration,
}

impl HttpVectorStore {
    pub fn new(config: &StoreConfig) -> Result<Self, PipelineError> {
        let base_url = config
            .url
            .as_deref()
            .ok_or_else(|| PipelineError::StoreUnavailable("store.url not configured".to_string()))?
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            base_url,
            collection: config.collection.clone(),
            client: reqwest::Client::new(),
            collection_id: OnceCell::new(),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    fn unavailable(detail: impl std::fmt::Display) -> PipelineError {
        PipelineError::StoreUnavailable(detail.to_string())
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, PipelineError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(Self::unavailable)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Self::unavailable(format!("HTTP {}: {}", status, detail)));
        }

        response.json().await.map_err(Self::unavailable)
    }

    /// Resolve (and create if needed) the backing collection, caching its id.
    async fn collection_id(&self) -> Result<&str, PipelineError> {
        self.collection_id
            .get_or_try_init(|| async {
                let body = serde_json::json!({
                    "name": self.collection,
                    "get_or_create": true,
                });
                let value = self.post("/api/v1/collections", body).await?;
                value
                    .get("id")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .ok_or_else(|| {
                        Self::unavailable("collection response missing id".to_string())
                    })
            })
            .await
            .map(|s| s.as_str())
    }

    fn metadata_value(chunk: &Chunk) -> Value {
        serde_json::json!({
            "framework": chunk.metadata.framework,
            "source_type": chunk.metadata.source_type.to_string(),
            "loaded_at": chunk.metadata.loaded_at.to_rfc3339(),
            "sequence_index": chunk.metadata.sequence_index,
            "hash": chunk.hash,
        })
    }
}

#[async_trait]
impl VectorStore for HttpVectorStore {
    async fn upsert(&self, chunks: &[Chunk]) -> Result<(), PipelineError> {
        if chunks.is_empty() {
            return Ok(());
        }
        let id = self.collection_id().await?.to_string();

        let ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        let documents: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let metadatas: Vec<Value> = chunks.iter().map(Self::metadata_value).collect();

        let body = serde_json::json!({
            "ids": ids,
            "documents": documents,
            "metadatas": metadatas,
        });
        self.post(&format!("/api/v1/collections/{}/upsert", id), body)
            .await?;
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> Result<(), PipelineError> {
        if ids.is_empty() {
            return Ok(());
        }
        let id = self.collection_id().await?.to_string();
        let body = serde_json::json!({ "ids": ids });
        self.post(&format!("/api/v1/collections/{}/delete", id), body)
            .await?;
        Ok(())
    }

    async fn query(
        &self,
        text: &str,
        framework: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Fragment>, PipelineError> {
        let id = self.collection_id().await?.to_string();

        let mut body = serde_json::json!({
            "query_texts": [text],
            "n_results": limit,
            "include": ["documents", "metadatas", "distances"],
        });
        if let Some(fw) = framework {
            body["where"] = serde_json::json!({ "framework": fw });
        }

        let value = self
            .post(&format!("/api/v1/collections/{}/query", id), body)
            .await?;
        parse_query_response(&value)
    }

    async fn collection_stats(&self) -> Result<CollectionStats, PipelineError> {
        let id = self.collection_id().await?.to_string();
        let body = serde_json::json!({ "include": ["metadatas"] });
        let value = self
            .post(&format!("/api/v1/collections/{}/get", id), body)
            .await?;

        let ids = value
            .get("ids")
            .and_then(|v| v.as_array())
            .ok_or_else(|| Self::unavailable("get response missing ids".to_string()))?;
        let metadatas = value
            .get("metadatas")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let mut stats = CollectionStats {
            total_chunks: ids.len(),
            ..CollectionStats::default()
        };
        for metadata in &metadatas {
            if let Some(fw) = metadata.get("framework").and_then(|v| v.as_str()) {
                *stats.frameworks.entry(fw.to_string()).or_insert(0) += 1;
            }
        }
        Ok(stats)
    }
}

/// Parse the nested single-query response shape: `ids[0]`, `documents[0]`,
/// `metadatas[0]`, `distances[0]` are parallel arrays for our one query text.
fn parse_query_response(value: &Value) -> Result<Vec<Fragment>, PipelineError> {
    fn first_row<'a>(value: &'a Value, key: &str) -> Option<&'a Vec<Value>> {
        value
            .get(key)
            .and_then(|v| v.as_array())
            .and_then(|rows| rows.first())
            .and_then(|row| row.as_array())
    }

    let ids = match first_row(value, "ids") {
        Some(ids) => ids,
        None => return Ok(Vec::new()),
    };
    let documents = first_row(value, "documents");
    let metadatas = first_row(value, "metadatas");
    let distances = first_row(value, "distances");

    let mut fragments = Vec::with_capacity(ids.len());
    for (i, id) in ids.iter().enumerate() {
        let chunk_id = match id.as_str() {
            Some(s) => s.to_string(),
            None => continue,
        };
        let text = documents
            .and_then(|d| d.get(i))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let metadata = metadatas.and_then(|m| m.get(i));
        let distance = distances
            .and_then(|d| d.get(i))
            .and_then(|v| v.as_f64())
            .unwrap_or(1.0);

        fragments.push(Fragment {
            chunk_id,
            text,
            hash: metadata
                .and_then(|m| m.get("hash"))
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            // Backends report cosine distance; invert so higher is better.
            score: 1.0 - distance,
            framework: metadata
                .and_then(|m| m.get("framework"))
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            sequence_index: metadata
                .and_then(|m| m.get("sequence_index"))
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as usize,
        });
    }
    Ok(fragments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_query_response_happy_path() {
        let value = serde_json::json!({
            "ids": [["redis:0", "redis:1"]],
            "documents": [["alpha text", "beta text"]],
            "metadatas": [[
                {"framework": "Redis", "sequence_index": 0, "hash": "h0"},
                {"framework": "Redis", "sequence_index": 1, "hash": "h1"}
            ]],
            "distances": [[0.1, 0.4]],
        });
        let fragments = parse_query_response(&value).unwrap();
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].chunk_id, "redis:0");
        assert!((fragments[0].score - 0.9).abs() < 1e-9);
        assert_eq!(fragments[1].sequence_index, 1);
        assert_eq!(fragments[1].framework, "Redis");
    }

    #[test]
    fn parse_query_response_empty() {
        let value = serde_json::json!({ "ids": [[]] });
        assert!(parse_query_response(&value).unwrap().is_empty());
        let value = serde_json::json!({});
        assert!(parse_query_response(&value).unwrap().is_empty());
    }
}
