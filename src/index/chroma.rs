//! Chroma similarity-index backend over the v1 REST API.
//!
//! Supported servers are Chroma 0.4.x and 0.5.x, which serve `/api/v1`.
//! Chroma 1.0 and later only serve `/api/v2` and fail the heartbeat, so
//! the graph falls back to running without semantic deduplication.
//!
//! The server stores vectors but does not embed query text, so this
//! backend does not advertise text search; queries are embedded locally.
//!
//! Collections are created with cosine space, so the distances Chroma
//! returns follow the same `similarity = 1 - distance` convention as the
//! in-memory backend. Collection ids are resolved once per name and cached.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{EntryMetadata, IndexBackend, IndexEntry, IndexError, SearchHit};

/// Blocking REST client for a Chroma server.
pub struct ChromaIndex {
    base_url: String,
    client: reqwest::blocking::Client,
    /// collection name → collection id
    collection_ids: RwLock<HashMap<String, String>>,
}

#[derive(Deserialize)]
struct CollectionResponse {
    id: String,
}

#[derive(Deserialize)]
struct GetResponse {
    ids: Vec<String>,
    #[serde(default)]
    embeddings: Option<Vec<Vec<f32>>>,
    #[serde(default)]
    metadatas: Option<Vec<Option<EntryMetadata>>>,
    #[serde(default)]
    documents: Option<Vec<Option<String>>>,
}

#[derive(Deserialize)]
struct QueryResponse {
    ids: Vec<Vec<String>>,
    #[serde(default)]
    distances: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<EntryMetadata>>>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
}

impl ChromaIndex {
    /// `base_url` such as `http://localhost:8000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::blocking::Client::new(),
            collection_ids: RwLock::new(HashMap::new()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.base_url, path)
    }

    fn collection_id(&self, collection: &str) -> Result<String, IndexError> {
        if let Some(id) = self.collection_ids.read().get(collection) {
            return Ok(id.clone());
        }
        let found: CollectionResponse = self.send(
            self.client.get(self.url(&format!("collections/{collection}"))),
        )?;
        self.collection_ids.write().insert(collection.to_string(), found.id.clone());
        Ok(found.id)
    }

    fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> Result<T, IndexError> {
        let response = request
            .send()
            .map_err(|e| IndexError::Unavailable(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(IndexError::Backend(format!("HTTP {status}: {body}")));
        }
        response.json().map_err(|e| IndexError::Backend(e.to_string()))
    }
}

impl IndexBackend for ChromaIndex {
    fn name(&self) -> &str {
        "chroma"
    }

    fn heartbeat(&self) -> Result<(), IndexError> {
        let _: serde_json::Value = self.send(self.client.get(self.url("heartbeat")))?;
        Ok(())
    }

    fn create_collection(&self, collection: &str) -> Result<(), IndexError> {
        let created: CollectionResponse = self.send(self.client.post(self.url("collections")).json(&json!({
            "name": collection,
            "metadata": { "hnsw:space": "cosine" },
            "get_or_create": true,
        })))?;
        debug!(collection, id = %created.id, "chroma collection ready");
        self.collection_ids.write().insert(collection.to_string(), created.id);
        Ok(())
    }

    fn drop_collection(&self, collection: &str) -> Result<(), IndexError> {
        self.collection_ids.write().remove(collection);
        let response = self
            .client
            .delete(self.url(&format!("collections/{collection}")))
            .send()
            .map_err(|e| IndexError::Unavailable(e.to_string()))?;
        if !response.status().is_success() {
            // Chroma rejects deleting a collection that does not exist.
            debug!(collection, status = %response.status(), "chroma collection not dropped");
        }
        Ok(())
    }

    fn add(&self, collection: &str, entries: Vec<IndexEntry>) -> Result<(), IndexError> {
        if entries.is_empty() {
            return Ok(());
        }
        let id = self.collection_id(collection)?;
        let mut ids = Vec::with_capacity(entries.len());
        let mut embeddings = Vec::with_capacity(entries.len());
        let mut metadatas = Vec::with_capacity(entries.len());
        let mut documents = Vec::with_capacity(entries.len());
        for entry in entries {
            ids.push(entry.id);
            embeddings.push(entry.vector);
            metadatas.push(entry.metadata);
            documents.push(entry.document);
        }
        let _: serde_json::Value = self.send(
            self.client.post(self.url(&format!("collections/{id}/upsert"))).json(&json!({
                "ids": ids,
                "embeddings": embeddings,
                "metadatas": metadatas,
                "documents": documents,
            })),
        )?;
        Ok(())
    }

    fn get(&self, collection: &str, id: &str) -> Result<Option<IndexEntry>, IndexError> {
        let cid = self.collection_id(collection)?;
        let found: GetResponse = self.send(
            self.client.post(self.url(&format!("collections/{cid}/get"))).json(&json!({
                "ids": [id],
                "include": ["embeddings", "metadatas", "documents"],
            })),
        )?;
        let Some(found_id) = found.ids.into_iter().next() else {
            return Ok(None);
        };
        let vector = found.embeddings.and_then(|e| e.into_iter().next()).unwrap_or_default();
        let metadata = found
            .metadatas
            .and_then(|m| m.into_iter().next().flatten())
            .ok_or_else(|| IndexError::Backend(format!("entry {found_id} has no metadata")))?;
        let document = found
            .documents
            .and_then(|d| d.into_iter().next().flatten())
            .unwrap_or_default();
        Ok(Some(IndexEntry { id: found_id, vector, metadata, document }))
    }

    fn delete(&self, collection: &str, id: &str) -> Result<bool, IndexError> {
        // Chroma's delete is silent about missing ids, so probe first.
        if self.get(collection, id)?.is_none() {
            return Ok(false);
        }
        let cid = self.collection_id(collection)?;
        let _: serde_json::Value = self.send(
            self.client
                .post(self.url(&format!("collections/{cid}/delete")))
                .json(&json!({ "ids": [id] })),
        )?;
        Ok(true)
    }

    fn count(&self, collection: &str) -> Result<usize, IndexError> {
        let cid = self.collection_id(collection)?;
        self.send(self.client.get(self.url(&format!("collections/{cid}/count"))))
    }

    fn query_by_vector(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>, IndexError> {
        let cid = self.collection_id(collection)?;
        let result: QueryResponse = self.send(
            self.client.post(self.url(&format!("collections/{cid}/query"))).json(&json!({
                "query_embeddings": [vector],
                "n_results": k,
                "include": ["metadatas", "documents", "distances"],
            })),
        )?;
        unpack_query(result)
    }
}

/// Flatten Chroma's column-oriented, one-query-per-row response.
fn unpack_query(result: QueryResponse) -> Result<Vec<SearchHit>, IndexError> {
    let ids = result.ids.into_iter().next().unwrap_or_default();
    let distances = result.distances.and_then(|d| d.into_iter().next()).unwrap_or_default();
    let metadatas = result.metadatas.and_then(|m| m.into_iter().next()).unwrap_or_default();
    let documents = result.documents.and_then(|d| d.into_iter().next()).unwrap_or_default();

    if distances.len() != ids.len() || metadatas.len() != ids.len() {
        return Err(IndexError::Backend(format!(
            "malformed query response: {} ids, {} distances, {} metadatas",
            ids.len(),
            distances.len(),
            metadatas.len()
        )));
    }

    let mut documents = documents.into_iter();
    ids.into_iter()
        .zip(distances)
        .zip(metadatas)
        .map(|((id, distance), metadata)| {
            let document = documents.next().flatten().unwrap_or_default();
            let metadata = metadata
                .ok_or_else(|| IndexError::Backend(format!("entry {id} has no metadata")))?;
            Ok(SearchHit { id, metadata, document, distance })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_building() {
        let chroma = ChromaIndex::new("http://localhost:8000/");
        assert_eq!(chroma.url("heartbeat"), "http://localhost:8000/api/v1/heartbeat");
    }

    #[test]
    fn test_unpack_query() {
        let raw = json!({
            "ids": [["a", "b"]],
            "distances": [[0.1, 0.4]],
            "metadatas": [[
                {"name": "Apple", "description": "", "type": "Company"},
                {"name": "Tesla", "description": "EVs", "type": "Company", "aliases": "TSLA"}
            ]],
            "documents": [["Apple: ", "Tesla: EVs"]]
        });
        let hits = unpack_query(serde_json::from_value(raw).unwrap()).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].metadata.name, "Apple");
        assert_eq!(hits[1].metadata.aliases.as_deref(), Some("TSLA"));
        assert_eq!(hits[1].document, "Tesla: EVs");
        assert_eq!(hits[0].distance, 0.1);
    }

    #[test]
    fn test_unpack_empty_query() {
        let raw = json!({ "ids": [[]], "distances": [[]], "metadatas": [[]], "documents": [[]] });
        assert!(unpack_query(serde_json::from_value(raw).unwrap()).unwrap().is_empty());
    }

    #[test]
    fn test_unpack_rejects_ragged_columns() {
        let raw = json!({ "ids": [["a"]], "distances": [[]], "metadatas": [[null]] });
        assert!(unpack_query(serde_json::from_value(raw).unwrap()).is_err());
    }

    #[test]
    fn test_unreachable_server() {
        let chroma = ChromaIndex::new("http://127.0.0.1:9");
        assert!(matches!(chroma.heartbeat(), Err(IndexError::Unavailable(_))));
    }
}
