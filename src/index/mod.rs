//! # Similarity Index
//!
//! A collection-scoped nearest-neighbour store holding one entry per
//! entity: vector, metadata and a denormalized document string.
//!
//! [`SimilarityIndex`] is the adapter the graph and the integrity checker
//! talk to. It owns the embedding provider and the collection name, and
//! delegates storage to an [`IndexBackend`].
//!
//! ## Backends
//!
//! | Backend | Module | Description |
//! |---------|--------|-------------|
//! | `MemoryIndex` | `memory` | Brute-force cosine search, for tests/embedding |
//! | `ChromaIndex` | `chroma` | Chroma server over REST (feature `chroma`) |
//!
//! Results are best-effort approximate nearest neighbours, ordered by
//! ascending distance. Distances are cosine distances, so
//! `similarity = 1 - distance`.

pub mod memory;
#[cfg(feature = "chroma")]
pub mod chroma;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::IndexConfig;
use crate::embedding::{entity_text, EmbedError, EmbeddingProvider};
use crate::model::Entity;

pub use memory::MemoryIndex;
#[cfg(feature = "chroma")]
pub use chroma::ChromaIndex;

// ============================================================================
// Errors
// ============================================================================

/// Errors raised by the similarity index.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("similarity index unavailable: {0}")]
    Unavailable(String),

    #[error("similarity index backend error: {0}")]
    Backend(String),

    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    #[error("expected {expected}-dimensional vector, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("operation not supported by this backend: {0}")]
    Unsupported(&'static str),

    #[error(transparent)]
    Embedding(#[from] EmbedError),
}

// ============================================================================
// Entries and hits
// ============================================================================

/// Metadata stored alongside every vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub entity_type: String,
    /// Comma-joined aliases; absent when the entity has none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aliases: Option<String>,
}

impl EntryMetadata {
    pub fn from_entity(entity: &Entity) -> Self {
        let aliases = if entity.aliases.is_empty() {
            None
        } else {
            Some(entity.aliases.iter().map(String::as_str).collect::<Vec<_>>().join(", "))
        };
        Self {
            name: entity.name.clone(),
            description: entity.description.clone(),
            entity_type: entity.entity_type.clone(),
            aliases,
        }
    }
}

/// One stored entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: EntryMetadata,
    pub document: String,
}

/// One search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub metadata: EntryMetadata,
    pub document: String,
    pub distance: f64,
}

impl SearchHit {
    pub fn similarity(&self) -> f64 {
        1.0 - self.distance
    }
}

/// Denormalized text stored with an entity's entry.
pub fn entity_document(entity: &Entity) -> String {
    format!("{}: {}", entity.name, entity.description)
}

// ============================================================================
// Backend trait
// ============================================================================

/// What a backend can do beyond the required operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexCapabilities {
    /// The backend embeds query text itself.
    pub text_search: bool,
}

/// The storage contract behind [`SimilarityIndex`].
///
/// Every call is blocking I/O with no built-in timeout or retry. Backends
/// return `IndexError::Unavailable` when they cannot be reached.
pub trait IndexBackend: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &str;

    fn capabilities(&self) -> IndexCapabilities {
        IndexCapabilities::default()
    }

    /// Cheap reachability probe.
    fn heartbeat(&self) -> Result<(), IndexError>;

    /// Create the collection if it does not exist.
    fn create_collection(&self, collection: &str) -> Result<(), IndexError>;

    /// Drop the collection and everything in it. Absent collections are not an error.
    fn drop_collection(&self, collection: &str) -> Result<(), IndexError>;

    /// Insert entries. An entry whose id already exists replaces it.
    fn add(&self, collection: &str, entries: Vec<IndexEntry>) -> Result<(), IndexError>;

    fn get(&self, collection: &str, id: &str) -> Result<Option<IndexEntry>, IndexError>;

    /// Remove an entry. Returns true if it existed.
    fn delete(&self, collection: &str, id: &str) -> Result<bool, IndexError>;

    fn count(&self, collection: &str) -> Result<usize, IndexError>;

    /// Up to `k` entries nearest to `vector`, ascending distance.
    fn query_by_vector(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>, IndexError>;

    /// Text-native search. Only called when `capabilities().text_search` is set.
    fn query_by_text(
        &self,
        _collection: &str,
        _query: &str,
        _k: usize,
    ) -> Result<Vec<SearchHit>, IndexError> {
        Err(IndexError::Unsupported("text search"))
    }
}

// ============================================================================
// SimilarityIndex adapter
// ============================================================================

/// Collection-scoped similarity index bound to one embedding provider.
#[derive(Clone)]
pub struct SimilarityIndex {
    backend: Arc<dyn IndexBackend>,
    embedder: Arc<dyn EmbeddingProvider>,
    collection: String,
}

impl std::fmt::Debug for SimilarityIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimilarityIndex")
            .field("backend", &self.backend.name())
            .field("embedder", &self.embedder.model_name())
            .field("collection", &self.collection)
            .finish()
    }
}

impl SimilarityIndex {
    /// Connect to the backend and make sure the collection exists,
    /// dropping it first when `config.reset` is set.
    pub fn open(
        backend: Arc<dyn IndexBackend>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: &IndexConfig,
    ) -> Result<Self, IndexError> {
        backend.heartbeat()?;
        if config.reset {
            backend.drop_collection(&config.collection)?;
        }
        backend.create_collection(&config.collection)?;
        debug!(
            backend = backend.name(),
            collection = %config.collection,
            model = embedder.model_name(),
            "similarity index opened"
        );
        Ok(Self { backend, embedder, collection: config.collection.clone() })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub fn backend(&self) -> &Arc<dyn IndexBackend> {
        &self.backend
    }

    /// Empty the collection.
    pub fn reset(&self) -> Result<(), IndexError> {
        self.backend.drop_collection(&self.collection)?;
        self.backend.create_collection(&self.collection)
    }

    /// Insert one entry and return its stored id: `id_hint` when given,
    /// otherwise a fresh UUID.
    pub fn add(
        &self,
        id_hint: Option<&str>,
        vector: Vec<f32>,
        metadata: EntryMetadata,
        document: String,
    ) -> Result<String, IndexError> {
        self.check_dimension(&vector)?;
        let id = id_hint.map_or_else(|| uuid::Uuid::new_v4().to_string(), str::to_string);
        self.backend.add(
            &self.collection,
            vec![IndexEntry { id: id.clone(), vector, metadata, document }],
        )?;
        Ok(id)
    }

    /// Embed and insert an entity, reusing its `similarity_index_id` as the id hint.
    pub fn add_entity(&self, entity: &Entity) -> Result<String, IndexError> {
        let vector = self.embedder.embed_entity(entity)?;
        self.add(
            entity.similarity_index_id.as_deref(),
            vector,
            EntryMetadata::from_entity(entity),
            entity_document(entity),
        )
    }

    /// Embed and insert many entities in one backend round trip.
    pub fn add_entities(&self, entities: &[Entity]) -> Result<Vec<String>, IndexError> {
        if entities.is_empty() {
            return Ok(Vec::new());
        }
        let texts: Vec<String> = entities.iter().map(entity_text).collect();
        let vectors = self.embedder.embed_batch(&texts)?;
        if vectors.len() != entities.len() {
            return Err(IndexError::Backend(format!(
                "embedded {} of {} entities",
                vectors.len(),
                entities.len()
            )));
        }

        let mut ids = Vec::with_capacity(entities.len());
        let mut batch = Vec::with_capacity(entities.len());
        for (entity, vector) in entities.iter().zip(vectors) {
            self.check_dimension(&vector)?;
            let id = entity
                .similarity_index_id
                .clone()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            ids.push(id.clone());
            batch.push(IndexEntry {
                id,
                vector,
                metadata: EntryMetadata::from_entity(entity),
                document: entity_document(entity),
            });
        }
        self.backend.add(&self.collection, batch)?;
        Ok(ids)
    }

    pub fn get(&self, id: &str) -> Result<Option<IndexEntry>, IndexError> {
        self.backend.get(&self.collection, id)
    }

    pub fn delete(&self, id: &str) -> Result<bool, IndexError> {
        self.backend.delete(&self.collection, id)
    }

    pub fn len(&self) -> Result<usize, IndexError> {
        self.backend.count(&self.collection)
    }

    pub fn is_empty(&self) -> Result<bool, IndexError> {
        Ok(self.len()? == 0)
    }

    /// Up to `k` nearest entries, most similar first.
    pub fn search_by_vector(&self, vector: &[f32], k: usize) -> Result<Vec<SearchHit>, IndexError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        self.check_dimension(vector)?;
        let mut hits = self.backend.query_by_vector(&self.collection, vector, k)?;
        sort_hits(&mut hits, k);
        Ok(hits)
    }

    /// Text search: native when the backend supports it, otherwise the
    /// query is embedded and searched by vector.
    pub fn search_by_text(&self, query: &str, k: usize) -> Result<Vec<SearchHit>, IndexError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        if self.backend.capabilities().text_search {
            let mut hits = self.backend.query_by_text(&self.collection, query, k)?;
            sort_hits(&mut hits, k);
            return Ok(hits);
        }
        let vector = self.embedder.embed(query)?;
        self.search_by_vector(&vector, k)
    }

    /// Entries nearest to an entity's embedding.
    pub fn search_entity(&self, entity: &Entity, k: usize) -> Result<Vec<SearchHit>, IndexError> {
        let vector = self.embedder.embed_entity(entity)?;
        self.search_by_vector(&vector, k)
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), IndexError> {
        let expected = self.embedder.dimension();
        if vector.len() != expected {
            return Err(IndexError::DimensionMismatch { expected, got: vector.len() });
        }
        Ok(())
    }
}

/// Backends promise ascending order; enforce it and the `k` bound anyway.
fn sort_hits(hits: &mut Vec<SearchHit>, k: usize) {
    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    hits.truncate(k);
}
