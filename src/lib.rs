//! # kgraph-rs: Entity Knowledge Graph with Semantic Deduplication
//!
//! An in-memory graph of named entities and weighted relationships, kept
//! in step with a vector similarity index so that near-duplicate entities
//! can be caught before they are inserted.
//!
//! ## Design Principles
//!
//! 1. **Names are keys**: relationships reference entities by canonical name
//! 2. **Trait seams**: `EmbeddingProvider` and `IndexBackend` are the contracts
//!    to the outside world; the graph never talks HTTP itself
//! 3. **Index is best-effort**: an unreachable index degrades deduplication
//!    to name checks, it never blocks a graph mutation
//! 4. **Deterministic output**: insertion-ordered nodes, sorted aliases
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use kgraph::{
//!     Config, Entity, HashEmbedder, IntegrityChecker, KnowledgeGraph, MemoryIndex,
//!     Relationship,
//! };
//!
//! # fn example() -> kgraph::Result<()> {
//! let config = Config::default();
//! let mut graph = KnowledgeGraph::connect(
//!     config.graph,
//!     Arc::new(MemoryIndex::new()),
//!     Arc::new(HashEmbedder::new()),
//!     &config.index,
//! );
//!
//! graph.insert_node(Entity::new("Apple", "Company").with_description("Consumer electronics"));
//! graph.insert_node(Entity::new("Foxconn", "Company"));
//! graph.insert_edge(Relationship::new("Apple", "Foxconn", 0.9).with_title("supplier"))?;
//!
//! let checker = IntegrityChecker::new(config.dedup);
//! let check = checker.check_duplicates(&Entity::new("apple", "Company"), &graph);
//! assert!(check.is_duplicate());
//!
//! for path in graph.find_paths("Apple", "Foxconn", 3) {
//!     println!("{}", kgraph::format_path(&graph, &path));
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Similarity Index Backends
//!
//! | Backend | Feature | Description |
//! |---------|---------|-------------|
//! | Memory | (default) | Brute-force cosine search for testing/embedding |
//! | Chroma | `chroma` | Chroma server over its REST API |
//!
//! ## Embedding Providers
//!
//! | Provider | Feature | Description |
//! |----------|---------|-------------|
//! | Hash | (default) | Deterministic SHA-256 seeded vectors, no network |
//! | OpenAI | `openai` | `/embeddings` endpoint of an OpenAI-compatible API |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod config;
pub mod embedding;
pub mod index;
pub mod graph;
pub mod integrity;
pub mod ingest;
pub mod export;

// ============================================================================
// Re-exports: Model
// ============================================================================

pub use model::{Entity, Relationship, PathWeighting, RankedPath};

// ============================================================================
// Re-exports: Configuration
// ============================================================================

pub use config::{Config, GraphConfig, DedupConfig, IndexConfig};

// ============================================================================
// Re-exports: Embedding and index
// ============================================================================

pub use embedding::{EmbedError, EmbeddingProvider, HashEmbedder};
#[cfg(feature = "openai")]
pub use embedding::OpenAiEmbedder;
pub use index::{
    IndexBackend, IndexCapabilities, IndexEntry, IndexError, EntryMetadata,
    MemoryIndex, SearchHit, SimilarityIndex,
};
#[cfg(feature = "chroma")]
pub use index::ChromaIndex;

// ============================================================================
// Re-exports: Graph, integrity, ingestion, export
// ============================================================================

pub use graph::KnowledgeGraph;
pub use integrity::{
    check_duplicates, check_graph_integrity, DuplicateCheck, DuplicateMatch,
    IntegrityChecker, IntegrityReport, MatchReason, VectorTier,
};
pub use ingest::{CandidateBatch, CandidateSource, Ingestor, IngestReport, MergePolicy};
pub use export::{
    export_json, format_path, format_paths, from_snapshot, GraphSnapshot, GraphStats,
};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unknown endpoint: no entity named '{name}'")]
    UnknownEndpoint { name: String },

    #[error("Invalid weight {0}: must be finite and non-negative")]
    InvalidWeight(f64),

    #[error("Duplicate name: an entity named '{0}' already exists")]
    DuplicateName(String),

    #[error("Duplicate node id: snapshot id {0} is used by more than one node")]
    DuplicateNodeId(usize),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbedError),

    #[error("Similarity index error: {0}")]
    Index(#[from] IndexError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
