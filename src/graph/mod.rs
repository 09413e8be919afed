//! # Knowledge Graph Store
//!
//! Owns the node map (name → entity) and the ordered edge list, and keeps
//! an attached [`SimilarityIndex`] in step with node mutations.
//!
//! ## Semantics
//!
//! - `insert_node` is the unconditional write path: it overwrites by name
//!   and performs no duplicate check. Run the integrity checker first.
//! - `insert_edge` fails with `UnknownEndpoint` when either endpoint is
//!   missing; in a bidirectional graph it also appends the mirror edge.
//! - Deletes return `bool` ("was anything removed") instead of erroring,
//!   and cascade: deleting a node removes every incident edge.
//! - Index synchronization is best-effort. A failed index write is logged
//!   and never fails the graph mutation.
//!
//! ## Limitations
//!
//! - **No internal locking**: callers must serialize mutation.
//! - **Linear edge scans**: edge lookups and deletes walk the edge list.

pub mod paths;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::config::{GraphConfig, IndexConfig};
use crate::embedding::EmbeddingProvider;
use crate::index::{IndexBackend, SimilarityIndex};
use crate::model::{Entity, Relationship};
use crate::{Error, Result};

// ============================================================================
// KnowledgeGraph
// ============================================================================

/// Directed, weighted entity graph.
#[derive(Debug)]
pub struct KnowledgeGraph {
    config: GraphConfig,
    /// Insertion-ordered so snapshot ids are stable.
    nodes: IndexMap<String, Entity>,
    edges: Vec<Relationship>,
    index: Option<SimilarityIndex>,
}

impl Default for KnowledgeGraph {
    fn default() -> Self {
        Self::new(GraphConfig::default())
    }
}

impl KnowledgeGraph {
    /// Graph without a similarity index.
    pub fn new(config: GraphConfig) -> Self {
        Self {
            config,
            nodes: IndexMap::new(),
            edges: Vec::new(),
            index: None,
        }
    }

    /// Graph kept in sync with an already-opened similarity index.
    pub fn with_index(config: GraphConfig, index: SimilarityIndex) -> Self {
        let mut graph = Self::new(config);
        graph.index = Some(index);
        graph
    }

    /// Open the similarity index and attach it. When the backend cannot
    /// be reached the graph runs without semantic deduplication.
    pub fn connect(
        config: GraphConfig,
        backend: Arc<dyn IndexBackend>,
        embedder: Arc<dyn EmbeddingProvider>,
        index_config: &IndexConfig,
    ) -> Self {
        match SimilarityIndex::open(backend, embedder, index_config) {
            Ok(index) => Self::with_index(config, index),
            Err(e) => {
                warn!(
                    collection = %index_config.collection,
                    error = %e,
                    "similarity index unavailable, continuing without semantic deduplication"
                );
                Self::new(config)
            }
        }
    }

    /// Rebuild a graph from stored parts (snapshot import).
    ///
    /// Edges are validated and kept in order. In a bidirectional graph an
    /// edge whose same-weight reverse is absent gets its mirror appended
    /// right after it; mirrors already present are not duplicated.
    pub(crate) fn restore(
        config: GraphConfig,
        nodes: Vec<Entity>,
        edges: Vec<Relationship>,
    ) -> Result<Self> {
        let mut graph = Self::new(config);
        for entity in nodes {
            graph.nodes.insert(entity.name.clone(), entity);
        }
        for rel in &edges {
            graph.validate_edge(rel)?;
        }

        let mirror = graph.config.bidirectional;
        let mut restored = Vec::with_capacity(edges.len());
        for rel in &edges {
            let mirrored = rel.start == rel.end
                || edges
                    .iter()
                    .any(|m| m.links(&rel.end, &rel.start) && m.weight == rel.weight);
            restored.push(rel.clone());
            if mirror && !mirrored {
                debug!(start = %rel.start, end = %rel.end, "restoring missing mirror edge");
                restored.push(rel.reversed());
            }
        }
        graph.edges = restored;
        Ok(graph)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn is_bidirectional(&self) -> bool {
        self.config.bidirectional
    }

    pub fn similarity_index(&self) -> Option<&SimilarityIndex> {
        self.index.as_ref()
    }

    pub fn node(&self, name: &str) -> Option<&Entity> {
        self.nodes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Entities in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Entity> {
        self.nodes.values()
    }

    /// Position of an entity in insertion order.
    pub fn node_position(&self, name: &str) -> Option<usize> {
        self.nodes.get_index_of(name)
    }

    pub fn edges(&self) -> &[Relationship] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn outgoing<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Relationship> {
        self.edges.iter().filter(move |e| e.start == name)
    }

    pub fn incoming<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Relationship> {
        self.edges.iter().filter(move |e| e.end == name)
    }

    /// Edges running exactly `start -> end`.
    pub fn edges_between<'a>(
        &'a self,
        start: &'a str,
        end: &'a str,
    ) -> impl Iterator<Item = &'a Relationship> {
        self.edges.iter().filter(move |e| e.links(start, end))
    }

    // ========================================================================
    // Similarity index lifecycle
    // ========================================================================

    /// Attach an index and back-fill entries for every existing node.
    /// Returns how many nodes were indexed.
    pub fn attach_index(&mut self, index: SimilarityIndex) -> usize {
        let mut indexed = 0;
        for entity in self.nodes.values_mut() {
            match index.add_entity(entity) {
                Ok(id) => {
                    entity.similarity_index_id = Some(id);
                    indexed += 1;
                }
                Err(e) => warn!(entity = %entity.name, error = %e, "failed to index entity"),
            }
        }
        debug!(indexed, total = self.nodes.len(), "similarity index attached");
        self.index = Some(index);
        indexed
    }

    /// Detach the index. Entries stay in the backend; graph mutations no
    /// longer touch it.
    pub fn detach_index(&mut self) -> Option<SimilarityIndex> {
        self.index.take()
    }

    // ========================================================================
    // Node mutation
    // ========================================================================

    /// Add or overwrite an entity by name. Returns the overwritten entity.
    ///
    /// With an index attached, the entity is embedded and written to the
    /// index (reusing the overwritten entity's entry id), and its
    /// `similarity_index_id` is set.
    pub fn insert_node(&mut self, mut entity: Entity) -> Option<Entity> {
        let previous_id = self
            .nodes
            .get(&entity.name)
            .and_then(|e| e.similarity_index_id.clone());

        if let Some(index) = &self.index {
            if entity.similarity_index_id.is_none() {
                entity.similarity_index_id = previous_id.clone();
            }
            match index.add_entity(&entity) {
                Ok(id) => entity.similarity_index_id = Some(id),
                Err(e) => warn!(entity = %entity.name, error = %e, "failed to index entity"),
            }
            if let Some(old) = previous_id.as_deref() {
                if entity.similarity_index_id.as_deref() != Some(old) {
                    remove_index_entry(index, old, &entity.name);
                }
            }
        }

        self.nodes.insert(entity.name.clone(), entity)
    }

    /// Remove an entity and every edge touching it. Returns false if the
    /// name was not present.
    pub fn delete_node(&mut self, name: &str) -> bool {
        let Some(entity) = self.nodes.shift_remove(name) else {
            return false;
        };
        let before = self.edges.len();
        self.edges.retain(|e| !e.touches(name));
        debug!(entity = %name, edges_removed = before - self.edges.len(), "node deleted");

        if let (Some(index), Some(id)) = (&self.index, entity.similarity_index_id.as_deref()) {
            remove_index_entry(index, id, name);
        }
        true
    }

    /// Change an entity's canonical name, re-keying the node map (keeping
    /// its position), every edge endpoint and the index entry.
    ///
    /// Returns false if `old` does not exist.
    pub fn rename_node(&mut self, old: &str, new: &str) -> Result<bool> {
        if old == new {
            return Ok(self.contains(old));
        }
        if self.nodes.contains_key(new) {
            return Err(Error::DuplicateName(new.to_string()));
        }
        let Some((position, _, mut entity)) = self.nodes.shift_remove_full(old) else {
            return Ok(false);
        };

        entity.name = new.to_string();
        for edge in &mut self.edges {
            if edge.start == old {
                edge.start = new.to_string();
            }
            if edge.end == old {
                edge.end = new.to_string();
            }
        }
        if let Some(index) = &self.index {
            match index.add_entity(&entity) {
                Ok(id) => entity.similarity_index_id = Some(id),
                Err(e) => warn!(entity = %new, error = %e, "failed to re-index renamed entity"),
            }
        }

        let (last, _) = self.nodes.insert_full(new.to_string(), entity);
        self.nodes.move_index(last, position);
        Ok(true)
    }

    /// Fold a duplicate candidate's names into an existing entity's aliases
    /// and refresh its index entry. Returns false if `canonical` is absent.
    pub fn merge_aliases(&mut self, canonical: &str, candidate: &Entity) -> bool {
        let Some(entity) = self.nodes.get_mut(canonical) else {
            return false;
        };
        entity.absorb_aliases(candidate);
        if let Some(index) = &self.index {
            match index.add_entity(entity) {
                Ok(id) => entity.similarity_index_id = Some(id),
                Err(e) => warn!(entity = %canonical, error = %e, "failed to re-index merged entity"),
            }
        }
        true
    }

    // ========================================================================
    // Edge mutation
    // ========================================================================

    /// Append an edge, plus its mirror in a bidirectional graph.
    ///
    /// Fails without touching the graph if an endpoint is unknown or the
    /// weight is negative or not finite. Self-loops are never mirrored.
    pub fn insert_edge(&mut self, rel: Relationship) -> Result<()> {
        self.validate_edge(&rel)?;
        let mirror = (self.config.bidirectional && rel.start != rel.end).then(|| rel.reversed());
        self.edges.push(rel);
        if let Some(mirror) = mirror {
            self.edges.push(mirror);
        }
        Ok(())
    }

    /// Remove every `start -> end` edge; in a bidirectional graph also every
    /// `end -> start` edge. Returns whether anything was removed.
    pub fn delete_edge(&mut self, start: &str, end: &str) -> bool {
        let before = self.edges.len();
        let bidirectional = self.config.bidirectional;
        self.edges
            .retain(|e| !(e.links(start, end) || (bidirectional && e.links(end, start))));
        self.edges.len() < before
    }

    fn validate_edge(&self, rel: &Relationship) -> Result<()> {
        if !rel.weight.is_finite() || rel.weight < 0.0 {
            return Err(Error::InvalidWeight(rel.weight));
        }
        for name in [&rel.start, &rel.end] {
            if !self.nodes.contains_key(name) {
                return Err(Error::UnknownEndpoint { name: name.clone() });
            }
        }
        Ok(())
    }
}

/// Best-effort index delete; failures are logged, never raised.
fn remove_index_entry(index: &SimilarityIndex, id: &str, name: &str) {
    match index.delete(id) {
        Ok(true) => {}
        Ok(false) => debug!(entity = %name, id, "index entry already absent"),
        Err(e) => warn!(entity = %name, id, error = %e, "failed to remove index entry; index may hold a stale entry"),
    }
}

impl fmt::Display for KnowledgeGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Graph(nodes={}, edges={})", self.nodes.len(), self.edges.len())
    }
}

// ============================================================================
// Tests
// ============================================================================
