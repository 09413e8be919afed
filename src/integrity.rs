//! # Integrity Checks
//!
//! Duplicate detection for candidate entities, run before they are
//! inserted, plus a whole-graph consistency report.
//!
//! ## Duplicate tiers
//!
//! Evaluated in order; the first match wins.
//!
//! | Tier | Test | Reported similarity |
//! |------|------|---------------------|
//! | 1 | candidate name is already a node key | 1.0 |
//! | 2 | nearest index hit has `1 - distance >= threshold` | computed |
//! | 3 | case-insensitive name equality | 0.9 |
//! | 4 | candidate name equals an existing alias (case-insensitive) | 0.8 |
//!
//! Tier 2 only runs when the graph has a similarity index. Embedding or
//! index failures are logged and the check falls through to tier 3, so
//! a check always resolves to a decision.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::DedupConfig;
use crate::embedding::EmbeddingProvider;
use crate::graph::KnowledgeGraph;
use crate::model::Entity;

/// Fixed similarity reported for a case-insensitive name match.
pub const CASE_INSENSITIVE_SIMILARITY: f64 = 0.9;
/// Fixed similarity reported for a name-matches-alias match.
pub const ALIAS_SIMILARITY: f64 = 0.8;

// ============================================================================
// Results
// ============================================================================

/// Which tier matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchReason {
    ExactName,
    SemanticSimilarity,
    CaseInsensitiveName,
    AliasMatch,
}

impl MatchReason {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchReason::ExactName => "exact name match",
            MatchReason::SemanticSimilarity => "semantic similarity",
            MatchReason::CaseInsensitiveName => "case-insensitive name match",
            MatchReason::AliasMatch => "name matches alias",
        }
    }
}

impl fmt::Display for MatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The existing entity a candidate duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateMatch {
    pub entity: Entity,
    pub similarity: f64,
    pub reason: MatchReason,
}

/// Outcome of the vector tier, kept so callers can tell "no match" from
/// "search failed".
#[derive(Debug, Clone, PartialEq)]
pub enum VectorTier {
    /// No similarity index attached.
    Skipped,
    /// Not reached: tier 1 matched.
    NotReached,
    /// Searched; nothing at or above the threshold.
    NoMatch { best_similarity: Option<f64> },
    Matched,
    /// Embedding or index call failed; fallback tiers decided.
    Failed(String),
}

/// Result of a duplicate check.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateCheck {
    pub matched: Option<DuplicateMatch>,
    pub vector_tier: VectorTier,
}

impl DuplicateCheck {
    pub fn is_duplicate(&self) -> bool {
        self.matched.is_some()
    }

    /// `(is_duplicate, match)`.
    pub fn into_parts(self) -> (bool, Option<DuplicateMatch>) {
        (self.matched.is_some(), self.matched)
    }
}

// ============================================================================
// IntegrityChecker
// ============================================================================

/// Decides whether a candidate entity duplicates one already in a graph.
#[derive(Clone)]
pub struct IntegrityChecker {
    config: DedupConfig,
    /// Embeds candidates for the vector tier. Falls back to the index's
    /// own provider, which is the one its entries were built with.
    embedder: Option<Arc<dyn EmbeddingProvider>>,
}

impl IntegrityChecker {
    pub fn new(config: DedupConfig) -> Self {
        Self { config, embedder: None }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    /// Run the tiers against `graph`.
    pub fn check_duplicates(&self, candidate: &Entity, graph: &KnowledgeGraph) -> DuplicateCheck {
        if let Some(existing) = graph.node(&candidate.name) {
            return DuplicateCheck {
                matched: Some(DuplicateMatch {
                    entity: existing.clone(),
                    similarity: 1.0,
                    reason: MatchReason::ExactName,
                }),
                vector_tier: VectorTier::NotReached,
            };
        }

        let (vector_tier, found) = self.vector_tier(candidate, graph);
        if found.is_some() {
            return DuplicateCheck { matched: found, vector_tier };
        }
        DuplicateCheck { matched: fallback_match(candidate, graph), vector_tier }
    }

    /// Tier 2. The nearest hit counts when its similarity reaches the
    /// threshold (inclusive) and it still names a node in the graph.
    fn vector_tier(&self, candidate: &Entity, graph: &KnowledgeGraph) -> (VectorTier, Option<DuplicateMatch>) {
        let Some(index) = graph.similarity_index() else {
            return (VectorTier::Skipped, None);
        };
        let embedder = self.embedder.as_ref().unwrap_or_else(|| index.embedder());

        let vector = match embedder.embed_entity(candidate) {
            Ok(v) => v,
            Err(e) => {
                warn!(candidate = %candidate.name, error = %e, "embedding failed, falling back to name checks");
                return (VectorTier::Failed(e.to_string()), None);
            }
        };
        let hits = match index.search_by_vector(&vector, self.config.top_k) {
            Ok(hits) => hits,
            Err(e) => {
                warn!(candidate = %candidate.name, error = %e, "similarity search failed, falling back to name checks");
                return (VectorTier::Failed(e.to_string()), None);
            }
        };

        let Some(nearest) = hits.first() else {
            return (VectorTier::NoMatch { best_similarity: None }, None);
        };
        let similarity = nearest.similarity();
        let no_match = VectorTier::NoMatch { best_similarity: Some(similarity) };
        debug!(candidate = %candidate.name, nearest = %nearest.metadata.name, similarity, "nearest index hit");
        if similarity < self.config.similarity_threshold {
            return (no_match, None);
        }

        match graph.node(&nearest.metadata.name) {
            Some(existing) => (
                VectorTier::Matched,
                Some(DuplicateMatch {
                    entity: existing.clone(),
                    similarity,
                    reason: MatchReason::SemanticSimilarity,
                }),
            ),
            None => {
                warn!(candidate = %candidate.name, stale = %nearest.metadata.name, "index hit names an entity missing from the graph");
                (no_match, None)
            }
        }
    }
}

/// Tiers 3 and 4: linear scans over the existing entities.
fn fallback_match(candidate: &Entity, graph: &KnowledgeGraph) -> Option<DuplicateMatch> {
    if let Some(existing) = graph.nodes().find(|e| e.name_matches(&candidate.name)) {
        return Some(DuplicateMatch {
            entity: existing.clone(),
            similarity: CASE_INSENSITIVE_SIMILARITY,
            reason: MatchReason::CaseInsensitiveName,
        });
    }
    graph.nodes().find(|e| e.has_alias(&candidate.name)).map(|existing| DuplicateMatch {
        entity: existing.clone(),
        similarity: ALIAS_SIMILARITY,
        reason: MatchReason::AliasMatch,
    })
}

/// One-shot duplicate check with the index's own embedding provider.
pub fn check_duplicates(
    candidate: &Entity,
    graph: &KnowledgeGraph,
    config: &DedupConfig,
) -> DuplicateCheck {
    IntegrityChecker::new(*config).check_duplicates(candidate, graph)
}

// ============================================================================
// Whole-graph report
// ============================================================================

/// Consistency problems found in a graph. Each entry is a human-readable line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub duplicate_nodes: Vec<String>,
    pub orphaned_nodes: Vec<String>,
    pub invalid_edges: Vec<String>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.duplicate_nodes.is_empty() && self.orphaned_nodes.is_empty() && self.invalid_edges.is_empty()
    }
}

/// Scan a graph for entities that look like the same thing, entities with
/// no edges, and edges that break the store's invariants.
pub fn check_graph_integrity(graph: &KnowledgeGraph) -> IntegrityReport {
    let mut report = IntegrityReport::default();

    let mut by_lower: HashMap<String, Vec<&str>> = HashMap::new();
    // Keyed by lowercased alias, in first-seen order.
    let mut alias_owners: IndexMap<String, Vec<&str>> = IndexMap::new();
    for entity in graph.nodes() {
        by_lower.entry(entity.name.to_lowercase()).or_default().push(&entity.name);
        for alias in &entity.aliases {
            let owners = alias_owners.entry(alias.to_lowercase()).or_default();
            if !owners.contains(&entity.name.as_str()) {
                owners.push(&entity.name);
            }
        }
    }
    for entity in graph.nodes() {
        let lower = entity.name.to_lowercase();
        if let Some(group) = by_lower.get(&lower) {
            if group.len() > 1 && group[0] == entity.name {
                report.duplicate_nodes.push(format!("case-insensitive name clash: {}", group.join(", ")));
            }
        }
        if let Some(owners) = alias_owners.get(&lower) {
            for owner in owners.iter().filter(|o| **o != entity.name) {
                report.duplicate_nodes.push(format!("'{}' is an alias of '{}'", entity.name, owner));
            }
        }
    }
    for (alias, owners) in &alias_owners {
        if owners.len() > 1 {
            report.duplicate_nodes.push(format!("alias '{}' shared by {}", alias, owners.join(", ")));
        }
    }

    for entity in graph.nodes() {
        if !graph.edges().iter().any(|e| e.touches(&entity.name)) {
            report.orphaned_nodes.push(entity.name.clone());
        }
    }

    for edge in graph.edges() {
        for endpoint in [&edge.start, &edge.end] {
            if !graph.contains(endpoint) {
                report.invalid_edges.push(format!("{} -> {}: unknown endpoint '{}'", edge.start, edge.end, endpoint));
            }
        }
        if !edge.weight.is_finite() || edge.weight < 0.0 {
            report.invalid_edges.push(format!("{} -> {}: invalid weight {}", edge.start, edge.end, edge.weight));
        }
        if graph.is_bidirectional()
            && edge.start != edge.end
            && !graph.edges_between(&edge.end, &edge.start).any(|m| m.weight == edge.weight)
        {
            report.invalid_edges.push(format!("{} -> {}: missing mirror edge", edge.start, edge.end));
        }
    }

    report
}

// ============================================================================
// Tests
// ============================================================================
