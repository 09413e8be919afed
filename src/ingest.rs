//! # Candidate Ingestion
//!
//! Feeds extracted candidates into a graph through the integrity checker.
//!
//! Each [`CandidateBatch`] is one entity plus the relationships extracted
//! with it. A candidate that duplicates an existing entity is either
//! skipped or folded into it as aliases, per [`MergePolicy`]; either way
//! its name is remembered so later relationships naming it land on the
//! canonical entity.
//!
//! Relationships whose endpoints are not yet known are held back and
//! retried once the source is exhausted, so a batch may reference an
//! entity that arrives later. Whatever still cannot be placed is listed
//! in the [`IngestReport`]; ingestion never fails on bad source data.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::graph::KnowledgeGraph;
use crate::integrity::{DuplicateMatch, IntegrityChecker, MatchReason};
use crate::model::{Entity, Relationship};

// ============================================================================
// Input
// ============================================================================

/// One extracted entity and the relationships found alongside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateBatch {
    pub entity: Entity,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl CandidateBatch {
    pub fn new(entity: Entity) -> Self {
        Self { entity, relationships: Vec::new() }
    }

    pub fn with_relationship(mut self, rel: Relationship) -> Self {
        self.relationships.push(rel);
        self
    }
}

/// Where candidate batches come from.
///
/// Implemented for any `FnMut() -> Option<CandidateBatch>`; wrap an
/// iterator with [`from_iter`].
pub trait CandidateSource {
    /// The next batch, or `None` when the source is exhausted.
    fn next_batch(&mut self) -> Option<CandidateBatch>;
}

impl<F> CandidateSource for F
where
    F: FnMut() -> Option<CandidateBatch>,
{
    fn next_batch(&mut self) -> Option<CandidateBatch> {
        self()
    }
}

/// A [`CandidateSource`] draining an iterator.
pub struct IterSource<I>(I);

impl<I: Iterator<Item = CandidateBatch>> CandidateSource for IterSource<I> {
    fn next_batch(&mut self) -> Option<CandidateBatch> {
        self.0.next()
    }
}

pub fn from_iter<I>(batches: I) -> IterSource<I::IntoIter>
where
    I: IntoIterator<Item = CandidateBatch>,
{
    IterSource(batches.into_iter())
}

// ============================================================================
// Policy and report
// ============================================================================

/// What to do with a candidate that duplicates an existing entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Drop the candidate.
    Skip,
    /// Union the candidate's name and aliases into the existing entity.
    #[default]
    MergeAliases,
}

/// A candidate that resolved to an existing entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateRecord {
    pub candidate: String,
    pub canonical: String,
    pub reason: MatchReason,
    pub similarity: f64,
    /// Whether the candidate's names were merged into `canonical`.
    pub merged: bool,
}

/// A relationship that could not be added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedEdge {
    pub relationship: Relationship,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub batches: usize,
    /// Names of newly inserted entities, in arrival order.
    pub inserted: Vec<String>,
    pub duplicates: Vec<DuplicateRecord>,
    /// Relationships added (mirrors not counted).
    pub edges_added: usize,
    pub rejected_edges: Vec<RejectedEdge>,
}

impl IngestReport {
    pub fn merged(&self) -> impl Iterator<Item = &DuplicateRecord> {
        self.duplicates.iter().filter(|d| d.merged)
    }

    pub fn skipped(&self) -> impl Iterator<Item = &DuplicateRecord> {
        self.duplicates.iter().filter(|d| !d.merged)
    }
}

// ============================================================================
// Ingestor
// ============================================================================

/// Runs candidates through duplicate detection and into a graph.
pub struct Ingestor {
    checker: IntegrityChecker,
    policy: MergePolicy,
    /// candidate name → canonical name, for every duplicate seen so far
    redirects: HashMap<String, String>,
    pending: Vec<Relationship>,
    report: IngestReport,
}

impl Ingestor {
    pub fn new(checker: IntegrityChecker, policy: MergePolicy) -> Self {
        Self {
            checker,
            policy,
            redirects: HashMap::new(),
            pending: Vec::new(),
            report: IngestReport::default(),
        }
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    /// Drain `source` into `graph` and return the report.
    pub fn run(mut self, graph: &mut KnowledgeGraph, mut source: impl CandidateSource) -> IngestReport {
        while let Some(batch) = source.next_batch() {
            self.ingest_batch(graph, batch);
        }
        self.finish(graph)
    }

    /// Place one batch. Relationships with unknown endpoints are held
    /// until [`finish`](Self::finish).
    pub fn ingest_batch(&mut self, graph: &mut KnowledgeGraph, batch: CandidateBatch) {
        self.report.batches += 1;
        let CandidateBatch { entity, relationships } = batch;

        let check = self.checker.check_duplicates(&entity, graph);
        match check.matched {
            Some(found) => self.resolve_duplicate(graph, entity, found),
            None => {
                debug!(entity = %entity.name, "inserting new entity");
                self.report.inserted.push(entity.name.clone());
                graph.insert_node(entity);
            }
        }

        for rel in relationships {
            if let Some(rel) = self.try_add_edge(graph, rel) {
                self.pending.push(rel);
            }
        }
    }

    /// Retry held relationships and close the report.
    pub fn finish(mut self, graph: &mut KnowledgeGraph) -> IngestReport {
        for rel in std::mem::take(&mut self.pending) {
            if let Some(rel) = self.try_add_edge(graph, rel) {
                let missing = [&rel.start, &rel.end]
                    .into_iter()
                    .find(|name| self.resolve(graph, name).is_none())
                    .cloned()
                    .unwrap_or_default();
                warn!(start = %rel.start, end = %rel.end, missing = %missing, "dropping relationship with unknown endpoint");
                self.report.rejected_edges.push(RejectedEdge {
                    reason: format!("unknown endpoint: {missing}"),
                    relationship: rel,
                });
            }
        }
        info!(
            batches = self.report.batches,
            inserted = self.report.inserted.len(),
            duplicates = self.report.duplicates.len(),
            edges_added = self.report.edges_added,
            rejected = self.report.rejected_edges.len(),
            "ingestion finished"
        );
        self.report
    }

    fn resolve_duplicate(&mut self, graph: &mut KnowledgeGraph, candidate: Entity, found: DuplicateMatch) {
        let canonical = found.entity.name;
        let merged = match self.policy {
            MergePolicy::MergeAliases => graph.merge_aliases(&canonical, &candidate),
            MergePolicy::Skip => false,
        };
        debug!(
            candidate = %candidate.name,
            canonical = %canonical,
            reason = %found.reason,
            similarity = found.similarity,
            merged,
            "candidate resolved to existing entity"
        );
        if candidate.name != canonical {
            self.redirects.insert(candidate.name.clone(), canonical.clone());
        }
        self.report.duplicates.push(DuplicateRecord {
            candidate: candidate.name,
            canonical,
            reason: found.reason,
            similarity: found.similarity,
            merged,
        });
    }

    /// Canonical name for `name`, if it is a node or a redirected duplicate.
    fn resolve(&self, graph: &KnowledgeGraph, name: &str) -> Option<String> {
        if graph.contains(name) {
            return Some(name.to_string());
        }
        self.redirects.get(name).filter(|c| graph.contains(c)).cloned()
    }

    /// Add `rel` with endpoints rewritten to canonical names. Hands the
    /// relationship back when an endpoint is still unknown.
    fn try_add_edge(&mut self, graph: &mut KnowledgeGraph, mut rel: Relationship) -> Option<Relationship> {
        let (Some(start), Some(end)) = (self.resolve(graph, &rel.start), self.resolve(graph, &rel.end)) else {
            return Some(rel);
        };
        rel.start = start;
        rel.end = end;
        match graph.insert_edge(rel.clone()) {
            Ok(()) => self.report.edges_added += 1,
            Err(e) => {
                warn!(start = %rel.start, end = %rel.end, error = %e, "rejecting relationship");
                self.report.rejected_edges.push(RejectedEdge { relationship: rel, reason: e.to_string() });
            }
        }
        None
    }
}
