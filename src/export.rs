//! Snapshot export/import and path rendering.
//!
//! The snapshot is the interchange shape consumed by graph visualizers:
//!
//! ```text
//! { "nodes": [{ "id", "name", "type", "description", "aliases" }],
//!   "edges": [{ "source", "target", "title", "description", "weight" }] }
//! ```
//!
//! Node ids are positions in the graph's insertion order, so exporting
//! the same graph twice yields identical ids. Edges reference those ids.
//! Similarity-index ids are not exported.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::config::GraphConfig;
use crate::graph::KnowledgeGraph;
use crate::model::{Entity, Relationship};
use crate::{Error, Result};

// ============================================================================
// Snapshot shape
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub id: usize,
    pub name: String,
    #[serde(rename = "type", default)]
    pub entity_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEdge {
    pub source: usize,
    pub target: usize,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<SnapshotNode>,
    pub edges: Vec<SnapshotEdge>,
}

/// Summary figures written into the export metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    /// entity type → count
    pub node_types: BTreeMap<String, usize>,
    /// Mean edge weight rounded to 3 decimals; 0 for an edgeless graph.
    pub avg_weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ExportMetadata {
    generated_by: String,
    generated_at: String,
    statistics: GraphStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ExportDocument {
    metadata: ExportMetadata,
    #[serde(flatten)]
    snapshot: GraphSnapshot,
}

// ============================================================================
// Export
// ============================================================================

impl KnowledgeGraph {
    /// Visualizer snapshot of the current graph.
    pub fn to_snapshot(&self) -> GraphSnapshot {
        let nodes = self
            .nodes()
            .enumerate()
            .map(|(id, e)| SnapshotNode {
                id,
                name: e.name.clone(),
                entity_type: e.entity_type.clone(),
                description: e.description.clone(),
                aliases: e.aliases.iter().cloned().collect(),
            })
            .collect();

        // Endpoints of stored edges are always present.
        let edges = self
            .edges()
            .iter()
            .filter_map(|rel| {
                Some(SnapshotEdge {
                    source: self.node_position(&rel.start)?,
                    target: self.node_position(&rel.end)?,
                    title: rel.title.clone(),
                    description: rel.description.clone(),
                    weight: rel.weight,
                })
            })
            .collect();

        GraphSnapshot { nodes, edges }
    }

    pub fn stats(&self) -> GraphStats {
        let mut node_types = BTreeMap::new();
        for entity in self.nodes() {
            *node_types.entry(entity.entity_type.clone()).or_insert(0) += 1;
        }
        let avg_weight = if self.edge_count() == 0 {
            0.0
        } else {
            let mean = self.edges().iter().map(|e| e.weight).sum::<f64>() / self.edge_count() as f64;
            (mean * 1000.0).round() / 1000.0
        };
        GraphStats {
            total_nodes: self.node_count(),
            total_edges: self.edge_count(),
            node_types,
            avg_weight,
        }
    }
}

/// Rebuild a graph from a snapshot. Node ids and names must be unique and
/// every edge id must name a node. A snapshot of a bidirectional graph
/// already holds both directions; restoring a directed snapshot into a
/// bidirectional config adds the missing mirrors.
pub fn from_snapshot(snapshot: &GraphSnapshot, config: GraphConfig) -> Result<KnowledgeGraph> {
    let mut names: HashMap<usize, &str> = HashMap::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut nodes = Vec::with_capacity(snapshot.nodes.len());
    for node in &snapshot.nodes {
        if !seen.insert(&node.name) {
            return Err(Error::DuplicateName(node.name.clone()));
        }
        if names.insert(node.id, &node.name).is_some() {
            return Err(Error::DuplicateNodeId(node.id));
        }
        nodes.push(
            Entity::new(node.name.clone(), node.entity_type.clone())
                .with_description(node.description.clone())
                .with_aliases(node.aliases.iter().cloned()),
        );
    }

    let name_of = |id: usize| -> Result<String> {
        names
            .get(&id)
            .map(|n| n.to_string())
            .ok_or_else(|| Error::UnknownEndpoint { name: format!("#{id}") })
    };
    let edges = snapshot
        .edges
        .iter()
        .map(|e| {
            Ok(Relationship::new(name_of(e.source)?, name_of(e.target)?, e.weight)
                .with_title(e.title.clone())
                .with_description(e.description.clone()))
        })
        .collect::<Result<Vec<_>>>()?;

    KnowledgeGraph::restore(config, nodes, edges)
}

/// Write the snapshot plus a metadata block as pretty JSON.
pub fn export_json(graph: &KnowledgeGraph, writer: &mut dyn Write) -> Result<()> {
    let document = ExportDocument {
        metadata: ExportMetadata {
            generated_by: concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION")).to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            statistics: graph.stats(),
        },
        snapshot: graph.to_snapshot(),
    };
    serde_json::to_writer_pretty(&mut *writer, &document)?;
    writeln!(writer)?;
    Ok(())
}

// ============================================================================
// Path rendering
// ============================================================================

/// Render a node path as readable text, one `Name: description` per node
/// joined by relation arrows:
///
/// - `- (rel) ->` when only the forward edge exists
/// - `<- (rel) ->` when both directions exist
/// - `<- (rel) -` when only the reverse edge exists
/// - `- (unknown relation) ->` when no edge links the pair
///
/// The relation text is the edge description, falling back to its title.
pub fn format_path(graph: &KnowledgeGraph, path: &[String]) -> String {
    let Some(first) = path.first() else {
        return String::new();
    };
    let mut out = describe(graph, first);
    for pair in path.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let forward = graph.edges_between(a, b).next();
        let backward = graph.edges_between(b, a).next();
        let connector = match (forward, backward) {
            (Some(f), Some(_)) => format!(" <- ({}) -> ", relation_text(f)),
            (Some(f), None) => format!(" - ({}) -> ", relation_text(f)),
            (None, Some(r)) => format!(" <- ({}) - ", relation_text(r)),
            (None, None) => " - (unknown relation) -> ".to_string(),
        };
        out.push_str(&connector);
        out.push_str(&describe(graph, b));
    }
    out
}

pub fn format_paths(graph: &KnowledgeGraph, paths: &[Vec<String>]) -> Vec<String> {
    paths.iter().map(|p| format_path(graph, p)).collect()
}

fn describe(graph: &KnowledgeGraph, name: &str) -> String {
    match graph.node(name) {
        Some(e) => format!("{}: {}", e.name, e.description),
        None => name.to_string(),
    }
}

fn relation_text(rel: &Relationship) -> &str {
    if rel.description.is_empty() {
        &rel.title
    } else {
        &rel.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supply_chain(config: GraphConfig) -> KnowledgeGraph {
        let mut g = KnowledgeGraph::new(config);
        g.insert_node(Entity::new("Apple", "Company").with_description("Consumer electronics").with_alias("AAPL"));
        g.insert_node(Entity::new("Foxconn", "Company").with_description("Contract manufacturer"));
        g.insert_node(Entity::new("Tim Cook", "Person").with_description("CEO of Apple"));
        g.insert_edge(Relationship::new("Apple", "Foxconn", 0.9).with_title("supplier").with_description("assembles iPhones for"))
            .unwrap();
        g.insert_edge(Relationship::new("Tim Cook", "Apple", 0.6).with_title("leads")).unwrap();
        g
    }

    #[test]
    fn test_snapshot_ids_follow_insertion_order() {
        let snap = supply_chain(GraphConfig::default()).to_snapshot();
        let names: Vec<(usize, &str)> = snap.nodes.iter().map(|n| (n.id, n.name.as_str())).collect();
        assert_eq!(names, vec![(0, "Apple"), (1, "Foxconn"), (2, "Tim Cook")]);
        assert_eq!(snap.edges[0].source, 0);
        assert_eq!(snap.edges[0].target, 1);
        assert_eq!(snap.edges[1].source, 2);
        assert_eq!(snap.nodes[0].aliases, vec!["AAPL".to_string()]);
    }

    #[test]
    fn test_snapshot_json_keys() {
        let snap = supply_chain(GraphConfig::default()).to_snapshot();
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["nodes"][2]["type"], "Person");
        assert_eq!(json["edges"][0]["title"], "supplier");
        assert_eq!(json["edges"][0]["weight"], 0.9);
    }

    #[test]
    fn test_from_snapshot_restores_without_remirroring() {
        let original = supply_chain(GraphConfig::bidirectional());
        assert_eq!(original.edge_count(), 4);

        let restored = from_snapshot(&original.to_snapshot(), GraphConfig::bidirectional()).unwrap();
        assert_eq!(restored.edge_count(), 4);
        assert_eq!(restored.to_snapshot(), original.to_snapshot());
    }

    #[test]
    fn test_from_snapshot_mirrors_directed_edges_when_bidirectional() {
        let mut g = KnowledgeGraph::default();
        g.insert_node(Entity::new("A", "Company"));
        g.insert_node(Entity::new("B", "Company"));
        g.insert_edge(Relationship::new("A", "B", 0.5).with_title("supplier")).unwrap();

        let restored = from_snapshot(&g.to_snapshot(), GraphConfig::bidirectional()).unwrap();
        assert_eq!(restored.edge_count(), 2);
        assert_eq!(restored.find_paths("B", "A", 1), vec![vec!["B".to_string(), "A".into()]]);
        let mirror = restored.edges_between("B", "A").next().unwrap();
        assert_eq!(mirror.title, "supplier");
        assert!(crate::check_graph_integrity(&restored).invalid_edges.is_empty());
    }

    #[test]
    fn test_from_snapshot_rejects_dangling_edge() {
        let mut snap = supply_chain(GraphConfig::default()).to_snapshot();
        snap.edges[0].target = 42;
        assert!(matches!(
            from_snapshot(&snap, GraphConfig::default()),
            Err(Error::UnknownEndpoint { .. })
        ));
    }

    #[test]
    fn test_from_snapshot_rejects_duplicate_names() {
        let mut snap = supply_chain(GraphConfig::default()).to_snapshot();
        snap.nodes[1].name = "Apple".into();
        assert!(matches!(from_snapshot(&snap, GraphConfig::default()), Err(Error::DuplicateName(_))));
    }

    #[test]
    fn test_from_snapshot_rejects_duplicate_ids() {
        let mut snap = supply_chain(GraphConfig::default()).to_snapshot();
        snap.nodes[2].id = 1;
        let err = from_snapshot(&snap, GraphConfig::default()).unwrap_err();
        assert!(matches!(err, Error::DuplicateNodeId(1)));
        assert_eq!(err.to_string(), "Duplicate node id: snapshot id 1 is used by more than one node");
    }

    #[test]
    fn test_stats() {
        let stats = supply_chain(GraphConfig::default()).stats();
        assert_eq!(stats.total_nodes, 3);
        assert_eq!(stats.total_edges, 2);
        assert_eq!(stats.node_types.get("Company"), Some(&2));
        assert_eq!(stats.node_types.get("Person"), Some(&1));
        assert_eq!(stats.avg_weight, 0.75);
        assert_eq!(KnowledgeGraph::default().stats().avg_weight, 0.0);
    }

    #[test]
    fn test_export_json_document() {
        let g = supply_chain(GraphConfig::default());
        let mut buf = Vec::new();
        export_json(&g, &mut buf).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(json["metadata"]["statistics"]["total_nodes"], 3);
        assert!(json["metadata"]["generated_by"].as_str().unwrap().starts_with("kgraph-rs"));
        assert!(chrono::DateTime::parse_from_rfc3339(json["metadata"]["generated_at"].as_str().unwrap()).is_ok());
        assert_eq!(json["nodes"].as_array().unwrap().len(), 3);
        assert_eq!(json["edges"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_format_path_directions() {
        let g = supply_chain(GraphConfig::default());
        let path = vec!["Tim Cook".to_string(), "Apple".into(), "Foxconn".into()];
        assert_eq!(
            format_path(&g, &path),
            "Tim Cook: CEO of Apple - (leads) -> Apple: Consumer electronics \
             - (assembles iPhones for) -> Foxconn: Contract manufacturer"
        );

        let reverse = vec!["Foxconn".to_string(), "Apple".into()];
        assert_eq!(
            format_path(&g, &reverse),
            "Foxconn: Contract manufacturer <- (assembles iPhones for) - Apple: Consumer electronics"
        );

        let unrelated = vec!["Foxconn".to_string(), "Tim Cook".into()];
        assert_eq!(
            format_path(&g, &unrelated),
            "Foxconn: Contract manufacturer - (unknown relation) -> Tim Cook: CEO of Apple"
        );
    }

    #[test]
    fn test_format_path_bidirectional_and_edge_cases() {
        let g = supply_chain(GraphConfig::bidirectional());
        let path = vec!["Apple".to_string(), "Foxconn".into()];
        assert_eq!(
            format_path(&g, &path),
            "Apple: Consumer electronics <- (assembles iPhones for) -> Foxconn: Contract manufacturer"
        );
        assert_eq!(format_path(&g, &["Apple".to_string()]), "Apple: Consumer electronics");
        assert_eq!(format_path(&g, &[]), "");
        assert_eq!(format_paths(&g, &[path.clone(), vec![]]).len(), 2);
    }
}
