//! End-to-end tests for the graph store: node and edge mutation, cascading
//! deletes, renames and index synchronization, plus the whole-graph
//! integrity report.

use std::sync::Arc;

use kgraph::{
    check_graph_integrity, Config, Entity, Error, HashEmbedder, KnowledgeGraph, MemoryIndex,
    Relationship, SimilarityIndex,
};
use pretty_assertions::assert_eq;

// ============================================================================
// Helper: a small corporate graph, built from a JSON config.
// ============================================================================

fn setup(config_json: &str) -> (KnowledgeGraph, MemoryIndex) {
    let config = Config::from_json_str(config_json).unwrap();
    let backend = MemoryIndex::new();
    let index = SimilarityIndex::open(
        Arc::new(backend.clone()),
        Arc::new(HashEmbedder::with_dimension(32)),
        &config.index,
    )
    .unwrap();
    let mut graph = KnowledgeGraph::with_index(config.graph, index);

    graph.insert_node(Entity::new("Apple", "Company").with_description("Consumer electronics"));
    graph.insert_node(Entity::new("Tim Cook", "Person").with_description("CEO of Apple"));
    graph.insert_node(Entity::new("Foxconn", "Company").with_description("Contract manufacturer"));
    graph.insert_edge(Relationship::new("Tim Cook", "Apple", 0.9).with_title("leads")).unwrap();
    graph.insert_edge(Relationship::new("Apple", "Foxconn", 0.7).with_title("supplier")).unwrap();
    (graph, backend)
}

// ============================================================================
// 1. Directed vs bidirectional
// ============================================================================

#[test]
fn test_directed_graph() {
    let (graph, _) = setup("{}");
    assert_eq!(graph.to_string(), "Graph(nodes=3, edges=2)");
    assert_eq!(graph.outgoing("Apple").count(), 1);
    assert_eq!(graph.incoming("Apple").count(), 1);
}

#[test]
fn test_bidirectional_graph_mirrors_and_unmirrors() {
    let (mut graph, _) = setup(r#"{"graph": {"bidirectional": true}}"#);
    assert_eq!(graph.edge_count(), 4);
    let mirror = graph.edges_between("Apple", "Tim Cook").next().unwrap();
    assert_eq!(mirror.title, "leads");
    assert_eq!(mirror.weight, 0.9);

    assert!(graph.delete_edge("Apple", "Tim Cook"));
    assert_eq!(graph.edge_count(), 2);
    assert!(check_graph_integrity(&graph).invalid_edges.is_empty());
}

// ============================================================================
// 2. Error cases
// ============================================================================

#[test]
fn test_edge_to_missing_node_leaves_graph_untouched() {
    let (mut graph, _) = setup("{}");
    let err = graph.insert_edge(Relationship::new("Apple", "Samsung", 0.4)).unwrap_err();
    assert!(matches!(err, Error::UnknownEndpoint { ref name } if name == "Samsung"));
    assert_eq!(err.to_string(), "Unknown endpoint: no entity named 'Samsung'");
    assert_eq!(graph.edge_count(), 2);
}

#[test]
fn test_deletes_of_missing_things_return_false() {
    let (mut graph, _) = setup("{}");
    assert!(!graph.delete_node("Samsung"));
    assert!(!graph.delete_edge("Foxconn", "Apple"));
}

// ============================================================================
// 3. Cascades and index sync
// ============================================================================

#[test]
fn test_delete_node_cascades_and_unindexes() {
    let (mut graph, backend) = setup(r#"{"index": {"collection": "cascade"}}"#);
    let index = graph.similarity_index().unwrap().clone();
    assert_eq!(index.len().unwrap(), 3);

    assert!(graph.delete_node("Apple"));
    assert_eq!(graph.edge_count(), 0);
    assert_eq!(index.len().unwrap(), 2);
    assert_eq!(backend.collections(), vec!["cascade".to_string()]);

    let report = check_graph_integrity(&graph);
    assert_eq!(report.orphaned_nodes, vec!["Tim Cook".to_string(), "Foxconn".into()]);
}

#[test]
fn test_rename_keeps_edges_and_index_entry() {
    let (mut graph, _) = setup("{}");
    let id_before = graph.node("Apple").unwrap().similarity_index_id.clone();

    assert!(graph.rename_node("Apple", "Apple Inc.").unwrap());
    assert!(graph.node("Apple").is_none());
    assert_eq!(graph.node_position("Apple Inc."), Some(0));
    assert_eq!(graph.edges_between("Tim Cook", "Apple Inc.").count(), 1);

    let renamed = graph.node("Apple Inc.").unwrap();
    assert_eq!(renamed.similarity_index_id, id_before);
    let index = graph.similarity_index().unwrap();
    assert_eq!(index.len().unwrap(), 3);
    let hits = index.search_entity(renamed, 1).unwrap();
    assert_eq!(hits[0].metadata.name, "Apple Inc.");

    assert!(matches!(graph.rename_node("Tim Cook", "Foxconn"), Err(Error::DuplicateName(_))));
}

#[test]
fn test_reinsert_replaces_single_entry() {
    let (mut graph, _) = setup("{}");
    let previous = graph
        .insert_node(Entity::new("Apple", "Company").with_description("Maker of the iPhone"))
        .unwrap();
    assert_eq!(previous.description, "Consumer electronics");

    let index = graph.similarity_index().unwrap();
    assert_eq!(index.len().unwrap(), 3);
    let hits = index.search_by_text("Apple: Maker of the iPhone", 1).unwrap();
    assert_eq!(hits[0].metadata.name, "Apple");
    assert_eq!(hits[0].document, "Apple: Maker of the iPhone");
}

#[test]
fn test_integrity_report_flags_alias_collision() {
    let (mut graph, _) = setup("{}");
    graph.insert_node(Entity::new("Hon Hai", "Company").with_alias("foxconn"));
    let report = check_graph_integrity(&graph);
    assert_eq!(report.duplicate_nodes, vec!["'Foxconn' is an alias of 'Hon Hai'".to_string()]);
    assert_eq!(report.orphaned_nodes, vec!["Hon Hai".to_string()]);
}
