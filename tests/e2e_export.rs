//! Export round-trip: graph -> snapshot / JSON document -> graph, and
//! rendering of ranked paths as readable text.

use kgraph::{
    export_json, format_paths, from_snapshot, Entity, GraphConfig, GraphSnapshot, KnowledgeGraph,
    Relationship,
};
use pretty_assertions::assert_eq;

fn seed_graph(config: GraphConfig) -> KnowledgeGraph {
    let mut graph = KnowledgeGraph::new(config);
    graph.insert_node(
        Entity::new("Microsoft Corporation", "Company")
            .with_description("Software")
            .with_aliases(["Microsoft", "MSFT"]),
    );
    graph.insert_node(Entity::new("OpenAI", "Company").with_description("AI lab"));
    graph.insert_node(Entity::new("Sam Altman", "Person").with_description("CEO of OpenAI"));
    graph
        .insert_edge(
            Relationship::new("Microsoft Corporation", "OpenAI", 0.8)
                .with_title("investor")
                .with_description("invests in"),
        )
        .unwrap();
    graph
        .insert_edge(Relationship::new("Sam Altman", "OpenAI", 0.95).with_title("leads"))
        .unwrap();
    graph
}

#[test]
fn test_snapshot_matches_visualizer_shape() {
    let graph = seed_graph(GraphConfig::default());
    let json = serde_json::to_value(graph.to_snapshot()).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "nodes": [
                {"id": 0, "name": "Microsoft Corporation", "type": "Company", "description": "Software", "aliases": ["MSFT", "Microsoft"]},
                {"id": 1, "name": "OpenAI", "type": "Company", "description": "AI lab", "aliases": []},
                {"id": 2, "name": "Sam Altman", "type": "Person", "description": "CEO of OpenAI", "aliases": []}
            ],
            "edges": [
                {"source": 0, "target": 1, "title": "investor", "description": "invests in", "weight": 0.8},
                {"source": 2, "target": 1, "title": "leads", "description": "", "weight": 0.95}
            ]
        })
    );
}

#[test]
fn test_json_export_round_trips_through_snapshot() {
    let graph = seed_graph(GraphConfig::bidirectional());
    let mut buf = Vec::new();
    export_json(&graph, &mut buf).unwrap();

    // The export document is a snapshot with an extra metadata block.
    let document: serde_json::Value = serde_json::from_slice(&buf).unwrap();
    let stats = &document["metadata"]["statistics"];
    assert_eq!(stats["total_nodes"], 3);
    assert_eq!(stats["total_edges"], 4);
    assert_eq!(stats["node_types"]["Company"], 2);
    assert_eq!(stats["avg_weight"], 0.875);

    let snapshot: GraphSnapshot = serde_json::from_value(document).unwrap();
    let restored = from_snapshot(&snapshot, GraphConfig::bidirectional()).unwrap();
    assert_eq!(restored.edge_count(), 4);
    assert_eq!(restored.to_snapshot(), graph.to_snapshot());
    assert_eq!(restored.find_paths("Microsoft Corporation", "Sam Altman", 3), graph.find_paths("Microsoft Corporation", "Sam Altman", 3));
}

#[test]
fn test_ranked_paths_render_as_text() {
    let graph = seed_graph(GraphConfig::default());
    let mut paths = graph.find_paths("Microsoft Corporation", "OpenAI", 2);
    paths.push(vec!["Sam Altman".into(), "OpenAI".into(), "Microsoft Corporation".into()]);

    assert_eq!(format_paths(&graph, &paths), vec![
        "Microsoft Corporation: Software - (invests in) -> OpenAI: AI lab".to_string(),
        "Sam Altman: CEO of OpenAI - (leads) -> OpenAI: AI lab <- (invests in) - Microsoft Corporation: Software".to_string(),
    ]);
}
