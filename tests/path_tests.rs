
use graph_common::{create_node, ids, memory_graph, path_graph};
use kvgraph::{Node, SearchAlgorithm};

fn assert_walkable(graph: &kvgraph::Graph<kvgraph::MemoryStore>, path: &[String]) {
    for hop in path.windows(2) {
        let from = Node::with_id(hop[0].clone(), Default::default());
        assert!(
            from.outgoing(graph, "friends").contains(&hop[1]).expect("edge"),
            "{} -> {} is not an edge",
            hop[0],
            hop[1]
        );
    }
}

#[test]
fn test_shortest_path_skips_the_start_node() {
    let graph = memory_graph();
    let nodes = path_graph(&graph);
    let path = nodes[0]
        .shortest_path_to(&graph, &nodes[7])
        .outgoing("friends")
        .depth(5)
        .ids()
        .expect("path");
    assert_eq!(path, ids(&[nodes[1].clone(), nodes[4].clone(), nodes[7].clone()]));

    let found: Vec<Node> = nodes[0]
        .shortest_path_to(&graph, &nodes[7])
        .outgoing("friends")
        .to_vec()
        .expect("nodes");
    assert_eq!(found, vec![nodes[1].clone(), nodes[4].clone(), nodes[7].clone()]);
}

#[test]
fn test_include_start_node_keeps_the_source() {
    let graph = memory_graph();
    let nodes = path_graph(&graph);
    let path = nodes[1]
        .shortest_path_to(&graph, &nodes[7])
        .outgoing("friends")
        .include_start_node()
        .ids()
        .expect("path");
    assert_eq!(path, ids(&[nodes[1].clone(), nodes[4].clone(), nodes[7].clone()]));

    let path = nodes[0]
        .shortest_path_to(&graph, &nodes[7])
        .outgoing("friends")
        .include_start_node()
        .ids()
        .expect("path");
    assert_eq!(
        path,
        ids(&[nodes[0].clone(), nodes[1].clone(), nodes[4].clone(), nodes[7].clone()])
    );
}

#[test]
fn test_shortest_path_follows_incoming_edges() {
    let graph = memory_graph();
    let nodes = path_graph(&graph);
    let path = nodes[7]
        .shortest_path_to(&graph, &nodes[0])
        .incoming("friends")
        .include_start_node()
        .ids()
        .expect("path");
    assert_eq!(
        path,
        ids(&[nodes[7].clone(), nodes[4].clone(), nodes[1].clone(), nodes[0].clone()])
    );
}

#[test]
fn test_depth_first_path_is_a_valid_walk() {
    let graph = memory_graph();
    let nodes = path_graph(&graph);
    let path = nodes[0]
        .path_to(&graph, &nodes[7])
        .outgoing("friends")
        .depth(5)
        .include_start_node()
        .ids()
        .expect("path");
    assert_eq!(path.first().map(String::as_str), nodes[0].id());
    assert_eq!(path.last().map(String::as_str), nodes[7].id());
    assert!(path.len() <= 7, "{path:?}");
    assert_walkable(&graph, &path);
}

#[test]
fn test_depth_bound_limits_the_search() {
    let graph = memory_graph();
    let nodes = path_graph(&graph);
    let search = |algorithm: SearchAlgorithm, depth: usize| {
        nodes[0]
            .path_to(&graph, &nodes[7])
            .algorithm(algorithm)
            .outgoing("friends")
            .depth(depth)
            .ids()
            .expect("path")
    };
    for algorithm in [SearchAlgorithm::DepthFirst, SearchAlgorithm::Dijkstra] {
        assert!(search(algorithm, 1).is_empty(), "{algorithm:?}");
        assert_eq!(
            search(algorithm, 2),
            ids(&[nodes[1].clone(), nodes[4].clone(), nodes[7].clone()]),
            "{algorithm:?}"
        );
    }
}

#[test]
fn test_unreachable_destination_yields_empty_path() {
    let graph = memory_graph();
    let nodes = path_graph(&graph);
    let loner = create_node(&graph);

    let backwards = nodes[7]
        .shortest_path_to(&graph, &nodes[0])
        .outgoing("friends")
        .ids()
        .expect("path");
    assert!(backwards.is_empty());

    let query = nodes[0].path_to(&graph, &loner).outgoing("friends");
    assert!(query.ids().expect("path").is_empty());
    assert_eq!(query.count().expect("count"), 0);
    assert!(!query.contains(&nodes[0]).expect("contains"));
}

#[test]
fn test_path_queries_count_and_contain_their_hops() {
    let graph = memory_graph();
    let nodes = path_graph(&graph);
    let query = nodes[0]
        .shortest_path_to(&graph, &nodes[7])
        .outgoing("friends");
    assert_eq!(query.count().expect("count"), 3);
    assert!(query.contains(&nodes[4]).expect("contains"));
    assert!(!query.contains(&nodes[2]).expect("contains"));
    assert!(!query.contains(&nodes[0]).expect("source excluded"));
}

#[test]
fn test_configured_default_depth_bounds_searches() {
    let mut cfg = kvgraph::GraphConfig::memory();
    cfg.default_depth = 1;
    let graph = kvgraph::Graph::with_config(kvgraph::MemoryStore::new(), cfg);
    let nodes = path_graph(&graph);
    let cut = nodes[0]
        .shortest_path_to(&graph, &nodes[7])
        .outgoing("friends")
        .ids()
        .expect("path");
    assert!(cut.is_empty());
    assert_eq!(memory_graph().config().default_depth, 4);
}
