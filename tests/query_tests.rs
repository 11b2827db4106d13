
use graph_common::{attrs, create_node, create_nodes, ids, link, memory_graph};
use kvgraph::{
    Entity, KvGraphError, MemoryStore, Graph, Node, Page, Relationship, SearchAlgorithm,
};

fn fan_out(graph: &Graph<MemoryStore>, count: usize) -> (Node, Vec<Relationship>) {
    let source = create_node(graph);
    let targets = create_nodes(graph, count);
    let rels = targets
        .iter()
        .enumerate()
        .map(|(i, target)| {
            graph
                .create_relationship("friends", &source, target, attrs(&[("name", &format!("rel{}", i + 1))]))
                .expect("relate")
        })
        .collect();
    (source, rels)
}

fn listing(graph: &Graph<MemoryStore>, source: &Node, per_page: usize, page: impl Into<Page>) -> Vec<Relationship> {
    source
        .outgoing(graph, "friends")
        .relationships()
        .per_page(per_page)
        .page(page)
        .to_vec()
        .expect("listing")
}

#[test]
fn test_relationship_pages_are_reverse_chronological() {
    let graph = memory_graph();
    let (source, rels) = fan_out(&graph, 5);
    let [rel1, rel2, rel3, rel4, rel5] = <[Relationship; 5]>::try_from(rels).expect("five");

    assert_eq!(listing(&graph, &source, 3, 1usize), vec![rel5.clone(), rel4.clone(), rel3.clone()]);
    assert_eq!(listing(&graph, &source, 3, 2usize), vec![rel2.clone(), rel1.clone()]);
    assert_eq!(listing(&graph, &source, 3, 0usize), vec![rel5.clone(), rel4.clone(), rel3.clone()]);
    assert_eq!(listing(&graph, &source, 3, &rel5), vec![rel4.clone(), rel3.clone(), rel2.clone()]);
    assert_eq!(listing(&graph, &source, 3, &rel3), vec![rel2.clone(), rel1.clone()]);
    assert!(listing(&graph, &source, 3, &rel1).is_empty());
}

#[test]
fn test_cursor_pages_reconstruct_the_full_listing() {
    let graph = memory_graph();
    let (source, rels) = fan_out(&graph, 11);
    let mut expected = rels.clone();
    expected.reverse();

    let mut collected: Vec<Relationship> = Vec::new();
    let mut page = listing(&graph, &source, 4, 1usize);
    while let Some(last) = page.last().cloned() {
        collected.extend(page);
        page = listing(&graph, &source, 4, &last);
    }
    assert_eq!(collected, expected);
}

#[test]
fn test_limit_without_page_takes_the_top_entries() {
    let graph = memory_graph();
    let (source, rels) = fan_out(&graph, 4);
    let top: Vec<Relationship> = source
        .outgoing(&graph, "friends")
        .relationships()
        .limit(2)
        .to_vec()
        .expect("top");
    assert_eq!(top, vec![rels[3].clone(), rels[2].clone()]);

    let all: Vec<Relationship> = source
        .outgoing(&graph, "friends")
        .relationships()
        .to_vec()
        .expect("all");
    assert_eq!(all.len(), 4);
    assert_eq!(all.first(), rels.last());
}

#[test]
fn test_unknown_cursor_yields_empty_page() {
    let graph = memory_graph();
    let (source, _) = fan_out(&graph, 3);
    let page = source
        .outgoing(&graph, "friends")
        .relationships()
        .per_page(2)
        .page("not-a-relationship")
        .ids()
        .expect("page");
    assert!(page.is_empty());
}

#[test]
fn test_oversized_limits_and_pages_stay_in_range() {
    let graph = memory_graph();
    let (source, rels) = fan_out(&graph, 3);
    let all = source
        .outgoing(&graph, "friends")
        .relationships()
        .limit(usize::MAX)
        .ids()
        .expect("unbounded limit");
    assert_eq!(all.len(), rels.len());

    assert!(listing(&graph, &source, 1 << 40, 1usize << 40).is_empty());
    assert!(listing(&graph, &source, usize::MAX, usize::MAX).is_empty());
    assert_eq!(listing(&graph, &source, usize::MAX, 1usize).len(), 3);
    assert_eq!(listing(&graph, &source, usize::MAX, &rels[2]).len(), 2);
}

#[test]
fn test_unsaved_relationship_cursor_is_invalid() {
    let graph = memory_graph();
    let (source, _) = fan_out(&graph, 3);
    let unsaved = Relationship::new("friends", "a", "b", attrs(&[]));
    let err = source
        .outgoing(&graph, "friends")
        .relationships()
        .per_page(2)
        .page(&unsaved)
        .ids()
        .expect_err("unsaved cursor");
    assert!(matches!(err, KvGraphError::InvalidQuery(_)));
}

#[test]
fn test_node_limit_samples_from_the_adjacency_set() {
    let graph = memory_graph();
    let (source, _) = fan_out(&graph, 5);
    let members = source.outgoing(&graph, "friends").ids().expect("members");
    assert_eq!(members.len(), 5);

    let sample = source.outgoing(&graph, "friends").limit(3).ids().expect("sample");
    assert_eq!(sample.len(), 3);
    assert!(sample.iter().all(|id| members.contains(id)));

    let nodes: Vec<Node> = source
        .outgoing(&graph, "friends")
        .nodes()
        .limit(3)
        .to_vec()
        .expect("nodes");
    assert_eq!(nodes.len(), 3);
}

#[test]
fn test_count_and_size_clamp_to_limit() {
    let graph = memory_graph();
    let (source, _) = fan_out(&graph, 4);
    let query = || source.outgoing(&graph, "friends");

    assert_eq!(query().nodes().count().expect("count"), 4);
    assert_eq!(query().nodes().size().expect("size"), 4);
    assert_eq!(query().nodes().limit(3).count().expect("count"), 3);
    assert_eq!(query().nodes().limit(5).count().expect("count"), 4);
    assert_eq!(query().relationships().count().expect("count"), 4);
    assert_eq!(query().relationships().size().expect("size"), 4);
    assert_eq!(query().relationships().limit(3).count().expect("count"), 3);
    assert_eq!(query().relationships().limit(5).count().expect("count"), 4);
}

#[test]
fn test_size_is_cached_after_first_count() {
    let graph = memory_graph();
    let (source, _) = fan_out(&graph, 2);
    let query = source.outgoing(&graph, "friends");
    assert_eq!(query.size().expect("size"), 2);

    let extra = create_node(&graph);
    link(&graph, "friends", &source, &extra);
    assert_eq!(query.size().expect("cached"), 2);
    assert_eq!(query.count().expect("fresh"), 3);
    assert_eq!(query.size().expect("refreshed"), 3);
}

#[test]
fn test_find_resolves_neighbour_or_relationship() {
    let graph = memory_graph();
    let (a, b) = (create_node(&graph), create_node(&graph));
    let rel = link(&graph, "friend", &a, &b);

    let found: Option<Node> = a.outgoing(&graph, "friend").find(&b).expect("find");
    assert_eq!(found, Some(b.clone()));
    let found: Option<Node> = b.incoming(&graph, "friend").find(&a).expect("find");
    assert_eq!(found, Some(a.clone()));
    let missing: Option<Node> = a.outgoing(&graph, "friend").find(&a).expect("find");
    assert_eq!(missing, None);
    let missing: Option<Node> = b.incoming(&graph, "friend").find(&b).expect("find");
    assert_eq!(missing, None);

    let found: Option<Relationship> = a
        .outgoing(&graph, "friend")
        .relationships()
        .find(&b)
        .expect("find");
    assert_eq!(found, Some(rel.clone()));
    let found: Option<Relationship> = b
        .incoming(&graph, "friend")
        .relationships()
        .find(&a)
        .expect("find");
    assert_eq!(found, Some(rel));
    let missing: Option<Relationship> = a
        .outgoing(&graph, "friend")
        .relationships()
        .find(&a)
        .expect("find");
    assert_eq!(missing, None);
}

#[test]
fn test_contains_checks_membership_per_result_type() {
    let graph = memory_graph();
    let (a, b, c) = (create_node(&graph), create_node(&graph), create_node(&graph));
    let rel = link(&graph, "friend", &a, &b);

    assert!(a.outgoing(&graph, "friend").contains(&b).expect("contains"));
    assert!(!a.outgoing(&graph, "friend").contains(&c).expect("contains"));
    assert!(
        a.outgoing(&graph, "friend")
            .relationships()
            .contains(rel.id().expect("id"))
            .expect("contains")
    );
    let unsaved: Option<Node> = None;
    assert!(!a.outgoing(&graph, "friend").contains(&unsaved).expect("contains"));
}

#[test]
fn test_include_start_node_prepends_source() {
    let graph = memory_graph();
    let (a, b) = (create_node(&graph), create_node(&graph));
    link(&graph, "friend", &a, &b);
    let with_source: Vec<Node> = a
        .outgoing(&graph, "friend")
        .include_start_node()
        .to_vec()
        .expect("nodes");
    assert_eq!(ids(&with_source), ids(&[a, b]));
}

#[test]
fn test_factory_and_fields_shape_results() {
    let graph = memory_graph();
    let source = create_node(&graph);
    let target = graph
        .create(Node::new(attrs(&[("name", "target"), ("city", "Oslo")])))
        .expect("create");
    link(&graph, "friend", &source, &target);

    let names = source
        .outgoing(&graph, "friend")
        .to_vec_with(|entity: Entity| entity.get("name").unwrap_or_default().to_string())
        .expect("names");
    assert_eq!(names, vec!["target".to_string()]);

    let partial: Vec<Node> = source
        .outgoing(&graph, "friend")
        .fields(["city"])
        .to_vec()
        .expect("fields");
    assert_eq!(partial[0].get("city"), Some("Oslo"));
    assert_eq!(partial[0].get("name"), None);
}

#[test]
fn test_query_without_label_is_invalid() {
    let graph = memory_graph();
    let node = create_node(&graph);
    let err = graph.query(&node).ids().expect_err("no label");
    assert!(matches!(err, KvGraphError::InvalidQuery(_)));
    let err = graph
        .query(&node)
        .outgoing("bad:label")
        .count()
        .expect_err("separator");
    assert!(matches!(err, KvGraphError::InvalidQuery(_)));
}

#[test]
fn test_search_without_destination_is_invalid() {
    let graph = memory_graph();
    let node = create_node(&graph);
    let err = node
        .outgoing(&graph, "friend")
        .algorithm(SearchAlgorithm::Dijkstra)
        .ids()
        .expect_err("no destination");
    assert!(matches!(err, KvGraphError::InvalidQuery(_)));

    let unsaved: Option<Node> = None;
    let err = node
        .path_to(&graph, &unsaved)
        .outgoing("friend")
        .ids()
        .expect_err("unsaved destination");
    assert!(matches!(err, KvGraphError::InvalidQuery(_)));
}

#[test]
fn test_query_from_unsaved_source_is_invalid() {
    let graph = memory_graph();
    let err = Node::new(attrs(&[]))
        .outgoing(&graph, "friend")
        .ids()
        .expect_err("unsaved source");
    assert!(matches!(err, KvGraphError::InvalidQuery(_)));
}
