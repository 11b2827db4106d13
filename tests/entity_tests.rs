
use std::sync::Arc;

use graph_common::{attrs, create_node, memory_graph, sharded_graph};
use kvgraph::{
    Entity, FindOptions, KeyValueStore, KvGraphError, Lifecycle, Model, Node, Persist,
};
use parking_lot::Mutex;

#[derive(Debug)]
struct Account {
    entity: Entity,
    log: Arc<Mutex<Vec<String>>>,
    refuse: Option<Lifecycle>,
}

impl Account {
    fn new(name: &str, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            entity: Entity::new(attrs(&[("name", name)])),
            log,
            refuse: None,
        }
    }
}

impl Model for Account {
    fn from_entity(entity: Entity) -> Self {
        Self {
            entity,
            log: Arc::default(),
            refuse: None,
        }
    }

    fn entity(&self) -> &Entity {
        &self.entity
    }

    fn entity_mut(&mut self) -> &mut Entity {
        &mut self.entity
    }
}

impl Persist for Account {
    fn validate(&self) -> Vec<String> {
        match self.entity.get("name") {
            Some(name) if !name.is_empty() => Vec::new(),
            _ => vec!["name can't be blank".to_string()],
        }
    }

    fn before(&mut self, event: Lifecycle) -> Result<(), KvGraphError> {
        self.log.lock().push(format!("before_{event:?}").to_lowercase());
        if self.refuse == Some(event) {
            return Err(KvGraphError::callback(format!("{event:?} refused")));
        }
        Ok(())
    }

    fn after(&mut self, event: Lifecycle) {
        self.log.lock().push(format!("after_{event:?}").to_lowercase());
    }
}

#[test]
fn test_create_then_find_returns_attributes_with_timestamps() {
    let graph = memory_graph();
    let node = graph
        .create(Node::new(attrs(&[("name", "alpha"), ("kind", "user")])))
        .expect("create");
    let id = node.id().expect("id assigned");
    assert_eq!(id.len(), 22);

    let found: Node = graph.find(id).expect("find");
    assert_eq!(found, node);
    assert_eq!(found.get("name"), Some("alpha"));
    assert_eq!(found.get("kind"), Some("user"));
    assert_eq!(found.attributes().len(), 4);
    for stamp in ["created_at", "updated_at"] {
        let value = found.get(stamp).expect("stamp");
        assert_eq!(value.len(), 20);
        assert!(value.ends_with('Z') && value.as_bytes()[10] == b'T', "{value}");
    }
}

#[test]
fn test_find_missing_id_fails_with_not_found() {
    let graph = memory_graph();
    let err = graph.find::<Node>("nope").expect_err("missing");
    assert!(matches!(err, KvGraphError::NotFound(ref id) if id == "nope"));
}

#[test]
fn test_destroyed_entity_is_not_found_and_cannot_be_saved() {
    let graph = memory_graph();
    let mut node = create_node(&graph);
    let id = node.id().expect("id").to_string();
    graph.destroy(&mut node).expect("destroy");
    assert!(node.entity().is_destroyed());
    assert!(matches!(
        graph.find::<Node>(&id),
        Err(KvGraphError::NotFound(_))
    ));
    assert!(matches!(
        graph.save(&mut node),
        Err(KvGraphError::InvalidInput(_))
    ));
}

#[test]
fn test_update_keeps_id_and_restamps() {
    let graph = memory_graph();
    let mut node = graph
        .create(Node::new(attrs(&[("name", "before")])))
        .expect("create");
    let created_at = node.get("created_at").expect("created").to_string();
    let first_update = node.get("updated_at").expect("updated").to_string();
    node.set("name", "after");
    graph.save(&mut node).expect("update");

    let found: Node = graph.find(node.id().expect("id")).expect("find");
    assert_eq!(found.get("name"), Some("after"));
    assert_eq!(found.get("created_at"), Some(created_at.as_str()));
    assert_ne!(found.get("updated_at"), Some(first_update.as_str()));
}

#[test]
fn test_find_many_preserves_input_order() {
    let graph = memory_graph();
    let nodes: Vec<Node> = ["a", "b", "c"]
        .iter()
        .map(|name| graph.create(Node::new(attrs(&[("name", name)]))).expect("create"))
        .collect();
    let ids = vec![
        nodes[2].id().expect("id"),
        nodes[0].id().expect("id"),
        nodes[1].id().expect("id"),
    ];
    let found: Vec<Node> = graph.find_many(&ids).expect("find many");
    let names: Vec<_> = found.iter().map(|n| n.get("name").expect("name")).collect();
    assert_eq!(names, vec!["c", "a", "b"]);
}

#[test]
fn test_find_many_falls_back_when_store_is_sharded() {
    let graph = sharded_graph(8);
    let nodes: Vec<Node> = (0..12)
        .map(|i| {
            graph
                .create(Node::new(attrs(&[("n", &i.to_string())])))
                .expect("create")
        })
        .collect();
    let ids: Vec<&str> = nodes.iter().map(|n| n.id().expect("id")).collect();
    let found: Vec<Node> = graph.find_many(&ids).expect("find many");
    assert_eq!(found, nodes);
    let order: Vec<_> = found.iter().map(|n| n.get("n").expect("n")).collect();
    assert_eq!(order, (0..12).map(|i| i.to_string()).collect::<Vec<_>>());
}

#[test]
fn test_find_many_fails_on_missing_id() {
    let graph = memory_graph();
    let node = create_node(&graph);
    let err = graph
        .find_many::<Node, _>(&[node.id().expect("id"), "ghost"])
        .expect_err("ghost");
    assert!(matches!(err, KvGraphError::NotFound(ref id) if id == "ghost"));
}

#[test]
fn test_fields_only_find_loads_requested_attributes() {
    let graph = memory_graph();
    let node = graph
        .create(Node::new(attrs(&[("name", "alpha"), ("city", "Oslo"), ("age", "30")])))
        .expect("create");
    let id = node.id().expect("id");

    let partial: Node = graph
        .find_with_options(id, &FindOptions::fields(["name", "age", "missing"]))
        .expect("find fields");
    assert_eq!(partial.get("name"), Some("alpha"));
    assert_eq!(partial.get("age"), Some("30"));
    assert_eq!(partial.get("city"), None);
    assert_eq!(partial.attributes().len(), 2);

    let many: Vec<Node> = graph
        .find_many_with(&[id, id], &FindOptions::fields(["city"]), Node::from_entity)
        .expect("find many fields");
    assert!(many.iter().all(|n| n.attributes().len() == 1 && n.get("city") == Some("Oslo")));
}

#[test]
fn test_find_many_with_factory_picks_model_per_record() {
    #[derive(Debug, PartialEq)]
    enum Found {
        Popular(String),
        Plain(String),
    }

    let graph = memory_graph();
    let cold = graph
        .create(Node::new(attrs(&[("popularity", "0.0")])))
        .expect("create");
    let hot = graph
        .create(Node::new(attrs(&[("popularity", "1.0")])))
        .expect("create");
    let ids = [cold.id().expect("id"), hot.id().expect("id")];
    let found = graph
        .find_many_with(&ids, &FindOptions::default(), |entity| {
            let id = entity.id().unwrap_or_default().to_string();
            let popularity: f64 = entity
                .get("popularity")
                .and_then(|p| p.parse().ok())
                .unwrap_or_default();
            if popularity > 0.5 {
                Found::Popular(id)
            } else {
                Found::Plain(id)
            }
        })
        .expect("find many");
    assert_eq!(
        found,
        vec![Found::Plain(ids[0].to_string()), Found::Popular(ids[1].to_string())]
    );
}

#[test]
fn test_caller_supplied_id_must_be_unique() {
    let graph = memory_graph();
    graph
        .create(Node::with_id("42", attrs(&[("name", "Bond, James Bond")])))
        .expect("create");
    let err = graph
        .create(Node::with_id("42", attrs(&[("name", "Black Bears")])))
        .expect_err("duplicate");
    match err {
        KvGraphError::ValidationFailed { entity, reasons } => {
            assert_eq!(entity.id(), Some("42"));
            assert_eq!(reasons, vec!["\"42\" already exists.".to_string()]);
        }
        other => panic!("expected ValidationFailed, got {other:?}"),
    }
    let found: Node = graph.find("42").expect("find");
    assert_eq!(found.get("name"), Some("Bond, James Bond"));
}

#[test]
fn test_failed_validation_leaves_store_untouched() {
    let graph = memory_graph();
    let log = Arc::new(Mutex::new(Vec::new()));
    let err = graph
        .create(Account::new("", log.clone()))
        .expect_err("blank name");
    assert!(matches!(err, KvGraphError::ValidationFailed { ref reasons, .. } if reasons == &["name can't be blank"]));
    assert!(graph.store().is_empty());
    assert!(log.lock().is_empty());
}

#[test]
fn test_lifecycle_callbacks_run_in_order() {
    let graph = memory_graph();
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut account = graph
        .create(Account::new("ada", log.clone()))
        .expect("create");
    account.entity_mut().set("name", "ada lovelace");
    graph.save(&mut account).expect("update");
    graph.destroy(&mut account).expect("destroy");
    assert_eq!(
        *log.lock(),
        vec![
            "before_save",
            "before_create",
            "after_create",
            "after_save",
            "before_save",
            "before_update",
            "after_update",
            "after_save",
            "before_destroy",
            "after_destroy",
        ]
    );
}

#[test]
fn test_before_hook_aborts_write() {
    let graph = memory_graph();
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut account = Account::new("ada", log);
    account.refuse = Some(Lifecycle::Create);
    let err = graph.save(&mut account).expect_err("refused");
    assert!(matches!(err, KvGraphError::CallbackAborted(_)));
    assert!(account.id().is_none());
    assert!(graph.store().is_empty());
}

#[test]
fn test_caller_supplied_id_must_not_contain_separator() {
    let graph = memory_graph();
    for id in ["a:b", ""] {
        let err = graph
            .create(Node::with_id(id, attrs(&[("name", "split")])))
            .expect_err("bad id");
        assert!(matches!(err, KvGraphError::ValidationFailed { .. }), "{id}: {err:?}");
    }
    assert!(graph.store().is_empty());
}

#[test]
fn test_increment_and_decrement() {
    let graph = memory_graph();
    let mut node = graph
        .create(Node::new(attrs(&[("test", "1")])))
        .expect("create");
    assert_eq!(graph.increment(&mut node, "test", 5).expect("incr"), 6);
    assert_eq!(graph.decrement(&mut node, "test", 4).expect("decr"), 2);
    assert_eq!(node.get("test"), Some("2"));
    let found: Node = graph.find(node.id().expect("id")).expect("find");
    assert_eq!(found.get("test"), Some("2"));

    let mut unsaved = Node::new(attrs(&[]));
    assert!(matches!(
        graph.increment(&mut unsaved, "test", 1),
        Err(KvGraphError::NotFound(_))
    ));
}

#[test]
fn test_increment_overflow_is_an_error() {
    let graph = memory_graph();
    let mut node = graph.create(Node::new(attrs(&[]))).expect("create");
    let id = node.id().expect("id").to_string();
    assert_eq!(graph.increment(&mut node, "hits", i64::MAX).expect("incr"), i64::MAX);

    let err = graph.increment(&mut node, "hits", 1).expect_err("overflow");
    assert!(matches!(err, KvGraphError::StoreError(_)));
    let found: Node = graph.find(&id).expect("find");
    assert_eq!(found.get("hits"), Some(i64::MAX.to_string().as_str()));

    let err = graph.decrement(&mut node, "hits", i64::MIN).expect_err("negation");
    assert!(matches!(err, KvGraphError::StoreError(_)));
    assert_eq!(node.get("hits"), Some(i64::MAX.to_string().as_str()));
}

#[test]
fn test_entity_json_carries_id() {
    let graph = memory_graph();
    let node = graph
        .create(Node::new(attrs(&[("name", "alpha")])))
        .expect("create");
    let json = serde_json::to_value(&node).expect("json");
    assert_eq!(json["id"], node.id().expect("id"));
    assert_eq!(json["name"], "alpha");
}

#[test]
fn test_root_node_is_addressable_and_saveable() {
    let graph = memory_graph();
    let mut root = Node::root();
    assert_eq!(root.id(), Some("root"));
    let node = create_node(&graph);
    graph
        .create_relationship("friend", &root, &node, attrs(&[]))
        .expect("relate");
    let neighbours: Vec<Node> = root.outgoing(&graph, "friend").to_vec().expect("query");
    assert_eq!(neighbours, vec![node]);

    root.set("name", "Test");
    graph.save(&mut root).expect("save root");
    let found: Node = graph.find("root").expect("find root");
    assert_eq!(found.get("name"), Some("Test"));
    assert!(graph.store().exists("root").expect("exists"));
}
