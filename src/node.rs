use serde::Serialize;

use crate::{
    entity::{Entity, Model, Persist},
    graph::Graph,
    query::Query,
    store::KeyValueStore,
    types::Attributes,
};

/// Id of the well-known root node.
pub const ROOT_ID: &str = "root";

/// A graph vertex. Its edges live only in the derived index keys written by relationships.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Node {
    entity: Entity,
}

impl Node {
    pub fn new(attributes: Attributes) -> Self {
        Self {
            entity: Entity::new(attributes),
        }
    }

    pub fn with_id(id: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            entity: Entity::with_id(id, attributes),
        }
    }

    /// The `root` node. It is addressable without ever being created; saving it writes its hash.
    pub fn root() -> Self {
        Self {
            entity: Entity::loaded(ROOT_ID, Attributes::new()),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.entity.id()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.entity.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.entity.set(field, value);
    }

    pub fn attributes(&self) -> &Attributes {
        self.entity.attributes()
    }

    pub fn query<'g, S: KeyValueStore>(&self, graph: &'g Graph<S>) -> Query<'g, S> {
        graph.query(self)
    }

    pub fn outgoing<'g, S: KeyValueStore>(&self, graph: &'g Graph<S>, label: &str) -> Query<'g, S> {
        self.query(graph).outgoing(label)
    }

    pub fn incoming<'g, S: KeyValueStore>(&self, graph: &'g Graph<S>, label: &str) -> Query<'g, S> {
        self.query(graph).incoming(label)
    }

    pub fn path_to<'g, S: KeyValueStore, N: NodeRef + ?Sized>(
        &self,
        graph: &'g Graph<S>,
        destination: &N,
    ) -> Query<'g, S> {
        self.query(graph).path_to(destination)
    }

    pub fn shortest_path_to<'g, S: KeyValueStore, N: NodeRef + ?Sized>(
        &self,
        graph: &'g Graph<S>,
        destination: &N,
    ) -> Query<'g, S> {
        self.query(graph).shortest_path_to(destination)
    }
}

impl Model for Node {
    fn from_entity(entity: Entity) -> Self {
        Self { entity }
    }

    fn entity(&self) -> &Entity {
        &self.entity
    }

    fn entity_mut(&mut self) -> &mut Entity {
        &mut self.entity
    }
}

impl Persist for Node {}

/// Anything that can name a node: an id string, a stored model, or an optional one.
/// `None` (or an unsaved model) yields no id.
pub trait NodeRef {
    fn node_id(&self) -> Option<String>;
}

impl NodeRef for str {
    fn node_id(&self) -> Option<String> {
        Some(self.to_string())
    }
}

impl NodeRef for String {
    fn node_id(&self) -> Option<String> {
        Some(self.clone())
    }
}

impl NodeRef for Entity {
    fn node_id(&self) -> Option<String> {
        self.id().map(str::to_string)
    }
}

impl NodeRef for Node {
    fn node_id(&self) -> Option<String> {
        self.id().map(str::to_string)
    }
}

impl<T: NodeRef + ?Sized> NodeRef for &T {
    fn node_id(&self) -> Option<String> {
        (**self).node_id()
    }
}

impl<T: NodeRef> NodeRef for Option<T> {
    fn node_id(&self) -> Option<String> {
        self.as_ref().and_then(NodeRef::node_id)
    }
}
