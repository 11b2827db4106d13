//! Directed, labelled edges and the six-key write protocol that indexes them.
//!
//! Creating a relationship writes, in one atomic batch, its attribute hash plus:
//! the out/in edge indexes (sorted sets of relationship ids scored by weight), the out/in
//! adjacency sets (node ids) and the `{start}:{label}:{end}` pointer. Destroying it removes the
//! same six keys in one batch. Both writes then dispatch the data flows registered under the
//! label with the relationship as payload.

use serde::Serialize;
use tracing::debug;

use crate::{
    entity::{Entity, Lifecycle, Model, Persist, WriteContext},
    errors::KvGraphError,
    graph::Graph,
    keys::EdgeKeys,
    node::{Node, NodeRef},
    store::{Command, KeyValueStore},
    types::{Attributes, Direction},
};

pub const LABEL: &str = "label";
pub const START_NODE_ID: &str = "start_node_id";
pub const END_NODE_ID: &str = "end_node_id";

/// Scores a relationship in one direction's edge index.
pub trait Weigher: Send + Sync {
    fn weight(&self, relationship: &Relationship, direction: Direction) -> f64;
}

impl<F> Weigher for F
where
    F: Fn(&Relationship, Direction) -> f64 + Send + Sync,
{
    fn weight(&self, relationship: &Relationship, direction: Direction) -> f64 {
        self(relationship, direction)
    }
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(transparent)]
pub struct Relationship {
    entity: Entity,
    #[serde(skip)]
    label: String,
    #[serde(skip)]
    start_node_id: String,
    #[serde(skip)]
    end_node_id: String,
}

impl Relationship {
    /// Unsaved relationship. Missing endpoints are accepted here and rejected when saved.
    pub fn new<A, B>(label: &str, start: &A, end: &B, mut attributes: Attributes) -> Self
    where
        A: NodeRef + ?Sized,
        B: NodeRef + ?Sized,
    {
        let start_node_id = start.node_id().unwrap_or_default();
        let end_node_id = end.node_id().unwrap_or_default();
        for (field, value) in [
            (LABEL, label),
            (START_NODE_ID, start_node_id.as_str()),
            (END_NODE_ID, end_node_id.as_str()),
        ] {
            if !value.is_empty() {
                attributes.insert(field.to_string(), value.to_string());
            }
        }
        Self {
            entity: Entity::new(attributes),
            label: label.to_string(),
            start_node_id,
            end_node_id,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.entity.id()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn start_node_id(&self) -> &str {
        &self.start_node_id
    }

    pub fn end_node_id(&self) -> &str {
        &self.end_node_id
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

    pub fn keys(&self) -> EdgeKeys {
        EdgeKeys::new(&self.start_node_id, &self.label, &self.end_node_id)
    }

    /// Position in the `direction` edge index, 0 being the highest score.
    pub fn rank<S: KeyValueStore>(
        &self,
        graph: &Graph<S>,
        direction: Direction,
    ) -> Result<usize, KvGraphError> {
        let id = self.require_id()?;
        graph
            .store()
            .zset_reverse_rank(self.keys().relationships(direction), id)?
            .ok_or_else(|| KvGraphError::not_found(format!("{id} is not in the {} index", direction.as_str())))
    }

    pub fn weight<S: KeyValueStore>(
        &self,
        graph: &Graph<S>,
        direction: Direction,
    ) -> Result<f64, KvGraphError> {
        let id = self.require_id()?;
        graph
            .store()
            .zset_score(self.keys().relationships(direction), id)?
            .ok_or_else(|| KvGraphError::not_found(format!("{id} is not in the {} index", direction.as_str())))
    }

    /// Adjusts only the `direction` score; returns the new weight.
    pub fn increment_weight<S: KeyValueStore>(
        &self,
        graph: &Graph<S>,
        direction: Direction,
        by: f64,
    ) -> Result<f64, KvGraphError> {
        let id = self.require_id()?;
        let weight = graph
            .store()
            .zset_increment(self.keys().relationships(direction), id, by)?;
        debug!(
            target: "kvgraph::relationship",
            id,
            direction = direction.as_str(),
            weight,
            "weight adjusted"
        );
        Ok(weight)
    }

    pub fn decrement_weight<S: KeyValueStore>(
        &self,
        graph: &Graph<S>,
        direction: Direction,
        by: f64,
    ) -> Result<f64, KvGraphError> {
        self.increment_weight(graph, direction, -by)
    }

    pub fn start_node<S: KeyValueStore>(&self, graph: &Graph<S>) -> Result<Node, KvGraphError> {
        graph.find(&self.start_node_id)
    }

    pub fn end_node<S: KeyValueStore>(&self, graph: &Graph<S>) -> Result<Node, KvGraphError> {
        graph.find(&self.end_node_id)
    }

    /// Label and endpoints as stored. A relationship loaded with only some fields reads the
    /// missing ones back so its index keys can still be addressed.
    fn stored_edge<S: KeyValueStore>(
        &self,
        graph: &Graph<S>,
        id: &str,
    ) -> Result<(String, String, String), KvGraphError> {
        let loaded = [&self.label, &self.start_node_id, &self.end_node_id];
        if loaded.iter().all(|value| !value.is_empty()) {
            return Ok((
                self.label.clone(),
                self.start_node_id.clone(),
                self.end_node_id.clone(),
            ));
        }
        let fields = [LABEL, START_NODE_ID, END_NODE_ID].map(String::from);
        match graph.store().hash_get_fields(id, &fields)?.as_slice() {
            [Some(label), Some(start), Some(end)]
                if !label.is_empty() && !start.is_empty() && !end.is_empty() =>
            {
                Ok((label.clone(), start.clone(), end.clone()))
            }
            _ => Err(KvGraphError::invalid_input(format!(
                "relationship {id} has no stored label or endpoints"
            ))),
        }
    }

    fn require_id(&self) -> Result<&str, KvGraphError> {
        self.id()
            .ok_or_else(|| KvGraphError::not_found("relationship has no id"))
    }
}

/// Relationships are equal when they carry the same id.
impl PartialEq for Relationship {
    fn eq(&self, other: &Self) -> bool {
        self.entity == other.entity
    }
}

impl Model for Relationship {
    fn from_entity(entity: Entity) -> Self {
        let field = |name: &str| entity.get(name).unwrap_or_default().to_string();
        let label = field(LABEL);
        let start_node_id = field(START_NODE_ID);
        let end_node_id = field(END_NODE_ID);
        Self {
            entity,
            label,
            start_node_id,
            end_node_id,
        }
    }

    fn entity(&self) -> &Entity {
        &self.entity
    }

    fn entity_mut(&mut self) -> &mut Entity {
        &mut self.entity
    }
}

impl Persist for Relationship {
    fn validate(&self) -> Vec<String> {
        let mut reasons = Vec::new();
        for (field, value) in [
            (LABEL, &self.label),
            (START_NODE_ID, &self.start_node_id),
            (END_NODE_ID, &self.end_node_id),
        ] {
            if value.trim().is_empty() {
                reasons.push(format!("{field} can't be blank"));
            } else if self.entity.get(field) != Some(value.as_str()) {
                reasons.push(format!("{field} cannot be changed"));
            }
        }
        if self.label.contains(':') {
            reasons.push(format!("{LABEL} must not contain ':'"));
        }
        reasons
    }

    fn index_commands<S: KeyValueStore>(
        &self,
        graph: &Graph<S>,
        write: &WriteContext,
    ) -> Result<Vec<Command>, KvGraphError> {
        let id = self.require_id()?.to_string();
        let keys = self.keys();
        let commands = match write.event {
            Lifecycle::Create => vec![
                Command::ZAdd {
                    key: keys.out_relationships,
                    score: graph.weight_for(self, Direction::Out, write.at),
                    member: id.clone(),
                },
                Command::ZAdd {
                    key: keys.in_relationships,
                    score: graph.weight_for(self, Direction::In, write.at),
                    member: id.clone(),
                },
                Command::SetAdd {
                    key: keys.out_nodes,
                    member: self.end_node_id.clone(),
                },
                Command::SetAdd {
                    key: keys.in_nodes,
                    member: self.start_node_id.clone(),
                },
                Command::Set {
                    key: keys.pointer,
                    value: id,
                },
            ],
            // Time-based weights keep their creation score; custom ones follow the attributes.
            Lifecycle::Update if graph.has_custom_weight(&self.label) => vec![
                Command::ZAdd {
                    key: keys.out_relationships,
                    score: graph.weight_for(self, Direction::Out, write.at),
                    member: id.clone(),
                },
                Command::ZAdd {
                    key: keys.in_relationships,
                    score: graph.weight_for(self, Direction::In, write.at),
                    member: id,
                },
            ],
            Lifecycle::Destroy => {
                let (label, start, end) = self.stored_edge(graph, &id)?;
                let keys = EdgeKeys::new(&start, &label, &end);
                vec![
                    Command::ZRemove {
                        key: keys.out_relationships,
                        member: id.clone(),
                    },
                    Command::ZRemove {
                        key: keys.in_relationships,
                        member: id,
                    },
                    Command::SetRemove {
                        key: keys.out_nodes,
                        member: end,
                    },
                    Command::SetRemove {
                        key: keys.in_nodes,
                        member: start,
                    },
                    Command::Delete { key: keys.pointer },
                ]
            }
            Lifecycle::Update | Lifecycle::Save => Vec::new(),
        };
        Ok(commands)
    }

    fn committed<S: KeyValueStore>(
        &self,
        graph: &Graph<S>,
        write: &WriteContext,
    ) -> Result<(), KvGraphError> {
        debug!(
            target: "kvgraph::relationship",
            id = self.id().unwrap_or_default(),
            label = %self.label,
            event = ?write.event,
            "relationship committed"
        );
        graph.flows().execute_named(&self.label, &self.entity.to_json())
    }
}

impl<S: KeyValueStore> Graph<S> {
    /// Creates `start -[label]-> end`. Endpoints may be ids or stored models.
    pub fn create_relationship<A, B>(
        &self,
        label: &str,
        start: &A,
        end: &B,
        attributes: Attributes,
    ) -> Result<Relationship, KvGraphError>
    where
        A: NodeRef + ?Sized,
        B: NodeRef + ?Sized,
    {
        self.create(Relationship::new(label, start, end, attributes))
    }
}
