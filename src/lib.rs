//! Property graphs stored in a key-value / sorted-set store.
//!
//! Nodes and relationships are hashes keyed by id. Each relationship additionally maintains
//! score-ordered edge indexes, adjacency sets and a triple pointer (see [`keys`]), all written
//! and removed atomically. Queries traverse those indexes for neighbours, paginated edge
//! listings, depth-bounded path searches and set algebra; the latter falls back to client-side
//! computation when a sharded store refuses multi-key operations.
//!
//! ```rust
//! use kvgraph::{Attributes, Graph, MemoryStore, Node};
//!
//! let graph = Graph::new(MemoryStore::new());
//! let alice = graph.create(Node::new(Attributes::new()))?;
//! let bob = graph.create(Node::new(Attributes::new()))?;
//! graph.create_relationship("follow", &alice, &bob, Attributes::new())?;
//!
//! let following: Vec<Node> = alice.outgoing(&graph, "follow").to_vec()?;
//! assert_eq!(following, vec![bob]);
//! # Ok::<(), kvgraph::KvGraphError>(())
//! ```
//!
//! Run Criterion benchmarks with `cargo bench` to inspect reports under `target/criterion`.

pub mod clock;
pub mod config;
pub mod entity;
pub mod errors;
pub mod flow;
pub mod follower;
pub mod graph;
pub mod id;
pub mod keys;
pub mod node;
pub mod properties;
pub mod query;
pub mod relationship;
#[cfg(feature = "sqlite-backend")]
pub mod schema;
mod search;
pub mod store;
pub mod types;

pub use crate::clock::{Clock, SteppingClock, SystemClock};
pub use crate::config::{GraphConfig, SqliteConfig, StoreKind, open_graph};
pub use crate::entity::{Entity, FindOptions, Lifecycle, Model, Persist, WriteContext};
pub use crate::errors::KvGraphError;
pub use crate::flow::{DataFlows, Flow, FlowJob, FlowQueue, MemoryQueue, Step};
pub use crate::follower::Follower;
pub use crate::graph::Graph;
pub use crate::id::{IdGenerator, RandomIdGenerator};
pub use crate::node::{Node, NodeRef};
pub use crate::properties::{Properties, PropertyKind, PropertyValue};
pub use crate::query::{Query, SetOp};
pub use crate::relationship::{Relationship, Weigher};
#[cfg(feature = "sqlite-backend")]
pub use crate::store::SqliteStore;
pub use crate::store::{Command, KeyValueStore, MemoryStore, Namespaced, Read, Reply};
pub use crate::types::{Attributes, Direction, Page, ResultType, SearchAlgorithm};
