//! Traversal, path search, pagination and set algebra from one source node.
//!
//! A [`Query`] is a builder: nothing touches the store until a terminal operation
//! ([`Query::ids`], [`Query::to_vec`], [`Query::count`], [`Query::contains`], [`Query::find`],
//! [`Query::union`] ...) runs. Node results come from the adjacency sets, relationship results from
//! the score-ordered edge indexes (highest score first), path searches from
//! [`crate::search`].

use std::cell::Cell;

use ahash::AHashSet;
use tracing::{debug, warn};

use crate::{
    entity::{Entity, FindOptions, Model},
    errors::KvGraphError,
    graph::Graph,
    keys::{node_index_key, oriented_pointer_key, relationship_index_key, validate_label},
    node::NodeRef,
    search::PathSearch,
    store::KeyValueStore,
    types::{Direction, Page, ResultType, SearchAlgorithm},
};

pub const DEFAULT_DEPTH: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetOp {
    Union,
    Diff,
    Intersect,
}

pub struct Query<'g, S> {
    graph: &'g Graph<S>,
    source: Option<String>,
    result_type: ResultType,
    label: Option<String>,
    direction: Direction,
    limit: Option<usize>,
    page: Option<Page>,
    depth: usize,
    include_start_node: bool,
    destination: Option<String>,
    algorithm: Option<SearchAlgorithm>,
    options: FindOptions,
    size: Cell<Option<usize>>,
}

impl<'g, S: KeyValueStore> Query<'g, S> {
    pub(crate) fn new(graph: &'g Graph<S>, source: Option<String>) -> Self {
        Self {
            graph,
            source,
            result_type: ResultType::Nodes,
            label: None,
            direction: Direction::Out,
            limit: None,
            page: None,
            depth: graph.config().default_depth,
            include_start_node: false,
            destination: None,
            algorithm: None,
            options: FindOptions::default(),
            size: Cell::new(None),
        }
    }

    pub fn outgoing(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self.direction = Direction::Out;
        self
    }

    pub fn incoming(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self.direction = Direction::In;
        self
    }

    pub fn nodes(mut self) -> Self {
        self.result_type = ResultType::Nodes;
        self
    }

    pub fn relationships(mut self) -> Self {
        self.result_type = ResultType::Relationships;
        self
    }

    pub fn limit(mut self, count: usize) -> Self {
        self.limit = Some(count);
        self
    }

    pub fn per_page(self, count: usize) -> Self {
        self.limit(count)
    }

    /// A page number (1-indexed) or a relationship to continue after.
    pub fn page(mut self, page: impl Into<Page>) -> Self {
        self.page = Some(page.into());
        self
    }

    pub fn depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn include_start_node(mut self) -> Self {
        self.include_start_node = true;
        self
    }

    pub fn path_to<N: NodeRef + ?Sized>(self, destination: &N) -> Self {
        self.search(destination, SearchAlgorithm::DepthFirst)
    }

    pub fn shortest_path_to<N: NodeRef + ?Sized>(self, destination: &N) -> Self {
        self.search(destination, SearchAlgorithm::Dijkstra)
    }

    /// Sets the search algorithm alone; running it without a destination is an invalid query.
    pub fn algorithm(mut self, algorithm: SearchAlgorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    pub fn fields<I, T>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.options = FindOptions::fields(fields);
        self
    }

    fn search<N: NodeRef + ?Sized>(mut self, destination: &N, algorithm: SearchAlgorithm) -> Self {
        self.destination = destination.node_id();
        self.algorithm = Some(algorithm);
        self
    }

    pub fn result_type(&self) -> ResultType {
        self.result_type
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Ids the query resolves to: node ids for adjacency and path queries, relationship ids for
    /// relationship listings.
    pub fn ids(&self) -> Result<Vec<String>, KvGraphError> {
        let (source, label) = self.shape()?;
        if let Some(algorithm) = self.algorithm {
            let destination = self.destination.as_deref().ok_or_else(|| {
                KvGraphError::invalid_query("path search requires a destination")
            })?;
            let search = PathSearch {
                store: self.graph.store(),
                label,
                direction: self.direction,
                destination,
                max_depth: self.depth,
            };
            let mut path = search.run(algorithm, source)?;
            if !self.include_start_node && !path.is_empty() {
                path.remove(0);
            }
            debug!(
                target: "kvgraph::query",
                source,
                destination,
                ?algorithm,
                hops = path.len(),
                "path search finished"
            );
            return Ok(path);
        }

        match self.result_type {
            ResultType::Nodes => {
                let key = node_index_key(source, label, self.direction);
                let mut ids = match self.limit {
                    Some(limit) => self.graph.store().set_random_members(&key, limit)?,
                    None => self.graph.store().set_members(&key)?,
                };
                if self.include_start_node {
                    ids.insert(0, source.to_string());
                }
                Ok(ids)
            }
            ResultType::Relationships => {
                let key = relationship_index_key(source, label, self.direction);
                match self.window(&key)? {
                    Some((start, stop)) => self.graph.store().zset_reverse_range(&key, start, stop),
                    None => Ok(Vec::new()),
                }
            }
        }
    }

    /// Inclusive reverse-range bounds for relationship listings; `None` for an empty page.
    fn window(&self, key: &str) -> Result<Option<(isize, isize)>, KvGraphError> {
        if self.limit == Some(0) {
            return Ok(None);
        }
        let limit = self.limit.map(to_index);
        let window = match (&self.page, limit) {
            (None, None) | (Some(Page::Number(_)), None) => (0, -1),
            (None, Some(limit)) => (0, limit - 1),
            (Some(Page::Number(number)), Some(limit)) => {
                let number = to_index((*number).max(1));
                // A page past the addressable range is empty.
                let Some(start) = (number - 1).checked_mul(limit) else {
                    return Ok(None);
                };
                (start, start.saturating_add(limit - 1))
            }
            (Some(Page::After(cursor)), limit) => {
                if cursor.is_empty() {
                    return Err(KvGraphError::invalid_query(
                        "page cursor is a relationship without an id",
                    ));
                }
                let Some(rank) = self.graph.store().zset_reverse_rank(key, cursor)? else {
                    return Ok(None);
                };
                let rank = to_index(rank);
                (
                    rank.saturating_add(1),
                    limit.map_or(-1, |limit| rank.saturating_add(limit)),
                )
            }
        };
        Ok(Some(window))
    }

    /// Materializes the results as `M`, preserving order.
    pub fn to_vec<M: Model>(&self) -> Result<Vec<M>, KvGraphError> {
        self.to_vec_with(M::from_entity)
    }

    /// Like [`Query::to_vec`] with a factory choosing the model per loaded entity.
    pub fn to_vec_with<T, F>(&self, factory: F) -> Result<Vec<T>, KvGraphError>
    where
        F: FnMut(Entity) -> T,
    {
        let ids = self.ids()?;
        self.graph.find_many_with(&ids, &self.options, factory)
    }

    /// Cardinality of the underlying set, clamped to the limit.
    pub fn count(&self) -> Result<usize, KvGraphError> {
        let (source, label) = self.shape()?;
        let count = if self.algorithm.is_some() {
            self.ids()?.len()
        } else {
            match self.result_type {
                ResultType::Nodes => self
                    .graph
                    .store()
                    .set_cardinality(&node_index_key(source, label, self.direction))?,
                ResultType::Relationships => self
                    .graph
                    .store()
                    .zset_cardinality(&relationship_index_key(source, label, self.direction))?,
            }
        };
        let count = self.limit.map_or(count, |limit| count.min(limit));
        self.size.set(Some(count));
        Ok(count)
    }

    /// Last computed count, computing it on first use.
    pub fn size(&self) -> Result<usize, KvGraphError> {
        match self.size.get() {
            Some(size) => Ok(size),
            None => self.count(),
        }
    }

    /// Membership test: a node id for node queries, a relationship id for relationship listings,
    /// any node on the path for path searches.
    pub fn contains<N: NodeRef + ?Sized>(&self, member: &N) -> Result<bool, KvGraphError> {
        let Some(member) = member.node_id() else {
            return Ok(false);
        };
        let (source, label) = self.shape()?;
        if self.algorithm.is_some() {
            return Ok(self.ids()?.contains(&member));
        }
        match self.result_type {
            ResultType::Nodes => self
                .graph
                .store()
                .set_is_member(&node_index_key(source, label, self.direction), &member),
            ResultType::Relationships => Ok(self
                .graph
                .store()
                .zset_score(&relationship_index_key(source, label, self.direction), &member)?
                .is_some()),
        }
    }

    /// The neighbour `node` for node queries, or the relationship linking the source to `node`
    /// for relationship queries. `None` when they are not connected.
    pub fn find<M: Model, N: NodeRef + ?Sized>(&self, node: &N) -> Result<Option<M>, KvGraphError> {
        let Some(other) = node.node_id() else {
            return Ok(None);
        };
        let (source, label) = self.shape()?;
        let store = self.graph.store();
        let id = match self.result_type {
            ResultType::Nodes => store
                .set_is_member(&node_index_key(source, label, self.direction), &other)?
                .then_some(other),
            ResultType::Relationships => {
                store.get(&oriented_pointer_key(source, label, self.direction, &other))?
            }
        };
        match id {
            Some(id) => self
                .graph
                .find_with_options(&id, &self.options)
                .map(Some),
            None => Ok(None),
        }
    }

    pub fn union<M: Model>(&self, other: &Query<'_, S>) -> Result<Vec<M>, KvGraphError> {
        self.combine(SetOp::Union, other)
    }

    pub fn diff<M: Model>(&self, other: &Query<'_, S>) -> Result<Vec<M>, KvGraphError> {
        self.combine(SetOp::Diff, other)
    }

    pub fn intersect<M: Model>(&self, other: &Query<'_, S>) -> Result<Vec<M>, KvGraphError> {
        self.combine(SetOp::Intersect, other)
    }

    fn combine<M: Model>(&self, op: SetOp, other: &Query<'_, S>) -> Result<Vec<M>, KvGraphError> {
        let ids = self.combine_ids(op, other)?;
        self.graph
            .find_many_with(&ids, &self.options, M::from_entity)
    }

    /// Node ids of `self op other`, sorted. Uses the store's multi-key operation and, when the
    /// keys live on different shards, the same operation computed client-side.
    pub fn combine_ids(&self, op: SetOp, other: &Query<'_, S>) -> Result<Vec<String>, KvGraphError> {
        let left = self.adjacency_key()?;
        let right = other.adjacency_key()?;
        let keys = [left.as_str(), right.as_str()];
        let store = self.graph.store();
        let native = match op {
            SetOp::Union => store.set_union(&keys),
            SetOp::Diff => store.set_diff(&keys),
            SetOp::Intersect => store.set_intersect(&keys),
        };
        match native {
            Ok(ids) => Ok(ids),
            Err(err) if err.is_cannot_combine() => {
                warn!(
                    target: "kvgraph::query",
                    ?op,
                    left = %left,
                    right = %right,
                    "store cannot combine keys, computing set operation client-side"
                );
                let left = store.set_members(&left)?;
                let right: AHashSet<String> = store.set_members(&right)?.into_iter().collect();
                Ok(combine_members(op, left, right))
            }
            Err(err) => Err(err),
        }
    }

    fn adjacency_key(&self) -> Result<String, KvGraphError> {
        if self.result_type != ResultType::Nodes || self.algorithm.is_some() {
            return Err(KvGraphError::invalid_query(
                "set operations need node adjacency queries",
            ));
        }
        let (source, label) = self.shape()?;
        Ok(node_index_key(source, label, self.direction))
    }

    fn shape(&self) -> Result<(&str, &str), KvGraphError> {
        let source = self
            .source
            .as_deref()
            .ok_or_else(|| KvGraphError::invalid_query("query source has no id"))?;
        let label = self
            .label
            .as_deref()
            .ok_or_else(|| KvGraphError::invalid_query("query needs a relationship label"))?;
        validate_label(label).map_err(|e| KvGraphError::invalid_query(e.to_string()))?;
        Ok((source, label))
    }
}

fn to_index(value: usize) -> isize {
    isize::try_from(value).unwrap_or(isize::MAX)
}

fn combine_members(op: SetOp, left: Vec<String>, right: AHashSet<String>) -> Vec<String> {
    let mut ids: Vec<String> = match op {
        SetOp::Union => {
            let mut all: AHashSet<String> = left.into_iter().collect();
            all.extend(right);
            all.into_iter().collect()
        }
        SetOp::Diff => left.into_iter().filter(|id| !right.contains(id)).collect(),
        SetOp::Intersect => left.into_iter().filter(|id| right.contains(id)).collect(),
    };
    ids.sort();
    ids.dedup();
    ids
}
