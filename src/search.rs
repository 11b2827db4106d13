//! Depth-bounded path searches over the adjacency sets.
//!
//! Both searches are unweighted. They recurse frontier by frontier without a visited set, so
//! cycles are only cut by the depth bound. A frontier node that reaches the destination directly
//! ends the search at that level.

use crate::{
    errors::KvGraphError,
    keys::node_index_key,
    store::KeyValueStore,
    types::{Direction, SearchAlgorithm},
};

pub(crate) struct PathSearch<'a, S: ?Sized> {
    pub store: &'a S,
    pub label: &'a str,
    pub direction: Direction,
    pub destination: &'a str,
    pub max_depth: usize,
}

impl<S: KeyValueStore + ?Sized> PathSearch<'_, S> {
    /// Path from `source` to the destination, both ends included; empty when none is found.
    pub fn run(&self, algorithm: SearchAlgorithm, source: &str) -> Result<Vec<String>, KvGraphError> {
        let frontier = [source.to_string()];
        match algorithm {
            SearchAlgorithm::DepthFirst => self.depth_first(&frontier, 0),
            SearchAlgorithm::Dijkstra => self.shortest(&frontier, 0),
        }
    }

    /// First path found in adjacency order.
    fn depth_first(&self, nodes: &[String], depth: usize) -> Result<Vec<String>, KvGraphError> {
        if depth > self.max_depth {
            return Ok(Vec::new());
        }
        for node in nodes {
            let key = node_index_key(node, self.label, self.direction);
            if self.store.set_is_member(&key, self.destination)? {
                return Ok(vec![node.clone(), self.destination.to_string()]);
            }
            let rest = self.depth_first(&self.store.set_members(&key)?, depth + 1)?;
            if !rest.is_empty() {
                return Ok(prefixed(node, rest));
            }
        }
        Ok(Vec::new())
    }

    /// Shortest of the sibling branches explored at each level.
    fn shortest(&self, nodes: &[String], depth: usize) -> Result<Vec<String>, KvGraphError> {
        if depth > self.max_depth {
            return Ok(Vec::new());
        }
        let mut best: Vec<String> = Vec::new();
        for node in nodes {
            let key = node_index_key(node, self.label, self.direction);
            if self.store.set_is_member(&key, self.destination)? {
                return Ok(vec![node.clone(), self.destination.to_string()]);
            }
            let rest = self.shortest(&self.store.set_members(&key)?, depth + 1)?;
            if !rest.is_empty() && (best.is_empty() || rest.len() + 1 < best.len()) {
                best = prefixed(node, rest);
            }
        }
        Ok(best)
    }
}

fn prefixed(node: &str, rest: Vec<String>) -> Vec<String> {
    let mut path = Vec::with_capacity(rest.len() + 1);
    path.push(node.to_string());
    path.extend(rest);
    path
}
