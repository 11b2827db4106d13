use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::relationship::Relationship;

/// Stored attribute map. Values are opaque strings; ordering is by field name.
pub type Attributes = BTreeMap<String, String>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Out,
    In,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Out => "out",
            Direction::In => "in",
        }
    }

    pub fn reverse(self) -> Self {
        match self {
            Direction::Out => Direction::In,
            Direction::In => Direction::Out,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ResultType {
    #[default]
    Nodes,
    Relationships,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchAlgorithm {
    /// First path found in adjacency order.
    DepthFirst,
    /// Shortest (by hop count) among the paths explored within the depth bound.
    Dijkstra,
}

/// Page selector for relationship listings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Page {
    /// 1-indexed page number.
    Number(usize),
    /// Anchor on a relationship id; the page holds the entries ranked after it.
    After(String),
}

impl From<usize> for Page {
    fn from(number: usize) -> Self {
        Page::Number(number)
    }
}

impl From<&Relationship> for Page {
    fn from(rel: &Relationship) -> Self {
        Page::After(rel.id().unwrap_or_default().to_string())
    }
}

impl From<&str> for Page {
    fn from(id: &str) -> Self {
        Page::After(id.to_string())
    }
}

impl From<String> for Page {
    fn from(id: String) -> Self {
        Page::After(id)
    }
}
