//! Key construction for the edge index.
//!
//! A relationship is represented by six keys: its attribute hash (keyed by the bare id), two
//! scored edge indexes, two adjacency sets and one pointer from the `(start, label, end)` triple.
//! Key segments are joined with `:`.

use crate::{errors::KvGraphError, types::Direction};

/// Separator used between key segments.
const SEP: char = ':';

/// Validate a relationship label.
pub fn validate_label(label: &str) -> Result<(), KvGraphError> {
    if label.trim().is_empty() {
        return Err(KvGraphError::invalid_input("label must not be empty"));
    }
    if label.contains(SEP) {
        return Err(KvGraphError::invalid_input("label must not contain ':'"));
    }
    Ok(())
}

/// Scored edge index: `{node}:r:{label}:{dir}`.
pub fn relationship_index_key(node_id: &str, label: &str, direction: Direction) -> String {
    format!("{node_id}{SEP}r{SEP}{label}{SEP}{}", direction.as_str())
}

/// Adjacency set: `{node}:n:{label}:{dir}`.
pub fn node_index_key(node_id: &str, label: &str, direction: Direction) -> String {
    format!("{node_id}{SEP}n{SEP}{label}{SEP}{}", direction.as_str())
}

/// Direct pointer from an edge triple to the relationship id: `{start}:{label}:{end}`.
pub fn pointer_key(start_id: &str, label: &str, end_id: &str) -> String {
    format!("{start_id}{SEP}{label}{SEP}{end_id}")
}

/// Pointer key seen from `node_id` looking at `other_id` in `direction`.
pub fn oriented_pointer_key(
    node_id: &str,
    label: &str,
    direction: Direction,
    other_id: &str,
) -> String {
    match direction {
        Direction::Out => pointer_key(node_id, label, other_id),
        Direction::In => pointer_key(other_id, label, node_id),
    }
}

/// The five index keys of an edge (the attribute hash key is the id itself).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdgeKeys {
    pub out_relationships: String,
    pub in_relationships: String,
    pub out_nodes: String,
    pub in_nodes: String,
    pub pointer: String,
}

impl EdgeKeys {
    pub fn new(start_id: &str, label: &str, end_id: &str) -> Self {
        Self {
            out_relationships: relationship_index_key(start_id, label, Direction::Out),
            in_relationships: relationship_index_key(end_id, label, Direction::In),
            out_nodes: node_index_key(start_id, label, Direction::Out),
            in_nodes: node_index_key(end_id, label, Direction::In),
            pointer: pointer_key(start_id, label, end_id),
        }
    }

    pub fn relationships(&self, direction: Direction) -> &str {
        match direction {
            Direction::Out => &self.out_relationships,
            Direction::In => &self.in_relationships,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_keys_follow_the_index_layout() {
        let keys = EdgeKeys::new("a", "follow", "b");
        assert_eq!(keys.out_relationships, "a:r:follow:out");
        assert_eq!(keys.in_relationships, "b:r:follow:in");
        assert_eq!(keys.out_nodes, "a:n:follow:out");
        assert_eq!(keys.in_nodes, "b:n:follow:in");
        assert_eq!(keys.pointer, "a:follow:b");
    }

    #[test]
    fn oriented_pointer_swaps_for_incoming() {
        assert_eq!(oriented_pointer_key("b", "like", Direction::In, "a"), "a:like:b");
        assert_eq!(oriented_pointer_key("a", "like", Direction::Out, "b"), "a:like:b");
    }

    #[test]
    fn label_validation_rejects_separator() {
        assert!(validate_label("friend").is_ok());
        assert!(validate_label("").is_err());
        assert!(validate_label("a:b").is_err());
    }
}
