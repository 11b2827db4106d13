//! Store adapter bridging the graph engine with a key-value / sorted-set backend. Each trait
//! method maps onto one primitive of the backend; the engine never assumes anything beyond this
//! surface. Two adapters ship with the crate: [`MemoryStore`] (optionally simulating a sharded
//! deployment) and, with the `sqlite-backend` feature, [`SqliteStore`].

use rand::Rng;

use crate::{errors::KvGraphError, types::Attributes};

pub mod memory;
pub mod namespace;
#[cfg(feature = "sqlite-backend")]
pub mod sqlite;

pub use memory::MemoryStore;
pub use namespace::Namespaced;
#[cfg(feature = "sqlite-backend")]
pub use sqlite::SqliteStore;

/// A write executed as part of an atomic [`KeyValueStore::multi`] batch.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Set { key: String, value: String },
    Delete { key: String },
    HashSet { key: String, fields: Attributes },
    SetAdd { key: String, member: String },
    SetRemove { key: String, member: String },
    ZAdd { key: String, score: f64, member: String },
    ZRemove { key: String, member: String },
}

impl Command {
    pub fn key(&self) -> &str {
        match self {
            Command::Set { key, .. }
            | Command::Delete { key }
            | Command::HashSet { key, .. }
            | Command::SetAdd { key, .. }
            | Command::SetRemove { key, .. }
            | Command::ZAdd { key, .. }
            | Command::ZRemove { key, .. } => key,
        }
    }

    pub(crate) fn with_key(&self, key: String) -> Command {
        match self.clone() {
            Command::Set { value, .. } => Command::Set { key, value },
            Command::Delete { .. } => Command::Delete { key },
            Command::HashSet { fields, .. } => Command::HashSet { key, fields },
            Command::SetAdd { member, .. } => Command::SetAdd { key, member },
            Command::SetRemove { member, .. } => Command::SetRemove { key, member },
            Command::ZAdd { score, member, .. } => Command::ZAdd { key, score, member },
            Command::ZRemove { member, .. } => Command::ZRemove { key, member },
        }
    }
}

/// A read issued as part of a [`KeyValueStore::pipelined`] batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Read {
    HashGetAll { key: String },
    HashGetFields { key: String, fields: Vec<String> },
}

impl Read {
    pub fn key(&self) -> &str {
        match self {
            Read::HashGetAll { key } | Read::HashGetFields { key, .. } => key,
        }
    }

    pub(crate) fn with_key(&self, key: String) -> Read {
        match self.clone() {
            Read::HashGetAll { .. } => Read::HashGetAll { key },
            Read::HashGetFields { fields, .. } => Read::HashGetFields { key, fields },
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Reply {
    Hash(Attributes),
    Fields(Vec<Option<String>>),
}

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, KvGraphError>;
    fn set(&self, key: &str, value: &str) -> Result<(), KvGraphError>;
    /// Removes the key whatever its type; returns whether it existed.
    fn delete(&self, key: &str) -> Result<bool, KvGraphError>;
    fn exists(&self, key: &str) -> Result<bool, KvGraphError>;

    fn hash_get_all(&self, key: &str) -> Result<Attributes, KvGraphError>;
    fn hash_get_fields(
        &self,
        key: &str,
        fields: &[String],
    ) -> Result<Vec<Option<String>>, KvGraphError>;
    fn hash_set_fields(&self, key: &str, fields: &Attributes) -> Result<(), KvGraphError>;
    fn hash_increment(&self, key: &str, field: &str, by: i64) -> Result<i64, KvGraphError>;

    fn set_add(&self, key: &str, member: &str) -> Result<bool, KvGraphError>;
    fn set_remove(&self, key: &str, member: &str) -> Result<bool, KvGraphError>;
    /// Members in ascending order.
    fn set_members(&self, key: &str) -> Result<Vec<String>, KvGraphError>;
    /// `count` members drawn with replacement; empty when the set is empty.
    fn set_random_members(&self, key: &str, count: usize) -> Result<Vec<String>, KvGraphError>;
    fn set_is_member(&self, key: &str, member: &str) -> Result<bool, KvGraphError>;
    fn set_cardinality(&self, key: &str) -> Result<usize, KvGraphError>;
    fn set_union(&self, keys: &[&str]) -> Result<Vec<String>, KvGraphError>;
    fn set_diff(&self, keys: &[&str]) -> Result<Vec<String>, KvGraphError>;
    fn set_intersect(&self, keys: &[&str]) -> Result<Vec<String>, KvGraphError>;

    fn zset_add(&self, key: &str, score: f64, member: &str) -> Result<bool, KvGraphError>;
    fn zset_remove(&self, key: &str, member: &str) -> Result<bool, KvGraphError>;
    /// Members ordered by score descending, inclusive `start..=stop`, negative indexes from the end.
    fn zset_reverse_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, KvGraphError>;
    fn zset_reverse_rank(&self, key: &str, member: &str) -> Result<Option<usize>, KvGraphError>;
    fn zset_score(&self, key: &str, member: &str) -> Result<Option<f64>, KvGraphError>;
    fn zset_increment(&self, key: &str, member: &str, by: f64) -> Result<f64, KvGraphError>;
    fn zset_cardinality(&self, key: &str) -> Result<usize, KvGraphError>;

    /// Applies every command or none of them.
    fn multi(&self, commands: &[Command]) -> Result<(), KvGraphError>;

    /// Best-effort single round trip. Sharded backends may refuse with
    /// [`KvGraphError::CannotCombineKeys`]; callers retry the reads one by one.
    fn pipelined(&self, reads: &[Read]) -> Result<Vec<Reply>, KvGraphError> {
        reads.iter().map(|read| self.read(read)).collect()
    }

    /// Executes a single read outside of any batch.
    fn read(&self, read: &Read) -> Result<Reply, KvGraphError> {
        match read {
            Read::HashGetAll { key } => Ok(Reply::Hash(self.hash_get_all(key)?)),
            Read::HashGetFields { key, fields } => {
                Ok(Reply::Fields(self.hash_get_fields(key, fields)?))
            }
        }
    }

    fn flush(&self) -> Result<(), KvGraphError>;
}

impl<'a, S> KeyValueStore for &'a S
where
    S: KeyValueStore + ?Sized,
{
    fn get(&self, key: &str) -> Result<Option<String>, KvGraphError> {
        (*self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), KvGraphError> {
        (*self).set(key, value)
    }

    fn delete(&self, key: &str) -> Result<bool, KvGraphError> {
        (*self).delete(key)
    }

    fn exists(&self, key: &str) -> Result<bool, KvGraphError> {
        (*self).exists(key)
    }

    fn hash_get_all(&self, key: &str) -> Result<Attributes, KvGraphError> {
        (*self).hash_get_all(key)
    }

    fn hash_get_fields(
        &self,
        key: &str,
        fields: &[String],
    ) -> Result<Vec<Option<String>>, KvGraphError> {
        (*self).hash_get_fields(key, fields)
    }

    fn hash_set_fields(&self, key: &str, fields: &Attributes) -> Result<(), KvGraphError> {
        (*self).hash_set_fields(key, fields)
    }

    fn hash_increment(&self, key: &str, field: &str, by: i64) -> Result<i64, KvGraphError> {
        (*self).hash_increment(key, field, by)
    }

    fn set_add(&self, key: &str, member: &str) -> Result<bool, KvGraphError> {
        (*self).set_add(key, member)
    }

    fn set_remove(&self, key: &str, member: &str) -> Result<bool, KvGraphError> {
        (*self).set_remove(key, member)
    }

    fn set_members(&self, key: &str) -> Result<Vec<String>, KvGraphError> {
        (*self).set_members(key)
    }

    fn set_random_members(&self, key: &str, count: usize) -> Result<Vec<String>, KvGraphError> {
        (*self).set_random_members(key, count)
    }

    fn set_is_member(&self, key: &str, member: &str) -> Result<bool, KvGraphError> {
        (*self).set_is_member(key, member)
    }

    fn set_cardinality(&self, key: &str) -> Result<usize, KvGraphError> {
        (*self).set_cardinality(key)
    }

    fn set_union(&self, keys: &[&str]) -> Result<Vec<String>, KvGraphError> {
        (*self).set_union(keys)
    }

    fn set_diff(&self, keys: &[&str]) -> Result<Vec<String>, KvGraphError> {
        (*self).set_diff(keys)
    }

    fn set_intersect(&self, keys: &[&str]) -> Result<Vec<String>, KvGraphError> {
        (*self).set_intersect(keys)
    }

    fn zset_add(&self, key: &str, score: f64, member: &str) -> Result<bool, KvGraphError> {
        (*self).zset_add(key, score, member)
    }

    fn zset_remove(&self, key: &str, member: &str) -> Result<bool, KvGraphError> {
        (*self).zset_remove(key, member)
    }

    fn zset_reverse_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, KvGraphError> {
        (*self).zset_reverse_range(key, start, stop)
    }

    fn zset_reverse_rank(&self, key: &str, member: &str) -> Result<Option<usize>, KvGraphError> {
        (*self).zset_reverse_rank(key, member)
    }

    fn zset_score(&self, key: &str, member: &str) -> Result<Option<f64>, KvGraphError> {
        (*self).zset_score(key, member)
    }

    fn zset_increment(&self, key: &str, member: &str, by: f64) -> Result<f64, KvGraphError> {
        (*self).zset_increment(key, member, by)
    }

    fn zset_cardinality(&self, key: &str) -> Result<usize, KvGraphError> {
        (*self).zset_cardinality(key)
    }

    fn multi(&self, commands: &[Command]) -> Result<(), KvGraphError> {
        (*self).multi(commands)
    }

    fn pipelined(&self, reads: &[Read]) -> Result<Vec<Reply>, KvGraphError> {
        (*self).pipelined(reads)
    }

    fn read(&self, read: &Read) -> Result<Reply, KvGraphError> {
        (*self).read(read)
    }

    fn flush(&self) -> Result<(), KvGraphError> {
        (*self).flush()
    }
}

impl<S> KeyValueStore for Box<S>
where
    S: KeyValueStore + ?Sized,
{
    fn get(&self, key: &str) -> Result<Option<String>, KvGraphError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), KvGraphError> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &str) -> Result<bool, KvGraphError> {
        (**self).delete(key)
    }

    fn exists(&self, key: &str) -> Result<bool, KvGraphError> {
        (**self).exists(key)
    }

    fn hash_get_all(&self, key: &str) -> Result<Attributes, KvGraphError> {
        (**self).hash_get_all(key)
    }

    fn hash_get_fields(
        &self,
        key: &str,
        fields: &[String],
    ) -> Result<Vec<Option<String>>, KvGraphError> {
        (**self).hash_get_fields(key, fields)
    }

    fn hash_set_fields(&self, key: &str, fields: &Attributes) -> Result<(), KvGraphError> {
        (**self).hash_set_fields(key, fields)
    }

    fn hash_increment(&self, key: &str, field: &str, by: i64) -> Result<i64, KvGraphError> {
        (**self).hash_increment(key, field, by)
    }

    fn set_add(&self, key: &str, member: &str) -> Result<bool, KvGraphError> {
        (**self).set_add(key, member)
    }

    fn set_remove(&self, key: &str, member: &str) -> Result<bool, KvGraphError> {
        (**self).set_remove(key, member)
    }

    fn set_members(&self, key: &str) -> Result<Vec<String>, KvGraphError> {
        (**self).set_members(key)
    }

    fn set_random_members(&self, key: &str, count: usize) -> Result<Vec<String>, KvGraphError> {
        (**self).set_random_members(key, count)
    }

    fn set_is_member(&self, key: &str, member: &str) -> Result<bool, KvGraphError> {
        (**self).set_is_member(key, member)
    }

    fn set_cardinality(&self, key: &str) -> Result<usize, KvGraphError> {
        (**self).set_cardinality(key)
    }

    fn set_union(&self, keys: &[&str]) -> Result<Vec<String>, KvGraphError> {
        (**self).set_union(keys)
    }

    fn set_diff(&self, keys: &[&str]) -> Result<Vec<String>, KvGraphError> {
        (**self).set_diff(keys)
    }

    fn set_intersect(&self, keys: &[&str]) -> Result<Vec<String>, KvGraphError> {
        (**self).set_intersect(keys)
    }

    fn zset_add(&self, key: &str, score: f64, member: &str) -> Result<bool, KvGraphError> {
        (**self).zset_add(key, score, member)
    }

    fn zset_remove(&self, key: &str, member: &str) -> Result<bool, KvGraphError> {
        (**self).zset_remove(key, member)
    }

    fn zset_reverse_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, KvGraphError> {
        (**self).zset_reverse_range(key, start, stop)
    }

    fn zset_reverse_rank(&self, key: &str, member: &str) -> Result<Option<usize>, KvGraphError> {
        (**self).zset_reverse_rank(key, member)
    }

    fn zset_score(&self, key: &str, member: &str) -> Result<Option<f64>, KvGraphError> {
        (**self).zset_score(key, member)
    }

    fn zset_increment(&self, key: &str, member: &str, by: f64) -> Result<f64, KvGraphError> {
        (**self).zset_increment(key, member, by)
    }

    fn zset_cardinality(&self, key: &str) -> Result<usize, KvGraphError> {
        (**self).zset_cardinality(key)
    }

    fn multi(&self, commands: &[Command]) -> Result<(), KvGraphError> {
        (**self).multi(commands)
    }

    fn pipelined(&self, reads: &[Read]) -> Result<Vec<Reply>, KvGraphError> {
        (**self).pipelined(reads)
    }

    fn read(&self, read: &Read) -> Result<Reply, KvGraphError> {
        (**self).read(read)
    }

    fn flush(&self) -> Result<(), KvGraphError> {
        (**self).flush()
    }
}

/// Resolves an inclusive `start..=stop` range with negative indexes counted from the end.
/// Returns `None` when the window is empty.
pub(crate) fn normalize_range(start: isize, stop: isize, len: usize) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len || stop < 0 {
        return None;
    }
    Some((start as usize, stop as usize))
}

/// Draws `count` members with replacement.
pub(crate) fn sample_with_replacement(members: &[String], count: usize) -> Vec<String> {
    if members.is_empty() {
        return Vec::new();
    }
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| members[rng.gen_range(0..members.len())].clone())
        .collect()
}

/// `current + by` for hash increments; overflow is reported instead of wrapping.
pub(crate) fn checked_increment(current: i64, by: i64) -> Result<i64, KvGraphError> {
    current
        .checked_add(by)
        .ok_or_else(|| KvGraphError::store("increment or decrement would overflow"))
}

/// Compares two `(score, member)` entries in reverse sorted-set order.
pub(crate) fn reverse_order(a: &(f64, &str), b: &(f64, &str)) -> std::cmp::Ordering {
    b.0.total_cmp(&a.0).then_with(|| b.1.cmp(a.1))
}
