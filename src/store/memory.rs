use std::collections::{BTreeMap, BTreeSet};
use std::hash::BuildHasher;

use ahash::{AHashMap, RandomState};
use parking_lot::RwLock;

use crate::{errors::KvGraphError, types::Attributes};

use super::{
    Command, KeyValueStore, Read, Reply, checked_increment, normalize_range, reverse_order,
    sample_with_replacement,
};

const SHARD_SEEDS: (u64, u64, u64, u64) = (0x6b76, 0x6772, 0x6170, 0x6873);

#[derive(Clone, Debug)]
enum Value {
    Scalar(String),
    Hash(BTreeMap<String, String>),
    Set(BTreeSet<String>),
    SortedSet(AHashMap<String, f64>),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Scalar(_) => "string",
            Value::Hash(_) => "hash",
            Value::Set(_) => "set",
            Value::SortedSet(_) => "zset",
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Value::Scalar(_) => false,
            Value::Hash(map) => map.is_empty(),
            Value::Set(set) => set.is_empty(),
            Value::SortedSet(zset) => zset.is_empty(),
        }
    }
}

/// In-process store holding every key in one map.
///
/// With more than one shard, keys are spread over shards by a fixed-seed hash and multi-key
/// operations spanning shards fail with [`KvGraphError::CannotCombineKeys`], the way a
/// distributed deployment refuses them.
pub struct MemoryStore {
    data: RwLock<AHashMap<String, Value>>,
    shards: usize,
    hasher: RandomState,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::sharded(1)
    }

    pub fn sharded(shards: usize) -> Self {
        let (k0, k1, k2, k3) = SHARD_SEEDS;
        Self {
            data: RwLock::new(AHashMap::new()),
            shards: shards.max(1),
            hasher: RandomState::with_seeds(k0, k1, k2, k3),
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards
    }

    pub fn shard_of(&self, key: &str) -> usize {
        if self.shards == 1 {
            return 0;
        }
        (self.hasher.hash_one(key) % self.shards as u64) as usize
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.data.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn ensure_same_shard<'k>(
        &self,
        keys: impl IntoIterator<Item = &'k str>,
    ) -> Result<(), KvGraphError> {
        let mut shard = None;
        for key in keys {
            let current = self.shard_of(key);
            match shard {
                None => shard = Some(current),
                Some(first) if first != current => {
                    return Err(KvGraphError::cannot_combine(format!(
                        "keys span shards {first} and {current}"
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    fn with_set<T>(
        &self,
        key: &str,
        f: impl FnOnce(Option<&BTreeSet<String>>) -> T,
    ) -> Result<T, KvGraphError> {
        let data = self.data.read();
        match data.get(key) {
            None => Ok(f(None)),
            Some(Value::Set(set)) => Ok(f(Some(set))),
            Some(other) => Err(wrong_type(key, "set", other)),
        }
    }

    fn with_zset<T>(
        &self,
        key: &str,
        f: impl FnOnce(Option<&AHashMap<String, f64>>) -> T,
    ) -> Result<T, KvGraphError> {
        let data = self.data.read();
        match data.get(key) {
            None => Ok(f(None)),
            Some(Value::SortedSet(zset)) => Ok(f(Some(zset))),
            Some(other) => Err(wrong_type(key, "zset", other)),
        }
    }

    fn collect_sets(&self, keys: &[&str]) -> Result<Vec<BTreeSet<String>>, KvGraphError> {
        self.ensure_same_shard(keys.iter().copied())?;
        keys.iter()
            .map(|key| self.with_set(key, |set| set.cloned().unwrap_or_default()))
            .collect()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, KvGraphError> {
        match self.data.read().get(key) {
            None => Ok(None),
            Some(Value::Scalar(value)) => Ok(Some(value.clone())),
            Some(other) => Err(wrong_type(key, "string", other)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), KvGraphError> {
        self.multi(&[Command::Set {
            key: key.to_string(),
            value: value.to_string(),
        }])
    }

    fn delete(&self, key: &str) -> Result<bool, KvGraphError> {
        Ok(self.data.write().remove(key).is_some())
    }

    fn exists(&self, key: &str) -> Result<bool, KvGraphError> {
        Ok(self.data.read().contains_key(key))
    }

    fn hash_get_all(&self, key: &str) -> Result<Attributes, KvGraphError> {
        match self.data.read().get(key) {
            None => Ok(Attributes::new()),
            Some(Value::Hash(map)) => Ok(map.clone()),
            Some(other) => Err(wrong_type(key, "hash", other)),
        }
    }

    fn hash_get_fields(
        &self,
        key: &str,
        fields: &[String],
    ) -> Result<Vec<Option<String>>, KvGraphError> {
        match self.data.read().get(key) {
            None => Ok(vec![None; fields.len()]),
            Some(Value::Hash(map)) => Ok(fields.iter().map(|f| map.get(f).cloned()).collect()),
            Some(other) => Err(wrong_type(key, "hash", other)),
        }
    }

    fn hash_set_fields(&self, key: &str, fields: &Attributes) -> Result<(), KvGraphError> {
        self.multi(&[Command::HashSet {
            key: key.to_string(),
            fields: fields.clone(),
        }])
    }

    fn hash_increment(&self, key: &str, field: &str, by: i64) -> Result<i64, KvGraphError> {
        let mut data = self.data.write();
        let entry = data
            .entry(key.to_string())
            .or_insert_with(|| Value::Hash(BTreeMap::new()));
        let map = match entry {
            Value::Hash(map) => map,
            other => return Err(wrong_type(key, "hash", other)),
        };
        let current = match map.get(field) {
            Some(raw) => parse_integer(raw)?,
            None => 0,
        };
        let next = checked_increment(current, by)?;
        map.insert(field.to_string(), next.to_string());
        Ok(next)
    }

    fn set_add(&self, key: &str, member: &str) -> Result<bool, KvGraphError> {
        let mut data = self.data.write();
        let entry = data
            .entry(key.to_string())
            .or_insert_with(|| Value::Set(BTreeSet::new()));
        match entry {
            Value::Set(set) => Ok(set.insert(member.to_string())),
            other => Err(wrong_type(key, "set", other)),
        }
    }

    fn set_remove(&self, key: &str, member: &str) -> Result<bool, KvGraphError> {
        let mut data = self.data.write();
        let removed = match data.get_mut(key) {
            None => return Ok(false),
            Some(Value::Set(set)) => set.remove(member),
            Some(other) => return Err(wrong_type(key, "set", other)),
        };
        drop_if_empty(&mut data, key);
        Ok(removed)
    }

    fn set_members(&self, key: &str) -> Result<Vec<String>, KvGraphError> {
        self.with_set(key, |set| {
            set.map(|s| s.iter().cloned().collect())
                .unwrap_or_default()
        })
    }

    fn set_random_members(&self, key: &str, count: usize) -> Result<Vec<String>, KvGraphError> {
        let members = self.set_members(key)?;
        Ok(sample_with_replacement(&members, count))
    }

    fn set_is_member(&self, key: &str, member: &str) -> Result<bool, KvGraphError> {
        self.with_set(key, |set| set.is_some_and(|s| s.contains(member)))
    }

    fn set_cardinality(&self, key: &str) -> Result<usize, KvGraphError> {
        self.with_set(key, |set| set.map_or(0, |s| s.len()))
    }

    fn set_union(&self, keys: &[&str]) -> Result<Vec<String>, KvGraphError> {
        let sets = self.collect_sets(keys)?;
        let mut result = BTreeSet::new();
        for set in sets {
            result.extend(set);
        }
        Ok(result.into_iter().collect())
    }

    fn set_diff(&self, keys: &[&str]) -> Result<Vec<String>, KvGraphError> {
        let mut sets = self.collect_sets(keys)?.into_iter();
        let Some(mut result) = sets.next() else {
            return Ok(Vec::new());
        };
        for set in sets {
            result.retain(|member| !set.contains(member));
        }
        Ok(result.into_iter().collect())
    }

    fn set_intersect(&self, keys: &[&str]) -> Result<Vec<String>, KvGraphError> {
        let mut sets = self.collect_sets(keys)?.into_iter();
        let Some(mut result) = sets.next() else {
            return Ok(Vec::new());
        };
        for set in sets {
            result.retain(|member| set.contains(member));
        }
        Ok(result.into_iter().collect())
    }

    fn zset_add(&self, key: &str, score: f64, member: &str) -> Result<bool, KvGraphError> {
        let mut data = self.data.write();
        let entry = data
            .entry(key.to_string())
            .or_insert_with(|| Value::SortedSet(AHashMap::new()));
        match entry {
            Value::SortedSet(zset) => Ok(zset.insert(member.to_string(), score).is_none()),
            other => Err(wrong_type(key, "zset", other)),
        }
    }

    fn zset_remove(&self, key: &str, member: &str) -> Result<bool, KvGraphError> {
        let mut data = self.data.write();
        let removed = match data.get_mut(key) {
            None => return Ok(false),
            Some(Value::SortedSet(zset)) => zset.remove(member).is_some(),
            Some(other) => return Err(wrong_type(key, "zset", other)),
        };
        drop_if_empty(&mut data, key);
        Ok(removed)
    }

    fn zset_reverse_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, KvGraphError> {
        self.with_zset(key, |zset| {
            let ordered = reverse_ordered(zset);
            match normalize_range(start, stop, ordered.len()) {
                Some((from, to)) => ordered[from..=to].to_vec(),
                None => Vec::new(),
            }
        })
    }

    fn zset_reverse_rank(&self, key: &str, member: &str) -> Result<Option<usize>, KvGraphError> {
        self.with_zset(key, |zset| {
            reverse_ordered(zset).iter().position(|m| m == member)
        })
    }

    fn zset_score(&self, key: &str, member: &str) -> Result<Option<f64>, KvGraphError> {
        self.with_zset(key, |zset| zset.and_then(|z| z.get(member).copied()))
    }

    fn zset_increment(&self, key: &str, member: &str, by: f64) -> Result<f64, KvGraphError> {
        let mut data = self.data.write();
        let entry = data
            .entry(key.to_string())
            .or_insert_with(|| Value::SortedSet(AHashMap::new()));
        match entry {
            Value::SortedSet(zset) => {
                let score = zset.entry(member.to_string()).or_insert(0.0);
                *score += by;
                Ok(*score)
            }
            other => Err(wrong_type(key, "zset", other)),
        }
    }

    fn zset_cardinality(&self, key: &str) -> Result<usize, KvGraphError> {
        self.with_zset(key, |zset| zset.map_or(0, |z| z.len()))
    }

    fn multi(&self, commands: &[Command]) -> Result<(), KvGraphError> {
        let mut data = self.data.write();
        // Type checks run before anything is touched so a failing batch leaves no trace.
        for command in commands {
            check_command_type(&data, command)?;
        }
        for command in commands {
            apply(&mut data, command);
        }
        Ok(())
    }

    fn pipelined(&self, reads: &[Read]) -> Result<Vec<Reply>, KvGraphError> {
        self.ensure_same_shard(reads.iter().map(Read::key))?;
        reads.iter().map(|read| self.read(read)).collect()
    }

    fn flush(&self) -> Result<(), KvGraphError> {
        self.data.write().clear();
        Ok(())
    }
}

fn reverse_ordered(zset: Option<&AHashMap<String, f64>>) -> Vec<String> {
    let Some(zset) = zset else {
        return Vec::new();
    };
    let mut entries: Vec<(f64, &str)> = zset.iter().map(|(m, s)| (*s, m.as_str())).collect();
    entries.sort_by(reverse_order);
    entries.into_iter().map(|(_, m)| m.to_string()).collect()
}

fn check_command_type(
    data: &AHashMap<String, Value>,
    command: &Command,
) -> Result<(), KvGraphError> {
    let expected = match command {
        Command::Delete { .. } | Command::Set { .. } => return Ok(()),
        Command::HashSet { .. } => "hash",
        Command::SetAdd { .. } | Command::SetRemove { .. } => "set",
        Command::ZAdd { .. } | Command::ZRemove { .. } => "zset",
    };
    match data.get(command.key()) {
        Some(value) if value.type_name() != expected => {
            Err(wrong_type(command.key(), expected, value))
        }
        _ => Ok(()),
    }
}

fn apply(data: &mut AHashMap<String, Value>, command: &Command) {
    match command {
        Command::Set { key, value } => {
            data.insert(key.clone(), Value::Scalar(value.clone()));
        }
        Command::Delete { key } => {
            data.remove(key);
        }
        Command::HashSet { key, fields } => {
            if let Value::Hash(map) = data
                .entry(key.clone())
                .or_insert_with(|| Value::Hash(BTreeMap::new()))
            {
                map.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            drop_if_empty(data, key);
        }
        Command::SetAdd { key, member } => {
            if let Value::Set(set) = data
                .entry(key.clone())
                .or_insert_with(|| Value::Set(BTreeSet::new()))
            {
                set.insert(member.clone());
            }
        }
        Command::SetRemove { key, member } => {
            if let Some(Value::Set(set)) = data.get_mut(key) {
                set.remove(member);
            }
            drop_if_empty(data, key);
        }
        Command::ZAdd { key, score, member } => {
            if let Value::SortedSet(zset) = data
                .entry(key.clone())
                .or_insert_with(|| Value::SortedSet(AHashMap::new()))
            {
                zset.insert(member.clone(), *score);
            }
        }
        Command::ZRemove { key, member } => {
            if let Some(Value::SortedSet(zset)) = data.get_mut(key) {
                zset.remove(member);
            }
            drop_if_empty(data, key);
        }
    }
}

fn drop_if_empty(data: &mut AHashMap<String, Value>, key: &str) {
    if data.get(key).is_some_and(Value::is_empty) {
        data.remove(key);
    }
}

fn wrong_type(key: &str, expected: &str, found: &Value) -> KvGraphError {
    KvGraphError::store(format!(
        "WRONGTYPE key {key} holds a {} value, expected {expected}",
        found.type_name()
    ))
}

fn parse_integer(raw: &str) -> Result<i64, KvGraphError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| KvGraphError::store(format!("hash value {raw:?} is not an integer")))
}
