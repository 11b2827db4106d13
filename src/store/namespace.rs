use crate::{errors::KvGraphError, types::Attributes};

use super::{Command, KeyValueStore, Read, Reply};

/// Prefixes every key with `{namespace}:` before handing it to the wrapped store, so several
/// graphs can share one backend.
pub struct Namespaced<S> {
    inner: S,
    prefix: String,
}

impl<S: KeyValueStore> Namespaced<S> {
    pub fn new(inner: S, namespace: &str) -> Self {
        Self {
            inner,
            prefix: format!("{namespace}:"),
        }
    }

    pub fn namespace(&self) -> &str {
        self.prefix.trim_end_matches(':')
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }

    fn keys(&self, keys: &[&str]) -> Vec<String> {
        keys.iter().map(|key| self.key(key)).collect()
    }
}

impl<S: KeyValueStore> KeyValueStore for Namespaced<S> {
    fn get(&self, key: &str) -> Result<Option<String>, KvGraphError> {
        self.inner.get(&self.key(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), KvGraphError> {
        self.inner.set(&self.key(key), value)
    }

    fn delete(&self, key: &str) -> Result<bool, KvGraphError> {
        self.inner.delete(&self.key(key))
    }

    fn exists(&self, key: &str) -> Result<bool, KvGraphError> {
        self.inner.exists(&self.key(key))
    }

    fn hash_get_all(&self, key: &str) -> Result<Attributes, KvGraphError> {
        self.inner.hash_get_all(&self.key(key))
    }

    fn hash_get_fields(
        &self,
        key: &str,
        fields: &[String],
    ) -> Result<Vec<Option<String>>, KvGraphError> {
        self.inner.hash_get_fields(&self.key(key), fields)
    }

    fn hash_set_fields(&self, key: &str, fields: &Attributes) -> Result<(), KvGraphError> {
        self.inner.hash_set_fields(&self.key(key), fields)
    }

    fn hash_increment(&self, key: &str, field: &str, by: i64) -> Result<i64, KvGraphError> {
        self.inner.hash_increment(&self.key(key), field, by)
    }

    fn set_add(&self, key: &str, member: &str) -> Result<bool, KvGraphError> {
        self.inner.set_add(&self.key(key), member)
    }

    fn set_remove(&self, key: &str, member: &str) -> Result<bool, KvGraphError> {
        self.inner.set_remove(&self.key(key), member)
    }

    fn set_members(&self, key: &str) -> Result<Vec<String>, KvGraphError> {
        self.inner.set_members(&self.key(key))
    }

    fn set_random_members(&self, key: &str, count: usize) -> Result<Vec<String>, KvGraphError> {
        self.inner.set_random_members(&self.key(key), count)
    }

    fn set_is_member(&self, key: &str, member: &str) -> Result<bool, KvGraphError> {
        self.inner.set_is_member(&self.key(key), member)
    }

    fn set_cardinality(&self, key: &str) -> Result<usize, KvGraphError> {
        self.inner.set_cardinality(&self.key(key))
    }

    fn set_union(&self, keys: &[&str]) -> Result<Vec<String>, KvGraphError> {
        let keys = self.keys(keys);
        self.inner
            .set_union(&keys.iter().map(String::as_str).collect::<Vec<_>>())
    }

    fn set_diff(&self, keys: &[&str]) -> Result<Vec<String>, KvGraphError> {
        let keys = self.keys(keys);
        self.inner
            .set_diff(&keys.iter().map(String::as_str).collect::<Vec<_>>())
    }

    fn set_intersect(&self, keys: &[&str]) -> Result<Vec<String>, KvGraphError> {
        let keys = self.keys(keys);
        self.inner
            .set_intersect(&keys.iter().map(String::as_str).collect::<Vec<_>>())
    }

    fn zset_add(&self, key: &str, score: f64, member: &str) -> Result<bool, KvGraphError> {
        self.inner.zset_add(&self.key(key), score, member)
    }

    fn zset_remove(&self, key: &str, member: &str) -> Result<bool, KvGraphError> {
        self.inner.zset_remove(&self.key(key), member)
    }

    fn zset_reverse_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, KvGraphError> {
        self.inner.zset_reverse_range(&self.key(key), start, stop)
    }

    fn zset_reverse_rank(&self, key: &str, member: &str) -> Result<Option<usize>, KvGraphError> {
        self.inner.zset_reverse_rank(&self.key(key), member)
    }

    fn zset_score(&self, key: &str, member: &str) -> Result<Option<f64>, KvGraphError> {
        self.inner.zset_score(&self.key(key), member)
    }

    fn zset_increment(&self, key: &str, member: &str, by: f64) -> Result<f64, KvGraphError> {
        self.inner.zset_increment(&self.key(key), member, by)
    }

    fn zset_cardinality(&self, key: &str) -> Result<usize, KvGraphError> {
        self.inner.zset_cardinality(&self.key(key))
    }

    fn multi(&self, commands: &[Command]) -> Result<(), KvGraphError> {
        let prefixed: Vec<Command> = commands
            .iter()
            .map(|command| command.with_key(self.key(command.key())))
            .collect();
        self.inner.multi(&prefixed)
    }

    fn pipelined(&self, reads: &[Read]) -> Result<Vec<Reply>, KvGraphError> {
        let prefixed: Vec<Read> = reads
            .iter()
            .map(|read| read.with_key(self.key(read.key())))
            .collect();
        self.inner.pipelined(&prefixed)
    }

    fn read(&self, read: &Read) -> Result<Reply, KvGraphError> {
        self.inner.read(&read.with_key(self.key(read.key())))
    }

    /// Flushes the whole backend, not only this namespace.
    fn flush(&self) -> Result<(), KvGraphError> {
        self.inner.flush()
    }
}
