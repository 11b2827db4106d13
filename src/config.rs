//! Store selection and engine options.
//!
//! A [`GraphConfig`] is built once at startup, either in code or from the environment, and
//! handed to [`open_graph`], which assembles the store (optionally sharded and namespaced) and
//! the [`Graph`] around it.
//!
//! ```rust
//! use kvgraph::{GraphConfig, open_graph};
//!
//! let mut cfg = GraphConfig::memory();
//! cfg.namespace = Some("social".to_string());
//! let graph = open_graph(&cfg)?;
//! # Ok::<(), kvgraph::KvGraphError>(())
//! ```

use std::{collections::HashMap, env, path::PathBuf};

use tracing::debug;

use crate::{
    errors::KvGraphError,
    graph::Graph,
    id::DEFAULT_ID_LENGTH,
    query::DEFAULT_DEPTH,
    store::{KeyValueStore, MemoryStore, Namespaced},
};

pub const DEFAULT_NAMESPACE: &str = "related";

pub const ENV_STORE: &str = "KVGRAPH_STORE";
pub const ENV_NAMESPACE: &str = "KVGRAPH_NAMESPACE";
pub const ENV_DEPTH: &str = "KVGRAPH_DEPTH";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StoreKind {
    /// In-process store; `shards > 1` simulates a sharded deployment.
    #[default]
    Memory,
    /// Durable store backed by SQLite (feature `sqlite-backend`).
    Sqlite,
}

/// Options for [`StoreKind::Sqlite`].
#[derive(Clone, Debug, Default)]
pub struct SqliteConfig {
    /// Database file; `None` opens an in-memory database.
    pub path: Option<PathBuf>,

    /// Prepared statement cache capacity.
    ///
    /// **Default:** `None` (the store's own default)
    pub cache_size: Option<usize>,

    /// Extra `PRAGMA` settings applied right after opening, e.g. `synchronous = FULL`.
    pub pragma_settings: HashMap<String, String>,
}

/// Complete configuration for [`open_graph`].
///
/// # Default Configuration
///
/// ```rust
/// use kvgraph::{GraphConfig, StoreKind};
/// let config = GraphConfig::default();
/// assert_eq!(config.store, StoreKind::Memory);
/// assert_eq!(config.shards, 1);
/// assert_eq!(config.default_depth, 4);
/// ```
#[derive(Clone, Debug)]
pub struct GraphConfig {
    pub store: StoreKind,

    /// Prefix for every key. `None` falls back to [`DEFAULT_NAMESPACE`]; an empty string
    /// disables prefixing.
    pub namespace: Option<String>,

    /// Simulated shard count for [`StoreKind::Memory`].
    pub shards: usize,

    /// Depth bound for path searches unless a query sets its own.
    pub default_depth: usize,

    /// Length of generated entity ids.
    pub id_length: usize,

    pub sqlite: SqliteConfig,
}

impl GraphConfig {
    pub fn new(store: StoreKind) -> Self {
        Self {
            store,
            namespace: None,
            shards: 1,
            default_depth: DEFAULT_DEPTH,
            id_length: DEFAULT_ID_LENGTH,
            sqlite: SqliteConfig::default(),
        }
    }

    pub fn memory() -> Self {
        Self::new(StoreKind::Memory)
    }

    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        let mut cfg = Self::new(StoreKind::Sqlite);
        cfg.sqlite.path = Some(path.into());
        cfg
    }

    /// Reads `KVGRAPH_STORE` (`memory`, `memory:<shards>`, `sqlite:<path>`, `sqlite::memory:`),
    /// `KVGRAPH_NAMESPACE` and `KVGRAPH_DEPTH`. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, KvGraphError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// [`GraphConfig::from_env`] over an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, KvGraphError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = match lookup(ENV_STORE) {
            Some(value) => Self::parse_store(value.trim())?,
            None => Self::default(),
        };
        if let Some(namespace) = lookup(ENV_NAMESPACE) {
            cfg.namespace = Some(namespace);
        }
        if let Some(depth) = lookup(ENV_DEPTH) {
            cfg.default_depth = depth.trim().parse().map_err(|_| {
                KvGraphError::invalid_input(format!("{ENV_DEPTH} must be a number, got {depth:?}"))
            })?;
        }
        Ok(cfg)
    }

    fn parse_store(value: &str) -> Result<Self, KvGraphError> {
        let (kind, rest) = match value.split_once(':') {
            Some((kind, rest)) => (kind, Some(rest)),
            None => (value, None),
        };
        match (kind, rest) {
            ("memory", None) => Ok(Self::memory()),
            ("memory", Some(shards)) => {
                let mut cfg = Self::memory();
                cfg.shards = shards.parse().map_err(|_| {
                    KvGraphError::invalid_input(format!("invalid shard count {shards:?}"))
                })?;
                Ok(cfg)
            }
            ("sqlite", Some(":memory:")) => Ok(Self::new(StoreKind::Sqlite)),
            ("sqlite", Some(path)) if !path.is_empty() => Ok(Self::sqlite(path)),
            _ => Err(KvGraphError::invalid_input(format!(
                "{ENV_STORE} must be memory, memory:<shards> or sqlite:<path>, got {value:?}"
            ))),
        }
    }

    pub fn effective_namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self::new(StoreKind::Memory)
    }
}

/// Opens the configured store and wraps it in a [`Graph`].
pub fn open_graph(cfg: &GraphConfig) -> Result<Graph<Box<dyn KeyValueStore>>, KvGraphError> {
    if cfg.shards == 0 {
        return Err(KvGraphError::invalid_input("shards must be at least 1"));
    }
    let store: Box<dyn KeyValueStore> = match cfg.store {
        StoreKind::Memory => Box::new(MemoryStore::sharded(cfg.shards)),
        StoreKind::Sqlite => open_sqlite(&cfg.sqlite)?,
    };
    let namespace = cfg.effective_namespace();
    let store: Box<dyn KeyValueStore> = if namespace.is_empty() {
        store
    } else {
        Box::new(Namespaced::new(store, namespace))
    };
    debug!(
        target: "kvgraph::store",
        kind = ?cfg.store,
        namespace,
        shards = cfg.shards,
        "graph opened"
    );
    Ok(Graph::with_config(store, cfg.clone()))
}

#[cfg(feature = "sqlite-backend")]
fn open_sqlite(cfg: &SqliteConfig) -> Result<Box<dyn KeyValueStore>, KvGraphError> {
    use crate::store::SqliteStore;

    let store = match &cfg.path {
        Some(path) => SqliteStore::open(path)?,
        None => SqliteStore::open_in_memory()?,
    };
    if let Some(size) = cfg.cache_size {
        store.set_statement_cache_capacity(size);
    }
    for (key, value) in &cfg.pragma_settings {
        store.apply_pragma(key, value)?;
    }
    Ok(Box::new(store))
}

#[cfg(not(feature = "sqlite-backend"))]
fn open_sqlite(_cfg: &SqliteConfig) -> Result<Box<dyn KeyValueStore>, KvGraphError> {
    Err(KvGraphError::invalid_input(
        "sqlite store requested but the sqlite-backend feature is disabled",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn environment_selects_sharded_memory_store() {
        let cfg = GraphConfig::from_lookup(lookup(&[
            (ENV_STORE, "memory:4"),
            (ENV_NAMESPACE, "social"),
            (ENV_DEPTH, "6"),
        ]))
        .expect("config");
        assert_eq!(cfg.store, StoreKind::Memory);
        assert_eq!(cfg.shards, 4);
        assert_eq!(cfg.effective_namespace(), "social");
        assert_eq!(cfg.default_depth, 6);
    }

    #[test]
    fn environment_selects_sqlite_path() {
        let cfg = GraphConfig::from_lookup(lookup(&[(ENV_STORE, "sqlite:/tmp/graph.db")]))
            .expect("config");
        assert_eq!(cfg.store, StoreKind::Sqlite);
        assert_eq!(cfg.sqlite.path, Some(PathBuf::from("/tmp/graph.db")));
        assert_eq!(cfg.effective_namespace(), DEFAULT_NAMESPACE);
    }

    #[test]
    fn malformed_store_spec_is_rejected() {
        let err = GraphConfig::from_lookup(lookup(&[(ENV_STORE, "redis://localhost")]))
            .expect_err("unsupported");
        assert!(matches!(err, KvGraphError::InvalidInput(_)));
    }
}
