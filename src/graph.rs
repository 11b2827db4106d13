use std::sync::Arc;

use ahash::AHashMap;
use chrono::{DateTime, Utc};

use crate::{
    clock::{Clock, SystemClock, score_for},
    config::GraphConfig,
    flow::DataFlows,
    id::{IdGenerator, RandomIdGenerator},
    node::NodeRef,
    query::Query,
    relationship::{Relationship, Weigher},
    store::KeyValueStore,
    types::Direction,
};

/// Composition root: the store plus everything the engine needs around it. Built once at
/// startup and passed by reference to every operation.
pub struct Graph<S> {
    store: S,
    config: GraphConfig,
    ids: Box<dyn IdGenerator>,
    clock: Box<dyn Clock>,
    weighers: AHashMap<String, Arc<dyn Weigher>>,
    flows: DataFlows,
}

impl<S: KeyValueStore> Graph<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, GraphConfig::default())
    }

    pub fn with_config(store: S, config: GraphConfig) -> Self {
        let ids = RandomIdGenerator::new(config.id_length);
        Self {
            store,
            config,
            ids: Box::new(ids),
            clock: Box::new(SystemClock),
            weighers: AHashMap::new(),
            flows: DataFlows::new(),
        }
    }

    pub fn with_id_generator<G: IdGenerator + 'static>(mut self, ids: G) -> Self {
        self.ids = Box::new(ids);
        self
    }

    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_flows(mut self, flows: DataFlows) -> Self {
        self.flows = flows;
        self
    }

    /// Scores relationships of `label` with `weigher` instead of their creation time.
    pub fn register_weight<W: Weigher + 'static>(&mut self, label: impl Into<String>, weigher: W) {
        self.weighers.insert(label.into(), Arc::new(weigher));
    }

    pub fn has_custom_weight(&self, label: &str) -> bool {
        self.weighers.contains_key(label)
    }

    /// Score of `relationship` in its `direction` edge index for a write happening `at`.
    pub fn weight_for(
        &self,
        relationship: &Relationship,
        direction: Direction,
        at: DateTime<Utc>,
    ) -> f64 {
        match self.weighers.get(relationship.label()) {
            Some(weigher) => weigher.weight(relationship, direction),
            None => score_for(at),
        }
    }

    /// Starts a query from any node reference.
    pub fn query<N: NodeRef + ?Sized>(&self, source: &N) -> Query<'_, S> {
        Query::new(self, source.node_id())
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn flows(&self) -> &DataFlows {
        &self.flows
    }

    pub fn flows_mut(&mut self) -> &mut DataFlows {
        &mut self.flows
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub(crate) fn id_generator(&self) -> &dyn IdGenerator {
        self.ids.as_ref()
    }

    pub fn into_store(self) -> S {
        self.store
    }
}
