//! Declarative post-write workflows.
//!
//! A [`Flow`] is an ordered tree of step names; a step's outputs feed its sub-flow. Flows are
//! registered by name (relationship writes use their label) and dispatched either onto a
//! [`FlowQueue`] or, without one, executed in-process after a JSON round trip of both the flow
//! and the payload.

use std::{collections::BTreeMap, collections::VecDeque, sync::Arc};

use ahash::AHashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::debug;

use crate::errors::KvGraphError;

/// Step names mapped to the sub-flow run on each of their outputs (`None` ends the branch).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Flow {
    steps: Vec<(String, Option<Flow>)>,
}

impl Flow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a step whose outputs are dropped.
    pub fn terminal(mut self, step: impl Into<String>) -> Self {
        self.steps.push((step.into(), None));
        self
    }

    /// Adds a step whose outputs each run `next`.
    pub fn step(mut self, step: impl Into<String>, next: Flow) -> Self {
        self.steps.push((step.into(), Some(next)));
        self
    }

    pub fn steps(&self) -> &[(String, Option<Flow>)] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// A processing unit. It may emit zero or more outputs.
pub trait Step: Send + Sync {
    fn perform(&self, data: Value, emit: &mut dyn FnMut(Value)) -> Result<(), KvGraphError>;
}

impl<F> Step for F
where
    F: Fn(Value, &mut dyn FnMut(Value)) -> Result<(), KvGraphError> + Send + Sync,
{
    fn perform(&self, data: Value, emit: &mut dyn FnMut(Value)) -> Result<(), KvGraphError> {
        self(data, emit)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlowJob {
    pub flow: Flow,
    pub data: Value,
}

pub trait FlowQueue: Send + Sync {
    fn push(&self, job: &FlowJob) -> Result<(), KvGraphError>;
    fn pop(&self) -> Result<Option<FlowJob>, KvGraphError>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process queue holding jobs in their serialized form.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    jobs: Mutex<VecDeque<String>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FlowQueue for MemoryQueue {
    fn push(&self, job: &FlowJob) -> Result<(), KvGraphError> {
        let encoded =
            serde_json::to_string(job).map_err(|e| KvGraphError::data_flow(e.to_string()))?;
        self.jobs.lock().push_back(encoded);
        Ok(())
    }

    fn pop(&self) -> Result<Option<FlowJob>, KvGraphError> {
        let Some(encoded) = self.jobs.lock().pop_front() else {
            return Ok(None);
        };
        serde_json::from_str(&encoded)
            .map(Some)
            .map_err(|e| KvGraphError::data_flow(e.to_string()))
    }

    fn len(&self) -> usize {
        self.jobs.lock().len()
    }
}

/// Registry of steps and named flows, plus the dispatcher.
#[derive(Default)]
pub struct DataFlows {
    steps: AHashMap<String, Arc<dyn Step>>,
    flows: BTreeMap<String, Vec<Flow>>,
    queue: Option<Arc<dyn FlowQueue>>,
}

impl DataFlows {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatches through `queue`; jobs run when [`DataFlows::drain`] is called.
    pub fn with_queue<Q: FlowQueue + 'static>(queue: Arc<Q>) -> Self {
        Self {
            queue: Some(queue),
            ..Self::default()
        }
    }

    pub fn register_step<T: Step + 'static>(&mut self, name: impl Into<String>, step: T) {
        self.steps.insert(name.into(), Arc::new(step));
    }

    /// Adds `flow` under `name`. Several flows may share a name; all of them run.
    pub fn data_flow(&mut self, name: impl Into<String>, flow: Flow) {
        self.flows.entry(name.into()).or_default().push(flow);
    }

    pub fn flows(&self) -> &BTreeMap<String, Vec<Flow>> {
        &self.flows
    }

    pub fn flows_named(&self, name: &str) -> &[Flow] {
        self.flows.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Forgets every registered flow; steps stay registered.
    pub fn clear(&mut self) {
        self.flows.clear();
    }

    /// Dispatches every flow registered under `name`. Unknown names are a no-op.
    pub fn execute_named(&self, name: &str, data: &Value) -> Result<(), KvGraphError> {
        for flow in self.flows_named(name) {
            self.execute_flow(flow, data)?;
        }
        Ok(())
    }

    pub fn execute_flow(&self, flow: &Flow, data: &Value) -> Result<(), KvGraphError> {
        match &self.queue {
            Some(queue) => {
                debug!(target: "kvgraph::flow", steps = flow.steps.len(), "flow enqueued");
                queue.push(&FlowJob {
                    flow: flow.clone(),
                    data: data.clone(),
                })
            }
            None => {
                let job = FlowJob {
                    flow: round_trip(flow)?,
                    data: round_trip(data)?,
                };
                self.perform(job)
            }
        }
    }

    /// Runs one job: each step in order, each output of a step dispatched to its sub-flow.
    pub fn perform(&self, job: FlowJob) -> Result<(), KvGraphError> {
        for (name, next) in job.flow.steps {
            let step = self
                .steps
                .get(&name)
                .ok_or_else(|| KvGraphError::data_flow(format!("unknown step {name}")))?;
            let mut outputs = Vec::new();
            step.perform(job.data.clone(), &mut |output| outputs.push(output))?;
            debug!(
                target: "kvgraph::flow",
                step = %name,
                outputs = outputs.len(),
                "step performed"
            );
            if let Some(next) = next {
                for output in &outputs {
                    self.execute_flow(&next, output)?;
                }
            }
        }
        Ok(())
    }

    /// Runs queued jobs until the queue is empty; returns how many ran.
    pub fn drain(&self) -> Result<usize, KvGraphError> {
        let Some(queue) = &self.queue else {
            return Ok(0);
        };
        let mut performed = 0;
        while let Some(job) = queue.pop()? {
            self.perform(job)?;
            performed += 1;
        }
        Ok(performed)
    }

    pub fn queue(&self) -> Option<&Arc<dyn FlowQueue>> {
        self.queue.as_ref()
    }
}

fn round_trip<T: Serialize + DeserializeOwned>(value: &T) -> Result<T, KvGraphError> {
    let encoded =
        serde_json::to_string(value).map_err(|e| KvGraphError::data_flow(e.to_string()))?;
    serde_json::from_str(&encoded).map_err(|e| KvGraphError::data_flow(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flow_tree_serializes_as_ordered_pairs() {
        let flow = Flow::new().step("one", Flow::new().terminal("two"));
        let json = serde_json::to_value(&flow).expect("serialize");
        assert_eq!(json, serde_json::json!([["one", [["two", null]]]]));
        assert_eq!(round_trip(&flow).expect("round trip"), flow);
    }

    #[test]
    fn unknown_step_is_reported() {
        let flows = DataFlows::new();
        let err = flows
            .execute_flow(&Flow::new().terminal("missing"), &Value::Null)
            .expect_err("unknown step");
        assert!(matches!(err, KvGraphError::DataFlowError(_)));
    }
}
