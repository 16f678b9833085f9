use crate::events::EventEmitter;
use crate::graph::{ExecutionGraph, NodeId};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub type ExecutionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Idle,
    Running,
    Success,
    Error,
}

/// What happened to one node within a run. Created lazily as `Idle` on
/// first read; transitions only forward except through an explicit reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeState {
    pub status: NodeStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Default for NodeState {
    fn default() -> Self {
        Self {
            status: NodeStatus::Idle,
            result: None,
            error: None,
            updated_at: Utc::now(),
        }
    }
}

/// Group-iteration bookkeeping attached to a derived context.
#[derive(Debug, Clone)]
pub struct IterationScope {
    pub index: usize,
    pub total: usize,
    pub group_id: NodeId,
}

/// One retained log line. `log` also forwards to `tracing`.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub node_id: Option<NodeId>,
    pub message: String,
}

/// A parent's settlement delivered to a join-wait target.
#[derive(Debug, Clone)]
pub enum ParentDelivery {
    Success(Value),
    Failed,
}

/// Progress of a join-wait target after a delivery.
#[derive(Debug)]
pub enum JoinOutcome {
    /// Not every parent has settled yet.
    Pending,
    /// All parents settled successfully; inputs ordered by edge insertion.
    Ready(Vec<Value>),
    /// All parents settled but at least one failed; the target stays idle.
    Blocked,
}

/// Per-run shared-mutable state: the single source of truth for "what
/// happened" in one triggered execution. Owned by exactly one scheduler
/// run; group iterations get derived contexts with isolated state maps.
#[derive(Debug)]
pub struct ExecutionContext {
    pub execution_id: ExecutionId,
    pub trigger_node_id: Option<NodeId>,
    pub iteration: Option<IterationScope>,
    graph: Arc<ExecutionGraph>,
    states: RwLock<HashMap<NodeId, NodeState>>,
    joins: Mutex<HashMap<NodeId, HashMap<NodeId, ParentDelivery>>>,
    claimed: Mutex<HashSet<NodeId>>,
    logs: Mutex<Vec<LogEntry>>,
    events: EventEmitter,
    cancellation: CancellationToken,
}

impl ExecutionContext {
    pub fn new(
        graph: Arc<ExecutionGraph>,
        trigger_node_id: Option<NodeId>,
        events: EventEmitter,
    ) -> Self {
        Self {
            execution_id: events.execution_id(),
            trigger_node_id,
            iteration: None,
            graph,
            states: RwLock::new(HashMap::new()),
            joins: Mutex::new(HashMap::new()),
            claimed: Mutex::new(HashSet::new()),
            logs: Mutex::new(Vec::new()),
            events,
            cancellation: CancellationToken::new(),
        }
    }

    /// Derive an isolated context for one group iteration: same graph and
    /// event stream, fresh state/join/claim maps, child cancellation.
    pub fn child_for_iteration(&self, scope: IterationScope) -> Self {
        Self {
            execution_id: self.execution_id,
            trigger_node_id: self.trigger_node_id.clone(),
            iteration: Some(scope),
            graph: Arc::clone(&self.graph),
            states: RwLock::new(HashMap::new()),
            joins: Mutex::new(HashMap::new()),
            claimed: Mutex::new(HashSet::new()),
            logs: Mutex::new(Vec::new()),
            events: self.events.clone(),
            cancellation: self.cancellation.child_token(),
        }
    }

    pub fn graph(&self) -> &Arc<ExecutionGraph> {
        &self.graph
    }

    // ---- status transitions -------------------------------------------------

    pub fn mark_running(&self, id: &str) {
        self.update(id, |state| {
            state.status = NodeStatus::Running;
            state.error = None;
        });
    }

    pub fn mark_success(&self, id: &str, result: Value) {
        self.update(id, |state| {
            state.status = NodeStatus::Success;
            state.result = Some(result);
            state.error = None;
        });
    }

    pub fn mark_error(&self, id: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(node = id, error = %message, "node failed");
        self.update(id, |state| {
            state.status = NodeStatus::Error;
            state.error = Some(message);
        });
    }

    /// Append one value to a node's result channel. Repeated calls for the
    /// same node accumulate into an array, e.g. streamed partial outputs or
    /// array-valued results recorded element by element.
    pub fn store_output(&self, id: &str, value: Value) {
        self.update(id, |state| {
            state.result = match state.result.take() {
                None => Some(value),
                Some(Value::Array(mut items)) => {
                    items.push(value);
                    Some(Value::Array(items))
                }
                Some(prev) => Some(Value::Array(vec![prev, value])),
            };
        });
    }

    /// Close out a batch recorded through [`store_output`]: flips the node
    /// to success without touching the accumulated result.
    pub fn finish_success(&self, id: &str) {
        self.update(id, |state| {
            state.status = NodeStatus::Success;
            state.error = None;
        });
    }

    /// Return a node back to `Idle`. The only path backwards; also releases
    /// the execute-once claim so the node may run again.
    pub fn reset(&self, id: &str) {
        self.claimed.lock().remove(id);
        self.joins.lock().remove(id);
        self.update(id, |state| {
            state.status = NodeStatus::Idle;
            state.result = None;
            state.error = None;
        });
    }

    fn update(&self, id: &str, apply: impl FnOnce(&mut NodeState)) {
        let snapshot = {
            let mut states = self.states.write();
            let state = states.entry(id.to_string()).or_default();
            apply(state);
            state.updated_at = Utc::now();
            state.clone()
        };
        self.events.node_state_changed(id, &snapshot);
    }

    // ---- reads --------------------------------------------------------------

    pub fn state(&self, id: &str) -> NodeState {
        if let Some(state) = self.states.read().get(id) {
            return state.clone();
        }
        // Lazily materialize as idle on first read.
        self.states
            .write()
            .entry(id.to_string())
            .or_default()
            .clone()
    }

    pub fn status(&self, id: &str) -> NodeStatus {
        self.state(id).status
    }

    pub fn result(&self, id: &str) -> Option<Value> {
        self.states.read().get(id).and_then(|s| s.result.clone())
    }

    pub fn error(&self, id: &str) -> Option<String> {
        self.states.read().get(id).and_then(|s| s.error.clone())
    }

    /// Copy of the full state map, for result sinks and post-run reads.
    pub fn snapshot(&self) -> HashMap<NodeId, NodeState> {
        self.states.read().clone()
    }

    // ---- scheduling bookkeeping ---------------------------------------------

    /// Execute-once guard: the first caller per node id wins. Mergers in
    /// fire-per-delivery mode bypass this.
    pub fn try_claim(&self, id: &str) -> bool {
        self.claimed.lock().insert(id.to_string())
    }

    /// Record one parent's settlement for a join-wait target and report
    /// whether the target can run. Inputs in the `Ready` case follow the
    /// target's parent order (edge insertion order), not arrival order.
    pub fn deliver_join(
        &self,
        target: &str,
        parent: &str,
        delivery: ParentDelivery,
    ) -> JoinOutcome {
        let parents = self.graph.parents(target);
        let mut joins = self.joins.lock();
        let delivered = joins.entry(target.to_string()).or_default();
        delivered.insert(parent.to_string(), delivery);

        if parents.iter().any(|p| !delivered.contains_key(p.as_str())) {
            return JoinOutcome::Pending;
        }

        let mut inputs = Vec::with_capacity(parents.len());
        for parent_id in parents {
            match delivered.get(parent_id.as_str()) {
                Some(ParentDelivery::Success(value)) => inputs.push(value.clone()),
                _ => return JoinOutcome::Blocked,
            }
        }
        JoinOutcome::Ready(inputs)
    }

    // ---- logging ------------------------------------------------------------

    pub fn log(&self, message: impl Into<String>) {
        self.log_inner(None, message.into());
    }

    pub fn log_for(&self, node_id: &str, message: impl Into<String>) {
        self.log_inner(Some(node_id.to_string()), message.into());
    }

    fn log_inner(&self, node_id: Option<NodeId>, message: String) {
        tracing::info!(
            execution = %self.execution_id,
            node = node_id.as_deref().unwrap_or("-"),
            "{message}"
        );
        self.events.log(node_id.as_deref(), &message);
        self.logs.lock().push(LogEntry {
            timestamp: Utc::now(),
            node_id,
            message,
        });
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        self.logs.lock().clone()
    }

    // ---- cancellation -------------------------------------------------------

    /// Stop scheduling further nodes. In-flight service calls already
    /// issued are not forcibly aborted.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn events(&self) -> &EventEmitter {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::graph::{Edge, GraphBuilder, NodeRecord, NodeType};
    use serde_json::json;

    fn fan_in_context() -> ExecutionContext {
        let nodes = vec![
            NodeRecord::new("p1", NodeType::Input),
            NodeRecord::new("p2", NodeType::Input),
            NodeRecord::new("m", NodeType::Merger),
        ];
        let edges = vec![Edge::new("p1", "m"), Edge::new("p2", "m")];
        let graph = Arc::new(GraphBuilder::build(nodes, edges).unwrap());
        let bus = EventBus::new(16);
        ExecutionContext::new(graph, None, bus.emitter(Uuid::new_v4()))
    }

    #[test]
    fn state_is_idle_on_first_read() {
        let ctx = fan_in_context();
        assert_eq!(ctx.status("p1"), NodeStatus::Idle);
    }

    #[test]
    fn forward_transitions_and_reset() {
        let ctx = fan_in_context();
        ctx.mark_running("p1");
        assert_eq!(ctx.status("p1"), NodeStatus::Running);
        ctx.mark_success("p1", json!("done"));
        assert_eq!(ctx.status("p1"), NodeStatus::Success);
        assert_eq!(ctx.result("p1"), Some(json!("done")));

        ctx.reset("p1");
        let state = ctx.state("p1");
        assert_eq!(state.status, NodeStatus::Idle);
        assert!(state.result.is_none());
    }

    #[test]
    fn store_output_accumulates() {
        let ctx = fan_in_context();
        ctx.store_output("p1", json!(1));
        assert_eq!(ctx.result("p1"), Some(json!(1)));
        ctx.store_output("p1", json!(2));
        ctx.store_output("p1", json!(3));
        assert_eq!(ctx.result("p1"), Some(json!([1, 2, 3])));
    }

    #[test]
    fn claim_is_exclusive_until_reset() {
        let ctx = fan_in_context();
        assert!(ctx.try_claim("m"));
        assert!(!ctx.try_claim("m"));
        ctx.reset("m");
        assert!(ctx.try_claim("m"));
    }

    #[test]
    fn join_orders_inputs_by_edge_insertion() {
        let ctx = fan_in_context();
        // p2 arrives first; Ready must still order p1 before p2.
        assert!(matches!(
            ctx.deliver_join("m", "p2", ParentDelivery::Success(json!("b"))),
            JoinOutcome::Pending
        ));
        match ctx.deliver_join("m", "p1", ParentDelivery::Success(json!("a"))) {
            JoinOutcome::Ready(inputs) => assert_eq!(inputs, vec![json!("a"), json!("b")]),
            other => panic!("expected Ready, got {other:?}"),
        }
    }

    #[test]
    fn join_blocks_on_failed_parent() {
        let ctx = fan_in_context();
        ctx.deliver_join("m", "p1", ParentDelivery::Failed);
        assert!(matches!(
            ctx.deliver_join("m", "p2", ParentDelivery::Success(json!("b"))),
            JoinOutcome::Blocked
        ));
    }

    #[test]
    fn iteration_contexts_are_isolated() {
        let ctx = fan_in_context();
        ctx.mark_success("p1", json!("outer"));

        let child = ctx.child_for_iteration(IterationScope {
            index: 0,
            total: 3,
            group_id: "g".into(),
        });
        assert_eq!(child.status("p1"), NodeStatus::Idle);
        child.mark_success("p1", json!("inner"));
        assert_eq!(ctx.result("p1"), Some(json!("outer")));
    }
}
