use crate::factory::NodeArena;
use crate::group;
use futures::future::{join_all, BoxFuture};
use serde_json::Value;
use std::sync::Arc;
use weft_core::{
    ExecutionContext, ExecutionGraph, JoinOutcome, NodeId, NodeOutput, NodeType, ParentDelivery,
};

/// Which precondition gates a node's execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Discipline {
    /// Execute immediately on delivery from the (single) triggering parent.
    Chained,
    /// Execute once, after every parent has settled.
    JoinWait,
}

/// Drives one run: recursive asynchronous fan-out from the seed nodes,
/// join-wait gating for fan-in, conditional routing, and group iteration.
/// All run state lives in the [`ExecutionContext`]; the scheduler itself
/// owns only the graph and the node arena.
pub struct Scheduler {
    graph: Arc<ExecutionGraph>,
    arena: NodeArena,
}

impl Scheduler {
    pub fn new(graph: Arc<ExecutionGraph>, arena: NodeArena) -> Self {
        Self { graph, arena }
    }

    pub fn graph(&self) -> &Arc<ExecutionGraph> {
        &self.graph
    }

    pub(crate) fn arena(&self) -> &NodeArena {
        &self.arena
    }

    /// Seed the run and await settlement of every reachable node. One
    /// fan-out per seed; a seed's failure does not cancel its siblings.
    pub async fn run(&self, ctx: &ExecutionContext, seeds: &[NodeId], input: Value) {
        let tasks: Vec<_> = seeds
            .iter()
            .map(|id| self.process(ctx, id.clone(), input.clone()))
            .collect();
        join_all(tasks).await;
    }

    /// Reset a node back to idle, including its arena-held accumulator.
    pub async fn reset_node(&self, ctx: &ExecutionContext, id: &str) {
        ctx.reset(id);
        self.arena.reset(id).await;
    }

    /// Node lifecycle: mark running, execute, record result or error, then
    /// fan out to children with this node's result as their input, awaiting
    /// all of them before returning. Errors are recorded, never rethrown;
    /// the failing branch is pruned.
    pub fn process<'a>(
        &'a self,
        ctx: &'a ExecutionContext,
        id: NodeId,
        input: Value,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if ctx.is_cancelled() {
                return;
            }
            let Some(record) = self.graph.record(&id) else {
                ctx.mark_error(&id, format!("unknown node id '{id}'"));
                return;
            };

            // Every node executes at most once per context. The exception
            // is a merger in fire-per-delivery mode, which re-executes on
            // each inbound delivery and accumulates.
            let fire_per_delivery =
                record.node_type == NodeType::Merger && !wait_for_all(record);
            if !fire_per_delivery && !ctx.try_claim(&id) {
                return;
            }

            ctx.mark_running(&id);
            tracing::debug!(node = %id, node_type = record.node_type.as_str(), "executing");

            let outcome = if record.node_type == NodeType::Group {
                group::run_group(self, ctx, record, input).await
            } else {
                match self.arena.node_for(record) {
                    Ok(node) => node.execute(input, ctx).await,
                    Err(e) => Err(e),
                }
            };

            let (forward, branch) = match outcome {
                Ok(NodeOutput::Value(value)) => {
                    ctx.mark_success(&id, value.clone());
                    (value, None)
                }
                Ok(NodeOutput::Items(items)) => {
                    for item in &items {
                        ctx.store_output(&id, item.clone());
                    }
                    ctx.finish_success(&id);
                    (Value::Array(items), None)
                }
                Ok(NodeOutput::Branch { matched, forward }) => {
                    ctx.mark_success(&id, Value::Bool(matched));
                    (forward, Some(matched))
                }
                Err(e) => {
                    ctx.mark_error(&id, e.to_string());
                    self.settle_failure(ctx, &id);
                    return;
                }
            };

            self.fan_out(ctx, &id, forward, branch).await;
        })
    }

    /// Dispatch a settled node's result to its children concurrently and
    /// await them all, giving a bottom-up completion signal.
    async fn fan_out(&self, ctx: &ExecutionContext, id: &str, forward: Value, branch: Option<bool>) {
        let mut tasks = Vec::new();
        for edge in self.graph.edges_from(id) {
            if let Some(matched) = branch {
                // A conditional routes only down the matching handle; the
                // other subtree is never scheduled.
                let selected = if matched { "true" } else { "false" };
                if edge.source_handle.as_deref() != Some(selected) {
                    continue;
                }
            }

            let child = edge.target.clone();
            match self.discipline(&child) {
                Discipline::Chained => {
                    tasks.push(self.process(ctx, child, forward.clone()));
                }
                Discipline::JoinWait => {
                    match ctx.deliver_join(&child, id, ParentDelivery::Success(forward.clone())) {
                        JoinOutcome::Ready(inputs) => {
                            tasks.push(self.process(ctx, child, Value::Array(inputs)));
                        }
                        JoinOutcome::Pending | JoinOutcome::Blocked => {}
                    }
                }
            }
        }
        join_all(tasks).await;
    }

    /// A failed node's children are pruned, but join-wait children must
    /// still see the parent settle so their bookkeeping completes.
    fn settle_failure(&self, ctx: &ExecutionContext, id: &str) {
        for edge in self.graph.edges_from(id) {
            if self.discipline(&edge.target) == Discipline::JoinWait {
                let _ = ctx.deliver_join(&edge.target, id, ParentDelivery::Failed);
            }
        }
    }

    fn discipline(&self, id: &str) -> Discipline {
        if self.graph.parents(id).len() <= 1 {
            return Discipline::Chained;
        }
        match self.graph.record(id) {
            // A merger without waitForAll fires on every delivery even
            // with multiple parents; everything else with fan-in joins.
            Some(record) if record.node_type == NodeType::Merger && !wait_for_all(record) => {
                Discipline::Chained
            }
            _ => Discipline::JoinWait,
        }
    }
}

fn wait_for_all(record: &weft_core::NodeRecord) -> bool {
    record
        .config
        .get("waitForAll")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}
