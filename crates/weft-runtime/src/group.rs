//! Scatter-gather execution of a group's internal sub-graph, once per
//! item of a source collection.

use crate::scheduler::Scheduler;
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use weft_core::{
    ExecutionContext, IterationScope, NodeConfig, NodeError, NodeId, NodeOutput, NodeRecord,
    NodeStatus,
};

/// Outcome of one group iteration. The ordered list across iterations is
/// the group node's own result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupItemResult {
    pub item: Value,
    pub final_output: Value,
    pub status: NodeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub node_results: serde_json::Map<String, Value>,
}

pub(crate) async fn run_group(
    scheduler: &Scheduler,
    ctx: &ExecutionContext,
    record: &NodeRecord,
    input: Value,
) -> Result<NodeOutput, NodeError> {
    let config = NodeConfig::new(record.config.clone());
    let items = resolve_items(ctx, &config, input)?;
    let concurrent = config.bool_or("concurrent", false);
    let fail_fast = config.bool_or("failFast", false);

    let graph = scheduler.graph();
    let roots = graph.group_roots(&record.id);
    if roots.is_empty() {
        return Err(NodeError::Configuration(format!(
            "group '{}' has no member nodes",
            record.id
        )));
    }
    let leaves = graph.group_leaves(&record.id);
    let members: Vec<NodeId> = graph
        .group_members(&record.id)
        .into_iter()
        .map(|r| r.id.clone())
        .collect();

    let total = items.len();
    ctx.log_for(
        &record.id,
        format!(
            "iterating {total} item(s), {}",
            if concurrent { "concurrent" } else { "sequential" }
        ),
    );

    let results: Vec<GroupItemResult> = if concurrent {
        let iterations = items.into_iter().enumerate().map(|(index, item)| {
            run_item(
                scheduler, ctx, &record.id, &roots, &leaves, &members, index, total, item,
            )
        });
        join_all(iterations).await
    } else {
        let mut collected = Vec::with_capacity(total);
        for (index, item) in items.into_iter().enumerate() {
            let result = run_item(
                scheduler, ctx, &record.id, &roots, &leaves, &members, index, total, item,
            )
            .await;
            let failed = result.status == NodeStatus::Error;
            collected.push(result);
            if fail_fast && failed {
                break;
            }
        }
        collected
    };

    if fail_fast {
        if let Some(failed) = results.iter().find(|r| r.status == NodeStatus::Error) {
            return Err(NodeError::Evaluation(format!(
                "iteration {} failed: {}",
                results.iter().position(|r| r.status == NodeStatus::Error).unwrap_or(0),
                failed.error.as_deref().unwrap_or("unknown error")
            )));
        }
    }

    let value = serde_json::to_value(results)
        .map_err(|e| NodeError::Evaluation(format!("cannot serialize group results: {e}")))?;
    Ok(NodeOutput::Value(value))
}

/// One iteration: derived context (isolated state, iteration scope, child
/// cancellation), fresh node arena, then run every internal root with the
/// item as input.
#[allow(clippy::too_many_arguments)]
async fn run_item(
    scheduler: &Scheduler,
    ctx: &ExecutionContext,
    group_id: &str,
    roots: &[NodeId],
    leaves: &[NodeId],
    members: &[NodeId],
    index: usize,
    total: usize,
    item: Value,
) -> GroupItemResult {
    let child_ctx = ctx.child_for_iteration(IterationScope {
        index,
        total,
        group_id: group_id.to_string(),
    });
    let child_scheduler = Scheduler::new(scheduler.graph().clone(), scheduler.arena().child_arena());
    child_scheduler.run(&child_ctx, roots, item.clone()).await;

    let mut node_results = serde_json::Map::new();
    let mut error = None;
    for member in members {
        let state = child_ctx.state(member);
        if error.is_none() {
            if let Some(message) = &state.error {
                error = Some(format!("{member}: {message}"));
            }
        }
        node_results.insert(member.clone(), state.result.unwrap_or(Value::Null));
    }

    let final_output = match leaves {
        [leaf] => child_ctx.result(leaf).unwrap_or(Value::Null),
        many => Value::Array(
            many.iter()
                .map(|leaf| child_ctx.result(leaf).unwrap_or(Value::Null))
                .collect(),
        ),
    };

    GroupItemResult {
        item,
        final_output,
        status: if error.is_some() {
            NodeStatus::Error
        } else {
            NodeStatus::Success
        },
        error,
        node_results,
    }
}

/// The source collection: the configured source node's current result, or
/// the group's own input when it is already a collection.
fn resolve_items(
    ctx: &ExecutionContext,
    config: &NodeConfig,
    input: Value,
) -> Result<Vec<Value>, NodeError> {
    let source = match config.str_opt("sourceNode") {
        Some(source_id) => ctx.result(source_id).ok_or_else(|| {
            NodeError::Evaluation(format!("source node '{source_id}' has no result"))
        })?,
        None => input,
    };
    match source {
        Value::Array(items) => Ok(items),
        Value::Null => Err(NodeError::Configuration(
            "group requires a source collection".into(),
        )),
        single => Ok(vec![single]),
    }
}
