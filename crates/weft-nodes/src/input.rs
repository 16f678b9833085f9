use async_trait::async_trait;
use serde_json::Value;
use weft_core::{ExecutionContext, FlowNode, NodeConfig, NodeError, NodeOutput, NodeType};

/// Source node: emits its configured `value`, falling back to whatever
/// the run was triggered with.
pub struct InputNode {
    config: NodeConfig,
}

impl InputNode {
    pub fn new(config: NodeConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl FlowNode for InputNode {
    fn node_type(&self) -> NodeType {
        NodeType::Input
    }

    async fn execute(&self, input: Value, _ctx: &ExecutionContext) -> Result<NodeOutput, NodeError> {
        let value = self
            .config
            .get("value")
            .cloned()
            .or_else(|| self.config.str_opt("text").map(|s| Value::String(s.to_string())))
            .unwrap_or(input);
        // Collections are recorded element by element; children still
        // receive the whole list.
        Ok(match value {
            Value::Array(items) => NodeOutput::Items(items),
            other => NodeOutput::Value(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(config: Value) -> InputNode {
        match config {
            Value::Object(map) => InputNode::new(NodeConfig::new(map)),
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn configured_value_wins_over_run_input() {
        let n = node(json!({"value": "configured"}));
        let out = n.execute(json!("run input"), &test_ctx()).await;
        assert!(matches!(out, Ok(NodeOutput::Value(v)) if v == json!("configured")));
    }

    #[tokio::test]
    async fn collections_become_items() {
        let n = node(json!({"value": [1, 2]}));
        let out = n.execute(Value::Null, &test_ctx()).await;
        assert!(matches!(out, Ok(NodeOutput::Items(items)) if items == vec![json!(1), json!(2)]));
    }

    fn test_ctx() -> ExecutionContext {
        use std::sync::Arc;
        use weft_core::{EventBus, GraphBuilder, NodeRecord};
        let graph = Arc::new(
            GraphBuilder::build(vec![NodeRecord::new("in", NodeType::Input)], Vec::new()).unwrap(),
        );
        ExecutionContext::new(graph, None, EventBus::new(4).emitter(uuid::Uuid::new_v4()))
    }
}
