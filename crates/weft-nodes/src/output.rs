use async_trait::async_trait;
use serde_json::Value;
use weft_core::{value_to_text, ExecutionContext, FlowNode, NodeConfig, NodeError, NodeOutput, NodeType};

/// Sink node: records its input as the flow's user-visible output.
pub struct OutputNode {
    config: NodeConfig,
}

impl OutputNode {
    pub fn new(config: NodeConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl FlowNode for OutputNode {
    fn node_type(&self) -> NodeType {
        NodeType::Output
    }

    async fn execute(&self, input: Value, ctx: &ExecutionContext) -> Result<NodeOutput, NodeError> {
        if let Some(label) = self.config.str_opt("label") {
            ctx.log(format!("{label}: {}", value_to_text(&input)));
        }
        Ok(NodeOutput::Value(input))
    }
}
