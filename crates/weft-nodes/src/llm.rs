use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use weft_core::services::{InferenceClient, InferenceRequest};
use weft_core::{value_to_text, ExecutionContext, FlowNode, NodeConfig, NodeError, NodeOutput, NodeType};

use std::sync::Arc;

const INPUT_PLACEHOLDER: &str = "{{input}}";

/// Calls the inference service with a prompt assembled from the node's
/// template and the incoming payload.
pub struct LlmNode {
    config: NodeConfig,
    client: Arc<dyn InferenceClient>,
}

impl LlmNode {
    pub fn new(config: NodeConfig, client: Arc<dyn InferenceClient>) -> Self {
        Self { config, client }
    }

    fn build_prompt(&self, input: &Value) -> String {
        let rendered_input = value_to_text(input);
        match self.config.str_opt("prompt") {
            Some(template) if template.contains(INPUT_PLACEHOLDER) => {
                template.replace(INPUT_PLACEHOLDER, &rendered_input)
            }
            Some(template) if input.is_null() => template.to_string(),
            Some(template) => format!("{template}\n\n{rendered_input}"),
            None => rendered_input,
        }
    }
}

#[async_trait]
impl FlowNode for LlmNode {
    fn node_type(&self) -> NodeType {
        NodeType::Llm
    }

    async fn execute(&self, input: Value, ctx: &ExecutionContext) -> Result<NodeOutput, NodeError> {
        let model = self.config.require_str("model")?.to_string();
        let provider = self.config.str_or("provider", "openai").to_string();
        let temperature = self.config.f64_opt("temperature").map(|t| t as f32);
        let images = self
            .config
            .get("images")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let request = InferenceRequest {
            provider,
            model,
            prompt: self.build_prompt(&input),
            temperature,
            images,
        };
        ctx.log(format!(
            "inference: {}/{} ({} chars)",
            request.provider,
            request.model,
            request.prompt.len()
        ));

        let reply = match self.config.u64_opt("timeoutMs") {
            Some(ms) => tokio::time::timeout(
                Duration::from_millis(ms),
                self.client.run_inference(request),
            )
            .await
            .map_err(|_| NodeError::Timeout { ms })??,
            None => self.client.run_inference(request).await?,
        };

        Ok(NodeOutput::Value(json!(reply.text)))
    }
}
