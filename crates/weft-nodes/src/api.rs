use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use weft_core::services::{HttpCall, HttpClient};
use weft_core::{ExecutionContext, FlowNode, NodeConfig, NodeError, NodeOutput, NodeType};

/// Generic HTTP call node. For body-carrying methods the request body is
/// the configured `body` field, or the node's input when none is set.
pub struct ApiNode {
    config: NodeConfig,
    client: Arc<dyn HttpClient>,
}

impl ApiNode {
    pub fn new(config: NodeConfig, client: Arc<dyn HttpClient>) -> Self {
        Self { config, client }
    }
}

fn method_has_body(method: &str) -> bool {
    matches!(method, "POST" | "PUT" | "PATCH")
}

#[async_trait]
impl FlowNode for ApiNode {
    fn node_type(&self) -> NodeType {
        NodeType::Api
    }

    async fn execute(&self, input: Value, ctx: &ExecutionContext) -> Result<NodeOutput, NodeError> {
        let url = self.config.require_str("url")?.to_string();
        let method = self.config.str_or("method", "GET").to_uppercase();

        let headers = self
            .config
            .get("headers")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        let body = if method_has_body(&method) {
            match self.config.get("body") {
                Some(body) => Some(body.clone()),
                None if !input.is_null() => Some(input),
                None => None,
            }
        } else {
            None
        };

        ctx.log(format!("{method} {url}"));
        let call = HttpCall {
            url,
            method,
            headers,
            body,
        };

        let reply = match self.config.u64_opt("timeoutMs") {
            Some(ms) => tokio::time::timeout(Duration::from_millis(ms), self.client.call(call))
                .await
                .map_err(|_| NodeError::Timeout { ms })??,
            None => self.client.call(call).await?,
        };

        if !(200..300).contains(&reply.status) {
            return Err(NodeError::Service(weft_core::ServiceError::Status {
                status: reply.status,
                body: weft_core::value_to_text(&reply.body),
            }));
        }

        Ok(NodeOutput::Value(json!({
            "status": reply.status,
            "body": reply.body,
        })))
    }
}
