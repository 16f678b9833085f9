use crate::context::ExecutionContext;
use crate::graph::NodeType;
use crate::NodeError;
use async_trait::async_trait;
use serde_json::Value;

/// What a node hands back to the scheduler.
#[derive(Debug, Clone)]
pub enum NodeOutput {
    /// Scalar result: recorded as-is and forwarded to children.
    Value(Value),
    /// Array-valued result: elements are recorded individually, the
    /// overall status reflects the batch, children receive the whole list.
    Items(Vec<Value>),
    /// Conditional verdict: `matched` is recorded as the node's result,
    /// `forward` travels only down edges whose handle matches.
    Branch { matched: bool, forward: Value },
}

/// The unit of work. `execute` must be a pure function of the input, the
/// node's own config, the external services, and the node's own
/// accumulator state; it must not touch other nodes' state or the graph.
#[async_trait]
pub trait FlowNode: Send + Sync {
    fn node_type(&self) -> NodeType;

    async fn execute(&self, input: Value, ctx: &ExecutionContext) -> Result<NodeOutput, NodeError>;

    /// Clear node-local accumulator state. No-op for stateless nodes.
    async fn reset(&self) {}
}

/// Typed accessors over a record's raw config map. Validation happens at
/// execute time so config errors surface as node errors, before any
/// external call.
#[derive(Debug, Clone, Default)]
pub struct NodeConfig(serde_json::Map<String, Value>);

impl NodeConfig {
    pub fn new(config: serde_json::Map<String, Value>) -> Self {
        Self(config)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn require_str(&self, key: &str) -> Result<&str, NodeError> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| NodeError::Configuration(format!("missing required field '{key}'")))
    }

    pub fn str_opt(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn str_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.str_opt(key).unwrap_or(default)
    }

    pub fn f64_opt(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    pub fn u64_opt(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }

    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        self.0.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    /// Deserialize one config field into a typed value.
    pub fn parse<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<T, NodeError> {
        let value = self
            .0
            .get(key)
            .ok_or_else(|| NodeError::Configuration(format!("missing required field '{key}'")))?;
        serde_json::from_value(value.clone())
            .map_err(|e| NodeError::Configuration(format!("invalid field '{key}': {e}")))
    }
}

/// Stringify a payload the way user-facing nodes do: strings verbatim,
/// everything else as compact JSON.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
