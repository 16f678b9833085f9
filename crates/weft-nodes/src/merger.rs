use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use weft_core::{value_to_text, ExecutionContext, FlowNode, NodeConfig, NodeError, NodeOutput, NodeType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MergeMode {
    Array,
    JoinToString,
    Object,
}

/// Accumulates repeated deliveries to one node id within a run and
/// recomputes its declared output form from the current list on every
/// invocation. `execute` never clears the list; only an explicit reset
/// does. With `waitForAll` the scheduler joins all parents first and the
/// single joined delivery is appended element-wise.
pub struct MergerNode {
    mode: MergeMode,
    separator: String,
    joined: bool,
    items: Mutex<Vec<Value>>,
}

impl MergerNode {
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        let mode = match config.get("mode") {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| NodeError::Configuration(format!("invalid field 'mode': {e}")))?,
            None => MergeMode::Array,
        };
        Ok(Self {
            mode,
            separator: config.str_or("separator", ", ").to_string(),
            joined: config.bool_or("waitForAll", false),
            items: Mutex::new(Vec::new()),
        })
    }

    fn render(&self, items: &[Value]) -> Value {
        match self.mode {
            MergeMode::Array => Value::Array(items.to_vec()),
            MergeMode::JoinToString => Value::String(
                items
                    .iter()
                    .map(value_to_text)
                    .collect::<Vec<_>>()
                    .join(&self.separator),
            ),
            MergeMode::Object => {
                let mut map = serde_json::Map::new();
                for (index, item) in items.iter().enumerate() {
                    match item.as_object().and_then(|o| {
                        o.get("key")
                            .and_then(Value::as_str)
                            .map(|k| (k.to_string(), o.get("value").cloned()))
                    }) {
                        Some((key, value)) => {
                            map.insert(key, value.unwrap_or_else(|| item.clone()));
                        }
                        None => {
                            map.insert(format!("item-{index}"), item.clone());
                        }
                    }
                }
                Value::Object(map)
            }
        }
    }
}

#[async_trait]
impl FlowNode for MergerNode {
    fn node_type(&self) -> NodeType {
        NodeType::Merger
    }

    async fn execute(&self, input: Value, _ctx: &ExecutionContext) -> Result<NodeOutput, NodeError> {
        let rendered = {
            let mut items = self.items.lock();
            match input {
                Value::Array(joined) if self.joined => items.extend(joined),
                other => items.push(other),
            }
            self.render(&items)
        };
        Ok(NodeOutput::Value(rendered))
    }

    async fn reset(&self) {
        self.items.lock().clear();
    }
}
