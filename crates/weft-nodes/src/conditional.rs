use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use weft_core::{value_to_text, ExecutionContext, FlowNode, NodeConfig, NodeError, NodeOutput, NodeType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    Contains,
    GreaterThan,
    LessThan,
    Equals,
    JsonPath,
}

/// Binary router. Evaluates one predicate against the input; the verdict
/// is recorded as the node's result and the input travels only down the
/// matching `true`/`false` handle.
pub struct ConditionalNode {
    config: NodeConfig,
}

impl ConditionalNode {
    pub fn new(config: NodeConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(&self, input: &Value) -> Result<bool, NodeError> {
        let kind: ConditionKind = self.config.parse("conditionType")?;
        match kind {
            ConditionKind::Contains => {
                let needle = self.config.require_str("value")?;
                Ok(value_to_text(input).contains(needle))
            }
            ConditionKind::GreaterThan => Ok(compare_numeric(input, &self.config)?
                .map(|(lhs, rhs)| lhs > rhs)
                .unwrap_or(false)),
            ConditionKind::LessThan => Ok(compare_numeric(input, &self.config)?
                .map(|(lhs, rhs)| lhs < rhs)
                .unwrap_or(false)),
            ConditionKind::Equals => {
                let expected = self
                    .config
                    .get("value")
                    .ok_or_else(|| NodeError::Configuration("missing required field 'value'".into()))?;
                Ok(loose_equals(input, expected))
            }
            ConditionKind::JsonPath => {
                let path = self.config.require_str("path")?;
                if path.is_empty() {
                    return Err(NodeError::Evaluation("empty JSON path".into()));
                }
                Ok(walk_path(input, path).map(is_truthy).unwrap_or(false))
            }
        }
    }
}

/// Coerce input and configured value to numbers. Non-numeric operands make
/// the comparison false rather than failing the node.
fn compare_numeric(input: &Value, config: &NodeConfig) -> Result<Option<(f64, f64)>, NodeError> {
    let rhs = config
        .get("value")
        .ok_or_else(|| NodeError::Configuration("missing required field 'value'".into()))?;
    Ok(as_number(input).zip(as_number(rhs)))
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn loose_equals(lhs: &Value, rhs: &Value) -> bool {
    if lhs == rhs {
        return true;
    }
    // Cross-type: "3" equals 3, the way canvas-entered values compare.
    match (as_number(lhs), as_number(rhs)) {
        (Some(a), Some(b)) => a == b,
        _ => value_to_text(lhs) == value_to_text(rhs),
    }
}

/// Dot-separated path navigation; numeric segments index arrays.
fn walk_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[async_trait]
impl FlowNode for ConditionalNode {
    fn node_type(&self) -> NodeType {
        NodeType::Conditional
    }

    async fn execute(&self, input: Value, ctx: &ExecutionContext) -> Result<NodeOutput, NodeError> {
        let matched = self.evaluate(&input)?;
        ctx.log(format!("condition evaluated to {matched}"));
        Ok(NodeOutput::Branch {
            matched,
            forward: input,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(config: Value) -> ConditionalNode {
        match config {
            Value::Object(map) => ConditionalNode::new(NodeConfig::new(map)),
            _ => unreachable!(),
        }
    }

    #[test]
    fn contains_matches_substring() {
        let n = node(json!({"conditionType": "contains", "value": "foo"}));
        assert!(n.evaluate(&json!("foobar")).unwrap());
        assert!(!n.evaluate(&json!("baz")).unwrap());
    }

    #[test]
    fn numeric_comparisons_coerce_strings() {
        let gt = node(json!({"conditionType": "greater_than", "value": 10}));
        assert!(gt.evaluate(&json!(11)).unwrap());
        assert!(gt.evaluate(&json!("12")).unwrap());
        assert!(!gt.evaluate(&json!(10)).unwrap());
        // Non-numeric input compares false, not an error.
        assert!(!gt.evaluate(&json!("many")).unwrap());

        let lt = node(json!({"conditionType": "less_than", "value": 5}));
        assert!(lt.evaluate(&json!(3)).unwrap());
        assert!(!lt.evaluate(&json!(7)).unwrap());
    }

    #[test]
    fn equals_is_loose_across_types() {
        let n = node(json!({"conditionType": "equals", "value": 3}));
        assert!(n.evaluate(&json!(3)).unwrap());
        assert!(n.evaluate(&json!("3")).unwrap());
        assert!(!n.evaluate(&json!(4)).unwrap());
    }

    #[test]
    fn json_path_existence_and_truthiness() {
        let n = node(json!({"conditionType": "json_path", "path": "data.items.0.ok"}));
        assert!(n
            .evaluate(&json!({"data": {"items": [{"ok": true}]}}))
            .unwrap());
        assert!(!n
            .evaluate(&json!({"data": {"items": [{"ok": false}]}}))
            .unwrap());
        assert!(!n.evaluate(&json!({"data": {}})).unwrap());
    }

    #[test]
    fn missing_config_is_a_configuration_error() {
        let n = node(json!({"conditionType": "contains"}));
        assert!(matches!(
            n.evaluate(&json!("x")),
            Err(NodeError::Configuration(_))
        ));
    }
}
