use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use weft_core::services::{ExtractionRule, HtmlExtractor};
use weft_core::{ExecutionContext, FlowNode, NodeConfig, NodeError, NodeOutput, NodeType};

/// Runs configured selector rules over an HTML payload via the extraction
/// service. Accepts a bare HTML string or an object with an `html` field
/// (the shape a web-crawler node produces).
pub struct HtmlParserNode {
    config: NodeConfig,
    extractor: Arc<dyn HtmlExtractor>,
}

impl HtmlParserNode {
    pub fn new(config: NodeConfig, extractor: Arc<dyn HtmlExtractor>) -> Self {
        Self { config, extractor }
    }
}

#[async_trait]
impl FlowNode for HtmlParserNode {
    fn node_type(&self) -> NodeType {
        NodeType::HtmlParser
    }

    async fn execute(&self, input: Value, ctx: &ExecutionContext) -> Result<NodeOutput, NodeError> {
        let html = match &input {
            Value::String(html) => html.as_str(),
            Value::Object(map) => map
                .get("html")
                .and_then(Value::as_str)
                .ok_or_else(|| NodeError::Evaluation("input has no 'html' field".into()))?,
            _ => return Err(NodeError::Evaluation("input is not HTML".into())),
        };

        let rules: Vec<ExtractionRule> = self.config.parse("rules")?;
        if rules.is_empty() {
            return Err(NodeError::Configuration("no extraction rules configured".into()));
        }

        ctx.log(format!("extracting {} rule(s)", rules.len()));
        let extracted = self.extractor.extract(html, &rules).await?;
        Ok(NodeOutput::Value(Value::Object(extracted)))
    }
}
