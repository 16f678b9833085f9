use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use weft_core::services::{PageFetcher, PageRequest};
use weft_core::{ExecutionContext, FlowNode, NodeConfig, NodeError, NodeOutput, NodeType};

/// Fetches a rendered web page through the page-fetching service. The URL
/// comes from config, or from a string input when the node sits downstream
/// of a URL producer.
pub struct WebCrawlerNode {
    config: NodeConfig,
    fetcher: Arc<dyn PageFetcher>,
}

impl WebCrawlerNode {
    pub fn new(config: NodeConfig, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { config, fetcher }
    }
}

#[async_trait]
impl FlowNode for WebCrawlerNode {
    fn node_type(&self) -> NodeType {
        NodeType::WebCrawler
    }

    async fn execute(&self, input: Value, ctx: &ExecutionContext) -> Result<NodeOutput, NodeError> {
        let url = match self.config.str_opt("url") {
            Some(url) => url.to_string(),
            None => input
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| NodeError::Configuration("missing required field 'url'".into()))?,
        };

        ctx.log(format!("fetching page {url}"));
        let page = self
            .fetcher
            .fetch(PageRequest {
                url,
                wait_selector: self.config.str_opt("waitSelector").map(str::to_string),
                iframe_selector: self.config.str_opt("iframeSelector").map(str::to_string),
                timeout: self.config.u64_opt("timeoutMs").map(Duration::from_millis),
            })
            .await?;

        Ok(NodeOutput::Value(json!({
            "html": page.html,
            "title": page.title,
            "text": page.text,
        })))
    }
}
