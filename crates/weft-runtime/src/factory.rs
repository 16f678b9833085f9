use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use weft_core::services::ServiceClients;
use weft_core::{FlowNode, NodeConfig, NodeError, NodeId, NodeRecord, NodeType};
use weft_nodes::{
    ApiNode, ConditionalNode, HtmlParserNode, InputNode, LlmNode, MergerNode, OutputNode,
    WebCrawlerNode,
};

/// Owns the node instances of one run, keyed by node id, so node-local
/// accumulator state (the merger's list) survives repeated invocations.
/// Group iterations get a child arena: accumulators never leak across
/// sibling iterations.
pub struct NodeArena {
    services: ServiceClients,
    instances: Mutex<HashMap<NodeId, Arc<dyn FlowNode>>>,
}

impl NodeArena {
    pub fn new(services: ServiceClients) -> Self {
        Self {
            services,
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Fresh arena sharing the same service clients.
    pub fn child_arena(&self) -> Self {
        Self::new(self.services.clone())
    }

    /// Resolve a record to its cached instance, constructing on first use.
    pub fn node_for(&self, record: &NodeRecord) -> Result<Arc<dyn FlowNode>, NodeError> {
        if let Some(node) = self.instances.lock().get(&record.id) {
            return Ok(Arc::clone(node));
        }
        let node = self.build(record)?;
        let mut instances = self.instances.lock();
        Ok(Arc::clone(
            instances.entry(record.id.clone()).or_insert(node),
        ))
    }

    fn build(&self, record: &NodeRecord) -> Result<Arc<dyn FlowNode>, NodeError> {
        let config = NodeConfig::new(record.config.clone());
        Ok(match record.node_type {
            NodeType::Input => Arc::new(InputNode::new(config)),
            NodeType::Output => Arc::new(OutputNode::new(config)),
            NodeType::Llm => Arc::new(LlmNode::new(config, Arc::clone(&self.services.inference))),
            NodeType::Api => Arc::new(ApiNode::new(config, Arc::clone(&self.services.http))),
            NodeType::Conditional => Arc::new(ConditionalNode::new(config)),
            NodeType::Merger => Arc::new(MergerNode::new(config)?),
            NodeType::WebCrawler => {
                Arc::new(WebCrawlerNode::new(config, Arc::clone(&self.services.pages)))
            }
            NodeType::HtmlParser => Arc::new(HtmlParserNode::new(
                config,
                Arc::clone(&self.services.extractor),
            )),
            NodeType::Group => {
                // Scatter-gather is scheduling, not node work.
                return Err(NodeError::Configuration(
                    "group nodes are executed by the scheduler".into(),
                ));
            }
        })
    }

    /// Clear a node's accumulator state, if it has been instantiated.
    pub async fn reset(&self, id: &str) {
        let node = self.instances.lock().get(id).map(Arc::clone);
        if let Some(node) = node {
            node.reset().await;
        }
    }
}
