use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Structural problems detected while building an execution graph.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Cyclic dependency detected")]
    Cycle,

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Edge references unknown node: {0}")]
    DanglingEdge(String),

    #[error("Flow has no nodes")]
    Empty,
}

/// Failures scoped to a single node execution. These are recorded into the
/// execution context and never abort sibling branches.
#[derive(Error, Debug, Clone)]
pub enum NodeError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("Service call failed: {0}")]
    Service(#[from] ServiceError),

    #[error("Timeout after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Cancelled")]
    Cancelled,
}

/// Errors surfaced by external service clients (inference, HTTP, page
/// fetching, HTML extraction).
#[derive(Error, Debug, Clone)]
pub enum ServiceError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timed out")]
    Timeout,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Service not configured: {0}")]
    Unconfigured(String),
}
