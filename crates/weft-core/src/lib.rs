//! Core abstractions for the weft flow engine.
//!
//! This crate provides the graph model, the per-run execution context,
//! the node contract, and the external-service interfaces that the
//! runtime and node crates build on. It contains no scheduling logic.

mod context;
mod error;
pub mod events;
mod graph;
mod node;
pub mod services;

pub use context::{
    ExecutionContext, ExecutionId, IterationScope, JoinOutcome, LogEntry, NodeState, NodeStatus,
    ParentDelivery,
};
pub use error::{FlowError, GraphError, NodeError, ServiceError};
pub use events::{EventBus, EventEmitter, FlowEvent};
pub use graph::{Edge, ExecutionGraph, GraphBuilder, GraphEntry, NodeId, NodeRecord, NodeType};
pub use node::{value_to_text, FlowNode, NodeConfig, NodeOutput};

/// Result type for flow operations.
pub type Result<T> = std::result::Result<T, FlowError>;
