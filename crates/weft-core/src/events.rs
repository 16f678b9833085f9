use crate::context::{ExecutionId, NodeState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events published during a run. `NodeStateChanged` is the result-sink
/// surface a UI polls or subscribes to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FlowEvent {
    RunStarted {
        execution_id: ExecutionId,
        trigger_node_id: Option<String>,
        timestamp: DateTime<Utc>,
    },
    RunCompleted {
        execution_id: ExecutionId,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    NodeStateChanged {
        execution_id: ExecutionId,
        node_id: String,
        state: NodeState,
        timestamp: DateTime<Utc>,
    },
    Log {
        execution_id: ExecutionId,
        node_id: Option<String>,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

/// Per-run handle for publishing events.
#[derive(Clone, Debug)]
pub struct EventEmitter {
    execution_id: ExecutionId,
    sender: broadcast::Sender<FlowEvent>,
}

impl EventEmitter {
    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    pub fn run_started(&self, trigger_node_id: Option<&str>) {
        self.send(FlowEvent::RunStarted {
            execution_id: self.execution_id,
            trigger_node_id: trigger_node_id.map(str::to_string),
            timestamp: Utc::now(),
        });
    }

    pub fn run_completed(&self, duration_ms: u64) {
        self.send(FlowEvent::RunCompleted {
            execution_id: self.execution_id,
            duration_ms,
            timestamp: Utc::now(),
        });
    }

    pub fn node_state_changed(&self, node_id: &str, state: &NodeState) {
        self.send(FlowEvent::NodeStateChanged {
            execution_id: self.execution_id,
            node_id: node_id.to_string(),
            state: state.clone(),
            timestamp: Utc::now(),
        });
    }

    pub fn log(&self, node_id: Option<&str>, message: &str) {
        self.send(FlowEvent::Log {
            execution_id: self.execution_id,
            node_id: node_id.map(str::to_string),
            message: message.to_string(),
            timestamp: Utc::now(),
        });
    }

    fn send(&self, event: FlowEvent) {
        // Nobody listening is fine.
        let _ = self.sender.send(event);
    }
}

/// Process-wide broadcast bus shared by all runs of one runtime.
pub struct EventBus {
    sender: broadcast::Sender<FlowEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FlowEvent> {
        self.sender.subscribe()
    }

    pub fn emitter(&self, execution_id: ExecutionId) -> EventEmitter {
        EventEmitter {
            execution_id,
            sender: self.sender.clone(),
        }
    }
}
