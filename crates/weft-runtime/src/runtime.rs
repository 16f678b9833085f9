use crate::factory::NodeArena;
use crate::scheduler::Scheduler;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use uuid::Uuid;
use weft_core::services::ServiceClients;
use weft_core::{
    Edge, EventBus, ExecutionContext, FlowError, FlowEvent, GraphBuilder, GraphError, NodeId,
    NodeRecord,
};

/// Configuration for the runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub event_buffer_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: 1000,
        }
    }
}

/// Entry point for triggering flow executions. Each trigger gets its own
/// execution context and node arena; independent triggers may run
/// concurrently.
pub struct FlowRuntime {
    services: ServiceClients,
    event_bus: Arc<EventBus>,
}

impl FlowRuntime {
    pub fn new(services: ServiceClients) -> Self {
        Self::with_config(services, RuntimeConfig::default())
    }

    pub fn with_config(services: ServiceClients, config: RuntimeConfig) -> Self {
        Self {
            services,
            event_bus: Arc::new(EventBus::new(config.event_buffer_size)),
        }
    }

    /// Build the execution graph and context for one run without starting
    /// it. Useful when the caller needs the context handle up front, e.g.
    /// for cancellation.
    pub fn prepare(
        &self,
        nodes: Vec<NodeRecord>,
        edges: Vec<Edge>,
        trigger: Option<NodeId>,
    ) -> Result<PreparedFlow, FlowError> {
        let graph = Arc::new(GraphBuilder::build(nodes, edges)?);
        if let Some(trigger_id) = &trigger {
            if graph.record(trigger_id).is_none() {
                return Err(GraphError::NodeNotFound(trigger_id.clone()).into());
            }
        }

        let seeds: Vec<NodeId> = match &trigger {
            Some(trigger_id) => vec![trigger_id.clone()],
            None => graph.roots().to_vec(),
        };

        let emitter = self.event_bus.emitter(Uuid::new_v4());
        let ctx = Arc::new(ExecutionContext::new(Arc::clone(&graph), trigger, emitter));
        let scheduler = Scheduler::new(graph, NodeArena::new(self.services.clone()));

        Ok(PreparedFlow {
            ctx,
            scheduler,
            seeds,
        })
    }

    /// Trigger a run and await settlement of every reachable node. Returns
    /// the run's context for status/result reads.
    pub async fn run_flow(
        &self,
        nodes: Vec<NodeRecord>,
        edges: Vec<Edge>,
        trigger: Option<NodeId>,
        input: Value,
    ) -> Result<Arc<ExecutionContext>, FlowError> {
        let prepared = self.prepare(nodes, edges, trigger)?;
        Ok(prepared.execute(input).await)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<FlowEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }
}

/// A run that has been graphed and seeded but not yet started.
pub struct PreparedFlow {
    pub ctx: Arc<ExecutionContext>,
    scheduler: Scheduler,
    seeds: Vec<NodeId>,
}

impl PreparedFlow {
    pub async fn execute(self, input: Value) -> Arc<ExecutionContext> {
        let started = Instant::now();
        self.ctx
            .events()
            .run_started(self.ctx.trigger_node_id.as_deref());
        tracing::info!(
            execution = %self.ctx.execution_id,
            seeds = self.seeds.len(),
            "run started"
        );

        self.scheduler.run(&self.ctx, &self.seeds, input).await;

        let duration_ms = started.elapsed().as_millis() as u64;
        self.ctx.events().run_completed(duration_ms);
        tracing::info!(
            execution = %self.ctx.execution_id,
            duration_ms,
            "run settled"
        );
        self.ctx
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }
}
