//! Execution runtime for the weft flow engine.
//!
//! This crate turns an execution graph into a running computation: the
//! node arena, the fan-out/fan-in scheduler with join-wait and
//! conditional routing, group scatter-gather iteration, and the
//! `FlowRuntime` trigger API.

mod factory;
mod group;
mod runtime;
mod scheduler;

pub use factory::NodeArena;
pub use group::GroupItemResult;
pub use runtime::{FlowRuntime, PreparedFlow, RuntimeConfig};
pub use scheduler::Scheduler;
