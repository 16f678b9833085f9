//! Node implementations for the weft flow engine.
//!
//! One module per node capability, plus default service clients for
//! running flows outside of tests. Group nodes have no implementation
//! here: scatter-gather iteration is scheduling, and lives in the
//! runtime crate.

mod api;
pub mod clients;
mod conditional;
mod crawler;
mod html;
mod input;
mod llm;
mod merger;
mod output;

pub use api::ApiNode;
pub use conditional::{ConditionKind, ConditionalNode};
pub use crawler::WebCrawlerNode;
pub use html::HtmlParserNode;
pub use input::InputNode;
pub use llm::LlmNode;
pub use merger::{MergeMode, MergerNode};
pub use output::OutputNode;
