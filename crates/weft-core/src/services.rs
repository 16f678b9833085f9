//! Narrow contracts for the remote collaborators a node may call. The
//! engine only ever sees these traits; concrete clients live elsewhere.

use crate::ServiceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub provider: String,
    pub model: String,
    pub prompt: String,
    pub temperature: Option<f32>,
    pub images: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct InferenceReply {
    pub text: String,
    pub raw: Value,
}

#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn run_inference(&self, request: InferenceRequest)
        -> Result<InferenceReply, ServiceError>;
}

#[derive(Debug, Clone)]
pub struct HttpCall {
    pub url: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: Value,
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn call(&self, request: HttpCall) -> Result<HttpReply, ServiceError>;
}

#[derive(Debug, Clone)]
pub struct PageRequest {
    pub url: String,
    pub wait_selector: Option<String>,
    pub iframe_selector: Option<String>,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub html: String,
    pub title: Option<String>,
    pub text: String,
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, request: PageRequest) -> Result<FetchedPage, ServiceError>;
}

/// Where an extraction rule reads its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionTarget {
    Text,
    Html,
    Attribute,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRule {
    pub name: String,
    pub selector: String,
    pub target: ExtractionTarget,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_name: Option<String>,
    #[serde(default)]
    pub multiple: bool,
}

#[async_trait]
pub trait HtmlExtractor: Send + Sync {
    async fn extract(
        &self,
        html: &str,
        rules: &[ExtractionRule],
    ) -> Result<serde_json::Map<String, Value>, ServiceError>;
}

/// Bundle of the external clients one runtime hands to its nodes.
#[derive(Clone)]
pub struct ServiceClients {
    pub inference: Arc<dyn InferenceClient>,
    pub http: Arc<dyn HttpClient>,
    pub pages: Arc<dyn PageFetcher>,
    pub extractor: Arc<dyn HtmlExtractor>,
}
