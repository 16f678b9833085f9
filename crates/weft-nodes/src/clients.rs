//! Default service clients for running flows outside of tests. The page
//! fetcher is a plain HTTP GET (no JS rendering; selector options are
//! forwarded but only honored by a real rendering service), and HTML
//! extraction has no in-process default because it is an external
//! collaborator of the engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use weft_core::services::{
    ExtractionRule, FetchedPage, HtmlExtractor, HttpCall, HttpClient, HttpReply, InferenceClient,
    InferenceReply, InferenceRequest, PageFetcher, PageRequest, ServiceClients,
};
use weft_core::ServiceError;

use std::sync::Arc;

fn network_error(e: reqwest::Error) -> ServiceError {
    if e.is_timeout() {
        ServiceError::Timeout
    } else {
        ServiceError::Network(e.to_string())
    }
}

/// OpenAI-compatible chat-completions client. Works against OpenAI,
/// Ollama, vLLM and other compatible endpoints; the base URL and API key
/// come from the environment.
pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompatibleClient {
    pub fn from_env() -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: std::env::var("WEFT_LLM_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            api_key: std::env::var("OPENAI_API_KEY").ok(),
        }
    }
}

#[async_trait]
impl InferenceClient for OpenAiCompatibleClient {
    async fn run_inference(
        &self,
        request: InferenceRequest,
    ) -> Result<InferenceReply, ServiceError> {
        let payload = ChatRequest {
            model: &request.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature,
        };

        let mut builder = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .json(&payload);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(network_error)?;
        let status = response.status();
        let raw: Value = response.json().await.map_err(network_error)?;
        if !status.is_success() {
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body: raw.to_string(),
            });
        }

        let parsed: ChatResponse = serde_json::from_value(raw.clone())
            .map_err(|e| ServiceError::Protocol(e.to_string()))?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ServiceError::Protocol("response has no choices".into()))?;

        Ok(InferenceReply { text, raw })
    }
}

/// Plain reqwest-backed HTTP client.
pub struct ReqwestHttpClient {
    http: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn call(&self, request: HttpCall) -> Result<HttpReply, ServiceError> {
        tracing::debug!(method = %request.method, url = %request.url, "http call");
        let method: reqwest::Method = request
            .method
            .parse()
            .map_err(|_| ServiceError::Protocol(format!("unsupported method: {}", request.method)))?;

        let mut builder = self.http.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = match body {
                Value::String(text) => builder.body(text.clone()),
                other => builder.json(other),
            };
        }

        let response = builder.send().await.map_err(network_error)?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(network_error)?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

        Ok(HttpReply { status, body })
    }
}

/// Fetches pages with a plain GET. A rendering service replaces this when
/// pages need JavaScript or iframe handling.
pub struct ReqwestPageFetcher {
    http: reqwest::Client,
}

impl ReqwestPageFetcher {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for ReqwestPageFetcher {
    fn default() -> Self {
        Self::new()
    }
}

fn page_title(html: &str) -> Option<String> {
    let lower = html.to_lowercase();
    let start = lower.find("<title")?;
    let open = lower[start..].find('>')? + start + 1;
    let close = lower[open..].find("</title>")? + open;
    let title = html[open..close].trim();
    (!title.is_empty()).then(|| title.to_string())
}

#[async_trait]
impl PageFetcher for ReqwestPageFetcher {
    async fn fetch(&self, request: PageRequest) -> Result<FetchedPage, ServiceError> {
        let mut builder = self.http.get(&request.url);
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(network_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body: format!("GET {}", request.url),
            });
        }

        let html = response.text().await.map_err(network_error)?;
        Ok(FetchedPage {
            title: page_title(&html),
            text: html.clone(),
            html,
        })
    }
}

/// Placeholder for deployments without an extraction service configured.
pub struct UnconfiguredExtractor;

#[async_trait]
impl HtmlExtractor for UnconfiguredExtractor {
    async fn extract(
        &self,
        _html: &str,
        _rules: &[ExtractionRule],
    ) -> Result<serde_json::Map<String, Value>, ServiceError> {
        Err(ServiceError::Unconfigured("html extraction".into()))
    }
}

/// Default wiring used by the CLI.
pub fn default_clients() -> ServiceClients {
    ServiceClients {
        inference: Arc::new(OpenAiCompatibleClient::from_env()),
        http: Arc::new(ReqwestHttpClient::new()),
        pages: Arc::new(ReqwestPageFetcher::new()),
        extractor: Arc::new(UnconfiguredExtractor),
    }
}
