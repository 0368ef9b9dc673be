//! Upstream Client: the narrow adapter over the Ollama HTTP API. No retries
//! and no selection policy live here — policy is the executor's job.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ResearchError;

/// One entry from `GET /api/tags`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamModel {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub digest: String,
}

/// Best-effort metadata from `POST /api/show`.
#[derive(Debug, Clone, Default)]
pub struct ModelMetadata {
    pub parameter_size: Option<String>,
    pub context_length: Option<u64>,
    pub quantization: Option<String>,
}

/// Parameters accepted by a single `generate` call.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub temperature: f64,
    pub timeout: Duration,
}

/// Result of a successful `generate` call.
#[derive(Debug, Clone)]
pub struct GenerateResult {
    pub text: String,
    pub tokens_produced: Option<u64>,
    pub latency_ms: u64,
}

/// One message in an OpenAI-style chat completion request.
#[derive(Debug, Clone, Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

fn unsupported(op: &str) -> ResearchError {
    ResearchError::Unavailable(format!("{op} is not supported by this client"))
}

/// Narrow interface the rest of the core depends on. The real implementation
/// talks HTTP; tests substitute an in-memory double.
///
/// `list_models`/`describe_model`/`generate` are the operations the research
/// core depends on and every implementation must provide. The remaining
/// methods back the thin passthrough tools and default to `Unavailable` so
/// test doubles exercising only the research path don't need to implement
/// them.
#[async_trait]
pub trait OllamaClient: Send + Sync {
    async fn list_models(&self) -> Result<Vec<UpstreamModel>, ResearchError>;
    async fn describe_model(&self, name: &str) -> Result<ModelMetadata, ResearchError>;
    async fn generate(
        &self,
        name: &str,
        prompt: &str,
        options: GenerateOptions,
    ) -> Result<GenerateResult, ResearchError>;

    /// Raw `POST /api/show` body, passed through verbatim for the `show` tool.
    async fn show_raw(&self, _name: &str) -> Result<serde_json::Value, ResearchError> {
        Err(unsupported("show"))
    }

    async fn pull_model(&self, _name: &str) -> Result<serde_json::Value, ResearchError> {
        Err(unsupported("pull"))
    }

    async fn push_model(&self, _name: &str) -> Result<serde_json::Value, ResearchError> {
        Err(unsupported("push"))
    }

    async fn remove_model(&self, _name: &str) -> Result<(), ResearchError> {
        Err(unsupported("remove"))
    }

    /// Forwards to Ollama's OpenAI-compatible `/api/chat` endpoint, returning
    /// the assistant message content.
    async fn chat_completion(
        &self,
        _model: &str,
        _messages: &[ChatMessage],
        _temperature: f64,
    ) -> Result<String, ResearchError> {
        Err(unsupported("chat_completion"))
    }
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<UpstreamModel>,
}

#[derive(Deserialize)]
struct ShowResponseDetails {
    #[serde(default)]
    parameter_size: Option<String>,
    #[serde(default)]
    quantization_level: Option<String>,
}

#[derive(Deserialize)]
struct ShowResponse {
    #[serde(default)]
    details: Option<ShowResponseDetails>,
    /// Context length is reported under provider-specific keys; best effort only.
    #[serde(default)]
    parameters: Option<String>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    eval_count: Option<u64>,
}

/// Live HTTP client, built once per process and reused across requests —
/// mirrors the connection pooling a long-running dispatch adapter needs.
pub struct HttpOllamaClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOllamaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(4)
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl OllamaClient for HttpOllamaClient {
    async fn list_models(&self) -> Result<Vec<UpstreamModel>, ResearchError> {
        let resp = self
            .client
            .get(self.url("/api/tags"))
            .send()
            .await
            .map_err(ResearchError::from)?;

        if !resp.status().is_success() {
            return Err(ResearchError::Unavailable(format!(
                "GET /api/tags returned {}",
                resp.status()
            )));
        }

        let parsed: TagsResponse = resp
            .json()
            .await
            .map_err(|e| ResearchError::Upstream(format!("malformed /api/tags body: {e}")))?;

        Ok(parsed.models)
    }

    async fn describe_model(&self, name: &str) -> Result<ModelMetadata, ResearchError> {
        let resp = self
            .client
            .post(self.url("/api/show"))
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await
            .map_err(ResearchError::from)?;

        if !resp.status().is_success() {
            return Err(ResearchError::Upstream(format!(
                "POST /api/show returned {}",
                resp.status()
            )));
        }

        let parsed: ShowResponse = resp
            .json()
            .await
            .map_err(|e| ResearchError::Upstream(format!("malformed /api/show body: {e}")))?;

        Ok(ModelMetadata {
            parameter_size: parsed.details.as_ref().and_then(|d| d.parameter_size.clone()),
            context_length: None,
            quantization: parsed.details.and_then(|d| d.quantization_level),
        })
    }

    async fn generate(
        &self,
        name: &str,
        prompt: &str,
        options: GenerateOptions,
    ) -> Result<GenerateResult, ResearchError> {
        let start = std::time::Instant::now();

        let body = serde_json::json!({
            "model": name,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": options.temperature },
        });

        let send_future = self.client.post(self.url("/api/generate")).json(&body).send();

        let resp = tokio::time::timeout(options.timeout, send_future)
            .await
            .map_err(|_| ResearchError::Timeout(start.elapsed().as_millis() as u64))?
            .map_err(ResearchError::from)?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ResearchError::NotFound(name.to_string()));
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            let excerpt: String = text.chars().take(300).collect();
            return Err(ResearchError::Upstream(format!("{status}: {excerpt}")));
        }

        let remaining = options
            .timeout
            .checked_sub(start.elapsed())
            .unwrap_or(Duration::ZERO);
        let parsed: GenerateResponse = tokio::time::timeout(remaining, resp.json())
            .await
            .map_err(|_| ResearchError::Timeout(start.elapsed().as_millis() as u64))?
            .map_err(|e| ResearchError::Upstream(format!("malformed /api/generate body: {e}")))?;

        Ok(GenerateResult {
            text: parsed.response,
            tokens_produced: parsed.eval_count,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn show_raw(&self, name: &str) -> Result<serde_json::Value, ResearchError> {
        let resp = self
            .client
            .post(self.url("/api/show"))
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await
            .map_err(ResearchError::from)?;
        map_json_response(resp, "POST /api/show").await
    }

    async fn pull_model(&self, name: &str) -> Result<serde_json::Value, ResearchError> {
        let resp = self
            .client
            .post(self.url("/api/pull"))
            .json(&serde_json::json!({ "name": name, "stream": false }))
            .send()
            .await
            .map_err(ResearchError::from)?;
        map_json_response(resp, "POST /api/pull").await
    }

    async fn push_model(&self, name: &str) -> Result<serde_json::Value, ResearchError> {
        let resp = self
            .client
            .post(self.url("/api/push"))
            .json(&serde_json::json!({ "name": name, "stream": false }))
            .send()
            .await
            .map_err(ResearchError::from)?;
        map_json_response(resp, "POST /api/push").await
    }

    async fn remove_model(&self, name: &str) -> Result<(), ResearchError> {
        let resp = self
            .client
            .delete(self.url("/api/delete"))
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await
            .map_err(ResearchError::from)?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ResearchError::NotFound(name.to_string()));
        }
        if !resp.status().is_success() {
            return Err(ResearchError::Upstream(format!("DELETE /api/delete returned {}", resp.status())));
        }
        Ok(())
    }

    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        temperature: f64,
    ) -> Result<String, ResearchError> {
        let resp = self
            .client
            .post(self.url("/api/chat"))
            .json(&serde_json::json!({
                "model": model,
                "messages": messages,
                "stream": false,
                "options": { "temperature": temperature },
            }))
            .send()
            .await
            .map_err(ResearchError::from)?;

        if !resp.status().is_success() {
            return Err(ResearchError::Upstream(format!("POST /api/chat returned {}", resp.status())));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| ResearchError::Upstream(format!("malformed /api/chat body: {e}")))?;
        Ok(parsed.message.content)
    }
}

async fn map_json_response(resp: reqwest::Response, op: &str) -> Result<serde_json::Value, ResearchError> {
    if resp.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(ResearchError::NotFound(op.to_string()));
    }
    if !resp.status().is_success() {
        return Err(ResearchError::Upstream(format!("{op} returned {}", resp.status())));
    }
    resp.json()
        .await
        .map_err(|e| ResearchError::Upstream(format!("malformed {op} body: {e}")))
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}
