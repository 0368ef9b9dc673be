//! Wire types for the thin passthrough tools: direct forwards to the
//! Upstream Client with no business logic beyond deserialization and
//! reserialization.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::client::ChatMessage;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ShowModelRequest {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PullModelRequest {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PushModelRequest {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RemoveModelRequest {
    pub name: String,
}

fn default_run_temperature() -> f64 {
    0.7
}

/// A single-shot generate: the one-model degenerate case of `research`,
/// without theme/divergence analysis — there's nothing to compare.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RunRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default = "default_run_temperature")]
    pub temperature: f64,
    /// Timeout override in milliseconds. Defaults to the medium-complexity
    /// base budget for the model's tier.
    #[serde(default)]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResponse {
    pub model: String,
    pub response: String,
    pub response_time: u64,
    pub token_count: u64,
}

/// OpenAI-style chat completion request, forwarded to `/api/chat`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default = "default_run_temperature")]
    pub temperature: f64,
}

/// OpenAI-shaped completion object, the standard shim every Ollama-fronting
/// adapter in the retrieval pack provides.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionChoice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: &'static str,
}

impl ChatCompletionResponse {
    pub fn from_content(content: String) -> Self {
        Self {
            choices: vec![ChatCompletionChoice {
                index: 0,
                message: ChatMessage {
                    role: "assistant".to_string(),
                    content,
                },
                finish_reason: "stop",
            }],
        }
    }
}
