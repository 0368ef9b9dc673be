//! Core data model: requests, capability records, strategies, responses, and
//! results shared by every component.

use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How deep an answer should go. Drives prompt length directives, per-model
/// timeout budgets, and synthesis length caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    #[default]
    Medium,
    Complex,
}

/// The angle a question should be answered from. Used to bias model
/// selection and the synthesis's closing takeaway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum Focus {
    Technical,
    Business,
    Ethical,
    Creative,
    #[default]
    General,
}

/// Coarse capability class derived from estimated parameter count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Fast,
    Balanced,
    Quality,
}

impl Tier {
    /// Timeout multiplier applied to the base per-complexity budget.
    pub fn timeout_multiplier(&self) -> f64 {
        match self {
            Tier::Fast => 1.0,
            Tier::Balanced => 1.5,
            Tier::Quality => 3.0,
        }
    }
}

fn default_temperature() -> f64 {
    0.7
}

/// A single research question, as received from the MCP tool call.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ResearchRequest {
    /// The natural-language question to research.
    pub question: String,
    /// How deep the answer should go. Defaults to `medium`.
    #[serde(default)]
    pub complexity: Complexity,
    /// The angle to answer from. Defaults to `general`.
    #[serde(default)]
    pub focus: Focus,
    /// Explicit model names, bypassing automatic selection.
    #[serde(default)]
    pub models: Option<Vec<String>>,
    /// Dispatch all selected models concurrently instead of sequentially.
    #[serde(default)]
    pub parallel: bool,
    /// Include per-model metadata (parameters, tier, prompt size) in responses.
    #[serde(default)]
    pub include_metadata: bool,
    /// Sampling temperature in [0, 2]. Defaults to 0.7.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Override the computed per-model timeout budget, in milliseconds.
    /// Must be in `[1_000, 600_000]` when given.
    #[serde(default)]
    pub timeout: Option<u64>,
}

impl ResearchRequest {
    pub const MIN_TIMEOUT_MS: u64 = 1_000;
    pub const MAX_TIMEOUT_MS: u64 = 600_000;

    /// Validate field invariants. Returns the first violation found.
    pub fn validate(&self) -> Result<(), String> {
        if self.question.trim().is_empty() {
            return Err("question must not be empty".to_string());
        }
        if !(0.0..=2.0).contains(&self.temperature) || self.temperature.is_nan() {
            return Err(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            ));
        }
        if let Some(t) = self.timeout
            && !(Self::MIN_TIMEOUT_MS..=Self::MAX_TIMEOUT_MS).contains(&t)
        {
            return Err(format!(
                "timeout must be between {} and {} ms, got {t}",
                Self::MIN_TIMEOUT_MS,
                Self::MAX_TIMEOUT_MS
            ));
        }
        Ok(())
    }
}

/// Derived, deterministic capability record for one installed model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelCapabilities {
    pub name: String,
    pub size_bytes: u64,
    pub parameters: u64,
    pub tier: Tier,
    pub timeout_multiplier: f64,
    pub complexity_fit: BTreeSet<Complexity>,
    pub focus_fit: BTreeSet<Focus>,
}

/// Selected models for one research request, in priority order.
#[derive(Debug, Clone, Default)]
pub struct ModelStrategy {
    pub primary: Option<ModelCapabilities>,
    pub secondary: Option<ModelCapabilities>,
    pub tertiary: Option<ModelCapabilities>,
}

impl ModelStrategy {
    /// Filled slots in dispatch order.
    pub fn slots(&self) -> Vec<&ModelCapabilities> {
        [&self.primary, &self.secondary, &self.tertiary]
            .into_iter()
            .flatten()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_none()
    }
}

/// Per-model metadata attached to a `ModelResponse` when `include_metadata` is set.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseMetadata {
    pub parameters: u64,
    pub tier: Tier,
    pub prompt_bytes: usize,
}

/// One model's outcome for a research request.
#[derive(Debug, Clone, Serialize)]
pub struct ModelResponse {
    pub model: String,
    pub response: String,
    pub response_time: u64,
    pub token_count: u64,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResponseMetadata>,
    /// The dispatched model's tier. Always populated by the executor,
    /// independent of `include_metadata` — the analyzer's confidence
    /// calibration needs it even when the caller didn't ask for metadata
    /// in the wire response. Not part of the public JSON shape.
    #[serde(skip)]
    pub tier: Tier,
    /// The per-model timeout budget (ms) this dispatch was given — the
    /// `maxBudget` the analyzer's timeliness penalty compares observed
    /// latency against. Always populated by the executor, not part of the
    /// public JSON shape.
    #[serde(skip)]
    pub budget_ms: u64,
}

impl ModelResponse {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn has_usable_text(&self) -> bool {
        self.error.is_none() && !self.response.trim().is_empty()
    }
}

/// The composed outcome of a research request.
#[derive(Debug, Clone, Serialize)]
pub struct ResearchResult {
    pub question: String,
    pub responses: Vec<ModelResponse>,
    pub convergent_themes: Vec<String>,
    pub divergent_perspectives: Vec<String>,
    pub synthesis: String,
    pub confidence: f64,
    pub execution_time: u64,
}

/// `healthCheck()` result.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: HealthState,
    pub models: usize,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Unhealthy,
}
