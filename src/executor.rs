//! Research Executor: prompt composition, per-model timeout budgeting, and
//! parallel/sequential dispatch with partial-failure handling.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;

use crate::client::{GenerateOptions, OllamaClient};
use crate::history::PerformanceHistory;
use crate::model::{Complexity, Focus, ModelCapabilities, ModelResponse, ModelStrategy, ResponseMetadata, Tier};

fn base_budget_ms(complexity: Complexity) -> u64 {
    match complexity {
        Complexity::Simple => 30_000,
        Complexity::Medium => 60_000,
        Complexity::Complex => 120_000,
    }
}

/// Per-model timeout budget: the request-level override if given, otherwise
/// `base(complexity) * tier.timeout_multiplier`.
pub fn per_model_budget(complexity: Complexity, tier: Tier, explicit_timeout_ms: Option<u64>) -> Duration {
    match explicit_timeout_ms {
        Some(ms) => Duration::from_millis(ms),
        None => {
            let ms = (base_budget_ms(complexity) as f64 * tier.timeout_multiplier()) as u64;
            Duration::from_millis(ms)
        }
    }
}

/// Build the prompt sent to a given model: a focus-tailored instruction
/// stem, a complexity-tailored length directive, and (for fast-tier models)
/// a divergence hint.
pub fn compose_prompt(question: &str, complexity: Complexity, focus: Focus, tier: Tier) -> String {
    let focus_stem = match focus {
        Focus::Technical => "Answer from a technical implementation perspective, focusing on architecture, tradeoffs, and concrete mechanisms.",
        Focus::Business => "Answer from a business perspective, focusing on cost, value, and organizational impact.",
        Focus::Ethical => "Answer from an ethical perspective, focusing on risks, fairness, and societal tension.",
        Focus::Creative => "Answer from a creative perspective, exploring novel possibilities and unconventional framings.",
        Focus::General => "Answer with a balanced, general-audience perspective.",
    };

    let length_directive = match complexity {
        Complexity::Simple => "Give a concise answer in 2-4 sentences.",
        Complexity::Medium => "Give a structured answer, organized as a single focused paragraph.",
        Complexity::Complex => "Give a multi-paragraph analysis, including relevant caveats and edge cases.",
    };

    let mut prompt = format!("{focus_stem}\n{length_directive}\n\nQuestion: {question}");

    if tier == Tier::Fast {
        prompt.push_str(
            "\n\nProvide your own distinct angle on this question rather than a generic summary.",
        );
    }

    prompt
}

/// Effective sampling temperature for a model: fast-tier models get a small
/// bump to avoid echoing larger siblings verbatim.
pub fn effective_temperature(requested: f64, tier: Tier) -> f64 {
    if tier == Tier::Fast {
        (requested + 0.15).min(2.0)
    } else {
        requested
    }
}

fn word_count_fallback(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

/// Heuristic per-response confidence input to the analyzer's aggregate
/// calibration: larger, faster, more substantial responses score higher,
/// clamped to a plausible range.
fn raw_model_confidence(tier: Tier, latency_ms: u64, budget_ms: u64, text_len: usize) -> f64 {
    let tier_base = match tier {
        Tier::Fast => 0.35,
        Tier::Balanced => 0.45,
        Tier::Quality => 0.55,
    };
    let timeliness = if budget_ms == 0 {
        0.0
    } else {
        (1.0 - (latency_ms as f64 / budget_ms as f64)).clamp(0.0, 1.0) * 0.1
    };
    let substance = if text_len >= 200 { 0.05 } else { 0.0 };
    (tier_base + timeliness + substance).clamp(0.0, 0.95)
}

pub struct ResearchExecutor {
    client: Arc<dyn OllamaClient>,
    history: Arc<PerformanceHistory>,
}

impl ResearchExecutor {
    pub fn new(client: Arc<dyn OllamaClient>, history: Arc<PerformanceHistory>) -> Self {
        Self { client, history }
    }

    /// Dispatch to every model in `strategy`, in parallel or sequentially,
    /// and return responses in dispatch order regardless of completion order.
    /// Non-error completions are recorded into performance history as a side effect.
    pub async fn execute(
        &self,
        question: &str,
        complexity: Complexity,
        focus: Focus,
        temperature: f64,
        strategy: &ModelStrategy,
        explicit_timeout_ms: Option<u64>,
        include_metadata: bool,
        parallel: bool,
    ) -> Vec<ModelResponse> {
        let models = strategy.slots();
        if models.is_empty() {
            return Vec::new();
        }

        let jobs: Vec<Job> = models
            .iter()
            .map(|m| self.build_job(question, complexity, focus, temperature, m, explicit_timeout_ms, include_metadata))
            .collect();

        let responses = if parallel {
            self.dispatch_parallel(jobs).await
        } else {
            self.dispatch_sequential(jobs).await
        };

        for response in &responses {
            self.record_success(response);
        }

        responses
    }

    fn build_job(
        &self,
        question: &str,
        complexity: Complexity,
        focus: Focus,
        temperature: f64,
        model: &ModelCapabilities,
        explicit_timeout_ms: Option<u64>,
        include_metadata: bool,
    ) -> Job {
        let budget = per_model_budget(complexity, model.tier, explicit_timeout_ms);
        let prompt = compose_prompt(question, complexity, focus, model.tier);
        let temp = effective_temperature(temperature, model.tier);
        Job {
            model: model.clone(),
            prompt,
            temperature: temp,
            budget,
            include_metadata,
        }
    }

    /// Run all jobs concurrently and await completion or failure of all.
    pub async fn dispatch_parallel(&self, jobs: Vec<Job>) -> Vec<ModelResponse> {
        let mut set = JoinSet::new();
        for (idx, job) in jobs.into_iter().enumerate() {
            let client = self.client.clone();
            set.spawn(async move {
                let response = run_job(client, job).await;
                (idx, response)
            });
        }

        let mut slots: Vec<Option<ModelResponse>> = Vec::new();
        while let Some(res) = set.join_next().await {
            if let Ok((idx, response)) = res {
                if slots.len() <= idx {
                    slots.resize(idx + 1, None);
                }
                slots[idx] = Some(response);
            }
        }

        slots.into_iter().flatten().collect()
    }

    /// Run jobs one at a time, in order; a slow or failing model does not
    /// abort later ones.
    pub async fn dispatch_sequential(&self, jobs: Vec<Job>) -> Vec<ModelResponse> {
        let mut responses = Vec::with_capacity(jobs.len());
        for job in jobs {
            let response = run_job(self.client.clone(), job).await;
            responses.push(response);
        }
        responses
    }

    /// Record a successful response's latency into performance history.
    pub fn record_success(&self, response: &ModelResponse) {
        if !response.is_error() {
            self.history.record(&response.model, response.response_time as f64);
        }
    }
}

pub struct Job {
    model: ModelCapabilities,
    prompt: String,
    temperature: f64,
    budget: Duration,
    include_metadata: bool,
}

async fn run_job(client: Arc<dyn OllamaClient>, job: Job) -> ModelResponse {
    let start = Instant::now();
    let prompt_bytes = job.prompt.len();
    let budget_ms = job.budget.as_millis() as u64;

    let options = GenerateOptions {
        temperature: job.temperature,
        timeout: job.budget,
    };

    match client.generate(&job.model.name, &job.prompt, options).await {
        Ok(result) => {
            let latency_ms = result.latency_ms.max(start.elapsed().as_millis() as u64);
            let token_count = result.tokens_produced.unwrap_or_else(|| word_count_fallback(&result.text));
            let confidence = raw_model_confidence(job.model.tier, latency_ms, budget_ms, result.text.len());
            ModelResponse {
                model: job.model.name.clone(),
                response: result.text,
                response_time: latency_ms,
                token_count,
                confidence,
                error: None,
                metadata: job.include_metadata.then_some(ResponseMetadata {
                    parameters: job.model.parameters,
                    tier: job.model.tier,
                    prompt_bytes,
                }),
                tier: job.model.tier,
                budget_ms,
            }
        }
        Err(e) => ModelResponse {
            model: job.model.name.clone(),
            response: String::new(),
            response_time: start.elapsed().as_millis() as u64,
            token_count: 0,
            confidence: 0.0,
            error: Some(e.kind().to_string()),
            metadata: job.include_metadata.then_some(ResponseMetadata {
                parameters: job.model.parameters,
                tier: job.model.tier,
                prompt_bytes,
            }),
            tier: job.model.tier,
            budget_ms,
        },
    }
}
