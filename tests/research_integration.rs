use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use ollama_research_mcp::client::{GenerateOptions, GenerateResult, ModelMetadata, OllamaClient, UpstreamModel};
use ollama_research_mcp::error::ResearchError;
use ollama_research_mcp::model::{Complexity, Focus, ResearchRequest};
use ollama_research_mcp::orchestrator::ResearchOrchestrator;
use ollama_research_mcp::registry;

/// In-memory double standing in for a live Ollama host: models, per-model
/// response text, and an optional artificial delay.
struct FixtureClient {
    models: Vec<UpstreamModel>,
    texts: Mutex<std::collections::HashMap<String, String>>,
    delay_ms: u64,
    call_count: AtomicU64,
}

impl FixtureClient {
    fn new(models: Vec<UpstreamModel>) -> Self {
        Self {
            models,
            texts: Mutex::new(std::collections::HashMap::new()),
            delay_ms: 0,
            call_count: AtomicU64::new(0),
        }
    }

    fn with_text(self, model: &str, text: &str) -> Self {
        self.texts.lock().unwrap().insert(model.to_string(), text.to_string());
        self
    }

    fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

#[async_trait]
impl OllamaClient for FixtureClient {
    async fn list_models(&self) -> Result<Vec<UpstreamModel>, ResearchError> {
        Ok(self.models.clone())
    }

    async fn describe_model(&self, _name: &str) -> Result<ModelMetadata, ResearchError> {
        Ok(ModelMetadata::default())
    }

    async fn generate(&self, name: &str, _prompt: &str, options: GenerateOptions) -> Result<GenerateResult, ResearchError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
        if options.timeout < Duration::from_millis(self.delay_ms) {
            return Err(ResearchError::Timeout(options.timeout.as_millis() as u64));
        }
        let text = self
            .texts
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_else(|| format!("Generic answer from {name} with reasonable length of text."));
        Ok(GenerateResult {
            text,
            tokens_produced: None,
            latency_ms: self.delay_ms,
        })
    }
}

fn three_tier_models() -> Vec<UpstreamModel> {
    vec![
        UpstreamModel { name: "llama3.2:1b".to_string(), size: 1_200_000_000, digest: "d1".to_string() },
        UpstreamModel { name: "qwen2.5-coder:7b-instruct".to_string(), size: 4_500_000_000, digest: "d2".to_string() },
        UpstreamModel { name: "llama3.1:70b".to_string(), size: 40_000_000_000, digest: "d3".to_string() },
    ]
}

fn research_request(question: &str) -> ResearchRequest {
    ResearchRequest {
        question: question.to_string(),
        complexity: Complexity::Medium,
        focus: Focus::Technical,
        models: None,
        parallel: true,
        include_metadata: true,
        temperature: 0.7,
        timeout: None,
    }
}

// Property 1: classification determinism across repeated calls.
#[test]
fn classification_is_deterministic_across_calls() {
    let a = registry::classify("llama3.1:70b", 40_000_000_000);
    let b = registry::classify("llama3.1:70b", 40_000_000_000);
    assert_eq!(a, b);
}

// Property 2: tier bounds hold for the boundary cases.
#[test]
fn tier_bounds_hold_at_boundaries() {
    let fast = registry::classify("x:3b", 0);
    assert!(fast.parameters <= 3_000_000_000);
    let quality = registry::classify("x:16b", 0);
    assert!(quality.parameters > 15_000_000_000);
}

// Scenario A + properties 3/4/5: diverse strategy, response ordering,
// nonempty synthesis with positive confidence.
#[tokio::test]
async fn scenario_a_end_to_end_diverse_strategy() {
    let client = Arc::new(
        FixtureClient::new(three_tier_models())
            .with_text("llama3.2:1b", "AI speeds up prototyping but needs human review for correctness.")
            .with_text(
                "qwen2.5-coder:7b-instruct",
                "AI assists software development through code completion and architecture suggestions.",
            )
            .with_text(
                "llama3.1:70b",
                "The impact of AI on software development includes faster iteration and new architecture patterns.",
            ),
    );
    let orchestrator = ResearchOrchestrator::new(client);
    let result = orchestrator
        .execute_research(research_request("What is the impact of AI on software development?"))
        .await
        .expect("research should succeed");

    assert_eq!(result.responses.len(), 3);
    assert!(!result.convergent_themes.is_empty());
    assert!(result.synthesis.contains("AI"));

    // Response ordering matches dispatch order, i.e. the tier-diversified strategy.
    let names: Vec<&str> = result.responses.iter().map(|r| r.model.as_str()).collect();
    let unique: std::collections::HashSet<&str> = names.iter().copied().collect();
    assert_eq!(names.len(), unique.len());
}

// Scenario B: unknown explicit model name fails with NotFound.
#[tokio::test]
async fn scenario_b_unknown_explicit_model_not_found() {
    let client = Arc::new(FixtureClient::new(three_tier_models()));
    let orchestrator = ResearchOrchestrator::new(client);
    let mut req = research_request("X");
    req.models = Some(vec!["nonexistent:latest".to_string()]);
    let err = orchestrator.execute_research(req).await.unwrap_err();
    assert!(matches!(err, ResearchError::NotFound(_)));
}

// Scenario C + property 7: a tight explicit timeout shorter than the
// fixture's delay surfaces as Timeout on every response, and the
// orchestrator call itself returns promptly rather than hanging for the
// full delay.
#[tokio::test]
async fn scenario_c_timeout_yields_insufficient_result() {
    let client = Arc::new(FixtureClient::new(three_tier_models()).with_delay(400));
    let orchestrator = ResearchOrchestrator::new(client);
    let mut req = research_request("Q");
    req.timeout = Some(50);
    req.complexity = Complexity::Simple;

    let result = orchestrator.execute_research(req).await.expect("should not hard-fail");
    assert!(result.responses.iter().all(|r| r.error.as_deref() == Some("Timeout")));
    assert!(result.synthesis.starts_with("insufficient"));
    assert_eq!(result.confidence, 0.0);
}

// Scenario D: empty listing fails research, but health_check distinguishes
// "reachable, empty" from "unreachable".
#[tokio::test]
async fn scenario_d_empty_listing_unavailable_but_healthy() {
    let client = Arc::new(FixtureClient::new(Vec::new()));
    let orchestrator = ResearchOrchestrator::new(client);
    let err = orchestrator.execute_research(research_request("Q")).await.unwrap_err();
    assert!(matches!(err, ResearchError::Unavailable(_)));

    let health = orchestrator.health_check().await;
    assert_eq!(health.models, 0);
}

// Scenario E: a single installed model still completes a request even when
// the complexity filter would otherwise exclude it.
#[tokio::test]
async fn scenario_e_single_model_listing_falls_back() {
    let client = Arc::new(FixtureClient::new(vec![UpstreamModel {
        name: "llama3.2:1b".to_string(),
        size: 1_200_000_000,
        digest: "d1".to_string(),
    }]));
    let orchestrator = ResearchOrchestrator::new(client);
    let mut req = research_request("Q");
    req.complexity = Complexity::Complex;
    let result = orchestrator.execute_research(req).await.expect("fallback should succeed");
    assert_eq!(result.responses.len(), 1);
}

// Scenario F + property 6: genuinely divergent responses produce at least
// one divergent perspective and a contrastive synthesis, with confidence
// still bounded.
#[tokio::test]
async fn scenario_f_divergent_responses_yield_perspectives() {
    let client = Arc::new(
        FixtureClient::new(vec![
            UpstreamModel { name: "model-a:7b".to_string(), size: 4_000_000_000, digest: "a".to_string() },
            UpstreamModel { name: "model-b:7b".to_string(), size: 4_000_000_000, digest: "b".to_string() },
        ])
        .with_text("model-a:7b", "Remote work dramatically benefits employee flexibility and autonomy in scheduling.")
        .with_text("model-b:7b", "Quantum cryptography relies on entanglement properties unrelated to office policy."),
    );
    let orchestrator = ResearchOrchestrator::new(client);
    let mut req = research_request("Q");
    req.models = Some(vec!["model-a:7b".to_string(), "model-b:7b".to_string()]);
    let result = orchestrator.execute_research(req).await.expect("should succeed");

    assert!(!result.divergent_perspectives.is_empty());
    assert!(result.confidence <= 0.95);
    let has_contrastive = ["however", "although", "while", "but"]
        .iter()
        .any(|c| result.synthesis.to_lowercase().contains(c));
    assert!(has_contrastive);
}

// Property 8: health_check never raises even against an always-failing client.
#[tokio::test]
async fn health_check_never_raises_when_unreachable() {
    struct Unreachable;
    #[async_trait]
    impl OllamaClient for Unreachable {
        async fn list_models(&self) -> Result<Vec<UpstreamModel>, ResearchError> {
            Err(ResearchError::Unavailable("connection refused".to_string()))
        }
        async fn describe_model(&self, _name: &str) -> Result<ModelMetadata, ResearchError> {
            Err(ResearchError::Unavailable("connection refused".to_string()))
        }
        async fn generate(&self, _: &str, _: &str, _: GenerateOptions) -> Result<GenerateResult, ResearchError> {
            Err(ResearchError::Unavailable("connection refused".to_string()))
        }
    }
    let orchestrator = ResearchOrchestrator::new(Arc::new(Unreachable));
    let health = orchestrator.health_check().await;
    assert_eq!(health.models, 0);
    assert!(!health.message.is_empty());
}

// Execution wall-clock should roughly track the explicit per-model timeout
// in parallel mode, not the sum of per-model delays.
#[tokio::test]
async fn parallel_dispatch_does_not_serialize_delays() {
    let client = Arc::new(FixtureClient::new(three_tier_models()).with_delay(50));
    let orchestrator = ResearchOrchestrator::new(client);
    let mut req = research_request("Q");
    req.parallel = true;

    let start = Instant::now();
    let result = orchestrator.execute_research(req).await.expect("should succeed");
    let elapsed = start.elapsed();

    assert_eq!(result.responses.len(), 3);
    assert!(elapsed < Duration::from_millis(3 * 50 + 200), "parallel dispatch took {elapsed:?}, looks serialized");
}
