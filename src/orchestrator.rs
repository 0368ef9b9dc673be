//! Research Orchestrator: validates the request, resolves the model set,
//! drives selection/execution/analysis, and assembles the result.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use crate::analyzer::{self, AnalysisInput};
use crate::client::OllamaClient;
use crate::error::ResearchError;
use crate::executor::ResearchExecutor;
use crate::history::PerformanceHistory;
use crate::model::{HealthState, HealthStatus, ModelCapabilities, ModelStrategy, ResearchRequest, ResearchResult};
use crate::registry::Registry;
use crate::selector::{self, SelectionCriteria};

pub struct ResearchOrchestrator {
    registry: Arc<Registry>,
    history: Arc<PerformanceHistory>,
    executor: ResearchExecutor,
    client: Arc<dyn OllamaClient>,
}

impl ResearchOrchestrator {
    pub fn new(client: Arc<dyn OllamaClient>) -> Self {
        let registry = Arc::new(Registry::new(client.clone()));
        let history = Arc::new(PerformanceHistory::new());
        let executor = ResearchExecutor::new(client.clone(), history.clone());
        Self {
            registry,
            history,
            executor,
            client,
        }
    }

    pub async fn execute_research(&self, request: ResearchRequest) -> Result<ResearchResult, ResearchError> {
        let start = Instant::now();

        request.validate().map_err(ResearchError::Validation)?;

        let available = match self.registry.cached() {
            Some(cached) => cached,
            None => self.registry.refresh().await?,
        };

        if available.is_empty() {
            return Err(ResearchError::Unavailable("no suitable models".to_string()));
        }

        let max_timeout_ms = request.timeout.unwrap_or(ResearchRequest::MAX_TIMEOUT_MS);

        let explicit_models = request.models.as_ref().filter(|names| !names.is_empty());
        let strategy = if let Some(names) = explicit_models {
            self.resolve_explicit_models(names, &available)?
        } else {
            let criteria = SelectionCriteria::new(request.complexity, request.focus, &available, max_timeout_ms);
            selector::select(&criteria, &self.history)
        };

        if strategy.is_empty() {
            return Err(ResearchError::Unavailable("no suitable models".to_string()));
        }

        let responses = self
            .executor
            .execute(
                &request.question,
                request.complexity,
                request.focus,
                request.temperature,
                &strategy,
                request.timeout,
                request.include_metadata,
                request.parallel,
            )
            .await;

        let analysis_input = AnalysisInput {
            question: &request.question,
            responses: &responses,
            focus: request.focus,
            complexity: request.complexity,
        };
        let analysis = analyzer::analyze(&analysis_input);

        Ok(ResearchResult {
            question: request.question,
            responses,
            convergent_themes: analysis.convergent_themes,
            divergent_perspectives: analysis.divergent_perspectives,
            synthesis: analysis.synthesis,
            confidence: analysis.confidence,
            execution_time: start.elapsed().as_millis() as u64,
        })
    }

    /// Resolve an explicit model list into a strategy, failing with
    /// `NotFound` if any requested name is missing from the registry.
    fn resolve_explicit_models(
        &self,
        names: &[String],
        available: &[ModelCapabilities],
    ) -> Result<ModelStrategy, ResearchError> {
        let known: HashSet<&str> = available.iter().map(|m| m.name.as_str()).collect();
        let missing: Vec<String> = names.iter().filter(|n| !known.contains(n.as_str())).cloned().collect();
        if !missing.is_empty() {
            return Err(ResearchError::NotFound(missing.join(", ")));
        }

        let mut slots = names.iter().filter_map(|n| available.iter().find(|m| &m.name == n).cloned());
        Ok(ModelStrategy {
            primary: slots.next(),
            secondary: slots.next(),
            tertiary: slots.next(),
        })
    }

    pub async fn health_check(&self) -> HealthStatus {
        match self.client.list_models().await {
            Ok(models) => HealthStatus {
                status: HealthState::Healthy,
                models: models.len(),
                message: if models.is_empty() {
                    "reachable, no models installed".to_string()
                } else {
                    format!("reachable, {} models installed", models.len())
                },
            },
            Err(e) => HealthStatus {
                status: HealthState::Unhealthy,
                models: 0,
                message: e.user_message(),
            },
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{GenerateOptions, GenerateResult, ModelMetadata, UpstreamModel};
    use crate::model::{Complexity, Focus};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct MockClient {
        models: Vec<UpstreamModel>,
        delay_ms: u64,
        fail_generate: bool,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl OllamaClient for MockClient {
        async fn list_models(&self) -> Result<Vec<UpstreamModel>, ResearchError> {
            Ok(self.models.clone())
        }

        async fn describe_model(&self, _name: &str) -> Result<ModelMetadata, ResearchError> {
            Ok(ModelMetadata::default())
        }

        async fn generate(
            &self,
            name: &str,
            _prompt: &str,
            options: GenerateOptions,
        ) -> Result<GenerateResult, ResearchError> {
            self.calls.lock().unwrap().push(name.to_string());
            if self.delay_ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
            }
            if options.timeout < std::time::Duration::from_millis(self.delay_ms) {
                return Err(ResearchError::Timeout(options.timeout.as_millis() as u64));
            }
            if self.fail_generate {
                return Err(ResearchError::Upstream("boom".to_string()));
            }
            Ok(GenerateResult {
                text: format!("Response from {name} about the impact of AI on software engineering practice."),
                tokens_produced: Some(20),
                latency_ms: self.delay_ms,
            })
        }
    }

    fn models_abc() -> Vec<UpstreamModel> {
        vec![
            UpstreamModel { name: "llama3.2:1b".to_string(), size: 1_200_000_000, digest: "a".to_string() },
            UpstreamModel { name: "qwen2.5-coder:7b-instruct".to_string(), size: 4_500_000_000, digest: "b".to_string() },
            UpstreamModel { name: "llama3.1:70b".to_string(), size: 40_000_000_000, digest: "c".to_string() },
        ]
    }

    fn request(question: &str) -> ResearchRequest {
        ResearchRequest {
            question: question.to_string(),
            complexity: Complexity::Medium,
            focus: Focus::Technical,
            models: None,
            parallel: false,
            include_metadata: false,
            temperature: 0.7,
            timeout: None,
        }
    }

    #[tokio::test]
    async fn scenario_a_diverse_strategy_and_nonempty_synthesis() {
        let client = Arc::new(MockClient {
            models: models_abc(),
            delay_ms: 0,
            fail_generate: false,
            calls: Mutex::new(Vec::new()),
        });
        let orchestrator = ResearchOrchestrator::new(client);
        let req = request("What is the impact of AI on software development?");
        let result = orchestrator.execute_research(req).await.unwrap();
        assert_eq!(result.responses.len(), 3);
        assert!(!result.convergent_themes.is_empty());
        assert!(result.synthesis.contains("AI") || result.synthesis.contains("impact"));
    }

    #[tokio::test]
    async fn scenario_b_unknown_model_fails_not_found() {
        let client = Arc::new(MockClient {
            models: models_abc(),
            delay_ms: 0,
            fail_generate: false,
            calls: Mutex::new(Vec::new()),
        });
        let orchestrator = ResearchOrchestrator::new(client);
        let mut req = request("X");
        req.models = Some(vec!["nonexistent:latest".to_string()]);
        let err = orchestrator.execute_research(req).await.unwrap_err();
        assert!(matches!(err, ResearchError::NotFound(_)));
        assert!(err.user_message().contains("nonexistent:latest"));
    }

    #[tokio::test]
    async fn scenario_c_timeout_yields_insufficient_result() {
        let client = Arc::new(MockClient {
            models: models_abc(),
            delay_ms: 500,
            fail_generate: false,
            calls: Mutex::new(Vec::new()),
        });
        let orchestrator = ResearchOrchestrator::new(client);
        let mut req = request("Q");
        req.timeout = Some(100);
        req.complexity = Complexity::Simple;
        let result = orchestrator.execute_research(req).await.unwrap();
        assert!(result.responses.iter().all(|r| r.error.as_deref() == Some("Timeout")));
        assert!(result.synthesis.starts_with("insufficient"));
        assert_eq!(result.confidence, 0.0);
    }

    #[tokio::test]
    async fn scenario_d_empty_registry_unavailable() {
        let client = Arc::new(MockClient {
            models: Vec::new(),
            delay_ms: 0,
            fail_generate: false,
            calls: Mutex::new(Vec::new()),
        });
        let orchestrator = ResearchOrchestrator::new(client);
        let err = orchestrator.execute_research(request("Q")).await.unwrap_err();
        assert!(matches!(err, ResearchError::Unavailable(_)));

        let health = orchestrator.health_check().await;
        assert_eq!(health.status, HealthState::Healthy);
        assert_eq!(health.models, 0);
    }

    #[tokio::test]
    async fn scenario_e_single_model_fallback_has_only_primary() {
        let client = Arc::new(MockClient {
            models: vec![UpstreamModel { name: "llama3.2:1b".to_string(), size: 1_200_000_000, digest: "a".to_string() }],
            delay_ms: 0,
            fail_generate: false,
            calls: Mutex::new(Vec::new()),
        });
        let orchestrator = ResearchOrchestrator::new(client);
        let mut req = request("Q");
        req.complexity = Complexity::Complex;
        let result = orchestrator.execute_research(req).await.unwrap();
        assert_eq!(result.responses.len(), 1);
    }

    #[tokio::test]
    async fn empty_explicit_model_list_falls_back_to_selector() {
        let client = Arc::new(MockClient {
            models: models_abc(),
            delay_ms: 0,
            fail_generate: false,
            calls: Mutex::new(Vec::new()),
        });
        let orchestrator = ResearchOrchestrator::new(client);
        let mut req = request("Q");
        req.models = Some(Vec::new());
        let result = orchestrator.execute_research(req).await.unwrap();
        assert!(!result.responses.is_empty());
    }

    #[tokio::test]
    async fn health_check_reports_unhealthy_when_unreachable() {
        struct AlwaysFails;
        #[async_trait]
        impl OllamaClient for AlwaysFails {
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
        let orchestrator = ResearchOrchestrator::new(Arc::new(AlwaysFails));
        let health = orchestrator.health_check().await;
        assert_eq!(health.status, HealthState::Unhealthy);
        assert_eq!(health.models, 0);
    }
}
