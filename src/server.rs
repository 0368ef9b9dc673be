use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo};
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};

use crate::client::{GenerateOptions, HttpOllamaClient, OllamaClient};
use crate::config::Config;
use crate::executor;
use crate::model::{Complexity, ResearchRequest};
use crate::orchestrator::ResearchOrchestrator;
use crate::registry::Registry;
use crate::tools::passthrough::{
    ChatCompletionRequest, ChatCompletionResponse, PullModelRequest, PushModelRequest,
    RemoveModelRequest, RunRequest, RunResponse, ShowModelRequest,
};
use crate::tools::research::HealthCheckRequest;

#[derive(Clone)]
pub struct OllamaResearchServer {
    orchestrator: Arc<ResearchOrchestrator>,
    client: Arc<dyn OllamaClient>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl OllamaResearchServer {
    pub fn new(config: Config) -> Self {
        let client: Arc<dyn OllamaClient> = Arc::new(HttpOllamaClient::new(config.ollama_host));
        let orchestrator = Arc::new(ResearchOrchestrator::new(client.clone()));
        Self {
            orchestrator,
            client,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        name = "research",
        description = "Research a question across multiple locally installed models: selects a capability-diverse subset, dispatches in parallel or sequentially, and synthesizes the responses into convergent themes, divergent perspectives, and a confidence-scored answer. Use `list` first to see installed models.",
        annotations(read_only_hint = true)
    )]
    async fn research(
        &self,
        Parameters(req): Parameters<ResearchRequest>,
    ) -> Result<CallToolResult, McpError> {
        match self.orchestrator.execute_research(req).await {
            Ok(result) => json_result(&result),
            Err(e) => {
                tracing::warn!("research failed: {e}");
                Err(McpError::invalid_params(e.user_message(), None))
            }
        }
    }

    #[tool(
        name = "health",
        description = "Check whether the upstream model host is reachable and how many models it reports.",
        annotations(read_only_hint = true)
    )]
    async fn health(&self, Parameters(_req): Parameters<HealthCheckRequest>) -> Result<CallToolResult, McpError> {
        let status = self.orchestrator.health_check().await;
        json_result(&status)
    }

    #[tool(
        name = "list",
        description = "List locally installed models, one per line as `<name>\\t<size in GB>`.",
        annotations(read_only_hint = true)
    )]
    async fn list(&self) -> Result<CallToolResult, McpError> {
        let registry: &Arc<Registry> = self.orchestrator.registry();
        let models = registry
            .ensure_loaded()
            .await
            .map_err(|e| McpError::internal_error(e.user_message(), None))?;

        let mut lines: Vec<String> = models
            .iter()
            .map(|m| format!("{}\t{:.1}", m.name, m.size_bytes as f64 / 1_000_000_000.0))
            .collect();
        lines.sort();

        Ok(CallToolResult::success(vec![Content::text(lines.join("\n"))]))
    }

    #[tool(
        name = "show",
        description = "Show raw metadata for one installed model (forwards to /api/show).",
        annotations(read_only_hint = true)
    )]
    async fn show(&self, Parameters(req): Parameters<ShowModelRequest>) -> Result<CallToolResult, McpError> {
        match self.client.show_raw(&req.name).await {
            Ok(value) => json_result(&value),
            Err(e) => Err(McpError::invalid_params(e.user_message(), None)),
        }
    }

    #[tool(
        name = "pull",
        description = "Pull a model from the upstream model library (forwards to /api/pull, non-streaming)."
    )]
    async fn pull(&self, Parameters(req): Parameters<PullModelRequest>) -> Result<CallToolResult, McpError> {
        match self.client.pull_model(&req.name).await {
            Ok(value) => json_result(&value),
            Err(e) => Err(McpError::internal_error(e.user_message(), None)),
        }
    }

    #[tool(
        name = "push",
        description = "Push a local model to its upstream library (forwards to /api/push, non-streaming)."
    )]
    async fn push(&self, Parameters(req): Parameters<PushModelRequest>) -> Result<CallToolResult, McpError> {
        match self.client.push_model(&req.name).await {
            Ok(value) => json_result(&value),
            Err(e) => Err(McpError::internal_error(e.user_message(), None)),
        }
    }

    #[tool(
        name = "remove",
        description = "Remove a locally installed model (forwards to /api/delete)."
    )]
    async fn remove(&self, Parameters(req): Parameters<RemoveModelRequest>) -> Result<CallToolResult, McpError> {
        match self.client.remove_model(&req.name).await {
            Ok(()) => Ok(CallToolResult::success(vec![Content::text(format!("removed {}", req.name))])),
            Err(e) => Err(McpError::invalid_params(e.user_message(), None)),
        }
    }

    #[tool(
        name = "run",
        description = "Single-shot generate against one named model — the one-model case of `research`, with no theme or divergence analysis.",
        annotations(read_only_hint = true)
    )]
    async fn run(&self, Parameters(req): Parameters<RunRequest>) -> Result<CallToolResult, McpError> {
        let registry: &Arc<Registry> = self.orchestrator.registry();
        let tier = registry
            .ensure_loaded()
            .await
            .ok()
            .and_then(|_| registry.get(&req.model))
            .map(|m| m.tier)
            .unwrap_or(crate::model::Tier::Balanced);

        let budget = executor::per_model_budget(Complexity::Medium, tier, req.timeout);
        let start = std::time::Instant::now();

        let options = GenerateOptions {
            temperature: req.temperature,
            timeout: budget,
        };

        match self.client.generate(&req.model, &req.prompt, options).await {
            Ok(result) => {
                let response = RunResponse {
                    model: req.model,
                    response: result.text,
                    response_time: result.latency_ms.max(start.elapsed().as_millis() as u64),
                    token_count: result.tokens_produced.unwrap_or(0),
                };
                json_result(&response)
            }
            Err(e) => {
                tracing::warn!("run failed for {}: {e}", req.model);
                Err(McpError::invalid_params(e.user_message(), None))
            }
        }
    }

    #[tool(
        name = "chat_completion",
        description = "OpenAI-compatible chat completion, forwarded to the upstream's /api/chat endpoint.",
        annotations(read_only_hint = true)
    )]
    async fn chat_completion(
        &self,
        Parameters(req): Parameters<ChatCompletionRequest>,
    ) -> Result<CallToolResult, McpError> {
        match self.client.chat_completion(&req.model, &req.messages, req.temperature).await {
            Ok(content) => json_result(&ChatCompletionResponse::from_content(content)),
            Err(e) => Err(McpError::invalid_params(e.user_message(), None)),
        }
    }
}

fn json_result<T: serde::Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string(value).map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[tool_handler]
impl ServerHandler for OllamaResearchServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "ollama-research-mcp".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(
                "ollama-research-mcp: multi-model research orchestration over a local Ollama host.\n\n\
                 Tools:\n\
                 - `research`: the main entry point. Ask one question, get back themes, divergent \
                 perspectives, a synthesis, and a calibrated confidence score drawn from a \
                 capability-diverse subset of installed models.\n\
                 - `health`: check whether the upstream host is reachable and how many models it reports.\n\
                 - `list`: list installed models with size.\n\
                 - `show` / `pull` / `push` / `remove`: thin forwards to the matching upstream \
                 model-management endpoint.\n\
                 - `run`: single-model generate, the one-model degenerate case of `research`.\n\
                 - `chat_completion`: OpenAI-compatible chat completion via the upstream's /api/chat.\n\n\
                 Workflow:\n\
                 1. Call `list` (or just call `research` — it loads the registry lazily on first use).\n\
                 2. Call `research` with a `complexity` and `focus` matched to the question; let \
                 automatic selection pick models, or pass `models` explicitly to pin a specific set.\n\
                 3. For a quick one-model check, use `run` instead."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
