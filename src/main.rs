use rmcp::{ServiceExt, transport::stdio};

use ollama_research_mcp::config::Config;
use ollama_research_mcp::server::OllamaResearchServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    dotenvy::dotenv().ok();

    tracing::info!("ollama-research-mcp starting");

    let config = Config::from_env();
    let server = OllamaResearchServer::new(config);

    let service = server
        .serve(stdio())
        .await
        .inspect_err(|e| tracing::error!("serving error: {e:?}"))?;

    service.waiting().await?;

    tracing::info!("ollama-research-mcp shutting down");
    Ok(())
}
