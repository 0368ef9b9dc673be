use std::env;

/// Default Ollama host, used when `OLLAMA_HOST` is unset.
pub const DEFAULT_OLLAMA_HOST: &str = "http://127.0.0.1:11434";

pub struct Config {
    pub ollama_host: String,
}

impl Config {
    pub fn from_env() -> Self {
        let ollama_host = env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_OLLAMA_HOST.to_string());
        if env::var("OLLAMA_HOST").is_err() {
            tracing::debug!("OLLAMA_HOST not set — defaulting to {DEFAULT_OLLAMA_HOST}");
        }
        Self { ollama_host }
    }
}
