//! Wire glue for the `research` and `health` tools. The request/response
//! types themselves (`ResearchRequest`, `ResearchResult`, `HealthStatus`)
//! live in `model.rs`; this module only adds what the MCP boundary needs
//! and isn't otherwise part of the core data model.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Empty params for `health` — rmcp still wants a `Parameters<T>` type.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct HealthCheckRequest {}
