//! Model Capability Registry: parses the upstream listing into typed,
//! deterministic capability records and memoizes the result for the process
//! lifetime until `refresh()` is called again.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;

use crate::client::OllamaClient;
use crate::error::ResearchError;
use crate::model::{Complexity, Focus, ModelCapabilities, Tier};

/// 1 parameter ≈ 1 byte at Q4 quantization is the rule of thumb; in practice
/// Q4 stores ~0.5 bytes/parameter, so byte count × 2 approximates parameter
/// count when no name-encoded size is available.
const BYTES_TO_PARAMS_MULTIPLIER: u64 = 2;

const FAST_MAX_PARAMS: u64 = 3_000_000_000;
const BALANCED_MAX_PARAMS: u64 = 15_000_000_000;

const TECHNICAL_MARKERS: &[&str] = &["code", "coder", "instruct", "deepseek"];
const CREATIVE_MARKERS: &[&str] = &["mistral", "llama3"];

pub struct Registry {
    client: Arc<dyn OllamaClient>,
    cache: Mutex<Option<Vec<ModelCapabilities>>>,
}

impl Registry {
    pub fn new(client: Arc<dyn OllamaClient>) -> Self {
        Self {
            client,
            cache: Mutex::new(None),
        }
    }

    /// Return the cached listing if present, else fetch and classify.
    pub async fn ensure_loaded(&self) -> Result<Vec<ModelCapabilities>, ResearchError> {
        if let Some(cached) = self.cached() {
            return Ok(cached);
        }
        self.refresh().await
    }

    pub fn cached(&self) -> Option<Vec<ModelCapabilities>> {
        self.cache.lock().unwrap().clone()
    }

    /// Force a fresh upstream listing, reclassify, and replace the cache.
    /// Entries absent from the new listing are dropped (invalidated).
    pub async fn refresh(&self) -> Result<Vec<ModelCapabilities>, ResearchError> {
        let upstream = self.client.list_models().await?;

        let mut classified = Vec::with_capacity(upstream.len());
        for entry in upstream {
            if entry.name.trim().is_empty() {
                continue; // malformed entry, skip silently
            }
            classified.push(classify(&entry.name, entry.size));
        }

        *self.cache.lock().unwrap() = Some(classified.clone());
        Ok(classified)
    }

    pub fn get(&self, name: &str) -> Option<ModelCapabilities> {
        self.cached()?.into_iter().find(|m| m.name == name)
    }
}

/// Deterministically derive a `ModelCapabilities` record from a model name
/// and its reported byte size.
pub fn classify(name: &str, size_bytes: u64) -> ModelCapabilities {
    let name_lower = name.to_lowercase();
    let params_from_name = parse_param_suffix(&name_lower);

    let (parameters, recognized) = match params_from_name {
        Some(p) => (p, true),
        None if size_bytes > 0 => (size_bytes.saturating_mul(BYTES_TO_PARAMS_MULTIPLIER), true),
        None => (0, false),
    };

    if !recognized {
        // Unrecognized naming pattern and no size to estimate from: fall back
        // to the documented default classification.
        return ModelCapabilities {
            name: name.to_string(),
            size_bytes,
            parameters: 0,
            tier: Tier::Balanced,
            timeout_multiplier: Tier::Balanced.timeout_multiplier(),
            complexity_fit: BTreeSet::from([Complexity::Medium]),
            focus_fit: BTreeSet::from([Focus::General]),
        };
    }

    let tier = tier_for(parameters);
    let complexity_fit = complexity_fit_for(tier);
    let focus_fit = focus_fit_for(&name_lower, tier);

    ModelCapabilities {
        name: name.to_string(),
        size_bytes,
        parameters,
        tier,
        timeout_multiplier: tier.timeout_multiplier(),
        complexity_fit,
        focus_fit,
    }
}

fn tier_for(parameters: u64) -> Tier {
    if parameters <= FAST_MAX_PARAMS {
        Tier::Fast
    } else if parameters <= BALANCED_MAX_PARAMS {
        Tier::Balanced
    } else {
        Tier::Quality
    }
}

fn complexity_fit_for(tier: Tier) -> BTreeSet<Complexity> {
    match tier {
        Tier::Fast => BTreeSet::from([Complexity::Simple, Complexity::Medium]),
        Tier::Balanced => BTreeSet::from([Complexity::Simple, Complexity::Medium, Complexity::Complex]),
        Tier::Quality => BTreeSet::from([Complexity::Medium, Complexity::Complex]),
    }
}

fn focus_fit_for(name_lower: &str, tier: Tier) -> BTreeSet<Focus> {
    let mut fit = BTreeSet::from([Focus::General]);

    if TECHNICAL_MARKERS.iter().any(|m| name_lower.contains(m))
        || (name_lower.contains("qwen") && name_lower.contains("coder"))
    {
        fit.insert(Focus::Technical);
    }
    if CREATIVE_MARKERS.iter().any(|m| name_lower.contains(m)) {
        fit.insert(Focus::Creative);
    }
    if matches!(tier, Tier::Balanced | Tier::Quality) {
        fit.insert(Focus::Ethical);
        fit.insert(Focus::Business);
    }

    fit
}

/// Parse a trailing parameter-count suffix out of a model name, e.g.
/// `"llama3.2:1b"`, `"qwen2.5-coder:7b-instruct"`, `"llama3.1:70b"`.
/// Returns the estimated parameter count, or `None` if no suffix is found.
fn parse_param_suffix(name_lower: &str) -> Option<u64> {
    let tokens = name_lower.split(|c: char| !c.is_ascii_alphanumeric() && c != '.');

    let mut best: Option<u64> = None;
    for token in tokens {
        if let Some(value) = parse_size_token(token) {
            best = Some(value);
        }
    }
    best
}

/// Parse a single token like `"7b"`, `"1.5b"`, `"400m"` into a parameter count.
fn parse_size_token(token: &str) -> Option<u64> {
    let token = token.trim();
    if token.len() < 2 {
        return None;
    }
    let (digits, suffix) = token.split_at(token.len() - 1);
    let multiplier: f64 = match suffix {
        "b" | "B" => 1_000_000_000.0,
        "m" | "M" => 1_000_000.0,
        _ => return None,
    };
    let value: f64 = digits.parse().ok()?;
    if value <= 0.0 {
        return None;
    }
    Some((value * multiplier) as u64)
}
