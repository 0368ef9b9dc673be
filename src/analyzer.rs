//! Response Analyzer: theme extraction, divergence detection, synthesis
//! composition, and confidence calibration over a set of model responses to
//! one question.

use std::collections::{HashMap, HashSet};

use crate::model::{Complexity, Focus, ModelResponse, Tier};

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "if", "then", "else", "of", "to", "in", "on", "at",
    "for", "with", "by", "from", "as", "is", "are", "was", "were", "be", "been", "being", "it",
    "its", "this", "that", "these", "those", "i", "you", "he", "she", "we", "they", "them",
    "his", "her", "their", "our", "your", "my", "not", "no", "so", "such", "can", "could",
    "will", "would", "should", "may", "might", "must", "do", "does", "did", "has", "have",
    "had", "about", "into", "than", "too", "very", "also", "just", "more", "most", "some",
    "any", "all", "each", "other", "which", "what", "who", "whom", "how", "why", "when",
    "where", "there", "here", "up", "down", "out", "over", "under", "again", "further", "once",
    "only", "own", "same", "s", "t", "because", "while", "however", "although", "but", "yet",
];

const BENEFIT_MARKERS: &[&str] = &["benefit", "advantage", "improve", "opportunity", "gain", "positive"];
const RISK_MARKERS: &[&str] = &["risk", "danger", "concern", "threat", "harm", "negative", "downside"];
const TRADEOFF_MARKERS: &[&str] = &["tradeoff", "trade-off", "balance", "however", "although", "while", "but"];

const MAX_THEMES: usize = 8;
const MAX_PERSPECTIVES: usize = 6;
const DIVERGENCE_THRESHOLD: f64 = 0.55;
const CLUSTER_THRESHOLD: f64 = 0.7;

pub struct AnalysisInput<'a> {
    pub question: &'a str,
    pub responses: &'a [ModelResponse],
    pub focus: Focus,
    pub complexity: Complexity,
}

pub struct Analysis {
    pub convergent_themes: Vec<String>,
    pub divergent_perspectives: Vec<String>,
    pub synthesis: String,
    pub confidence: f64,
}

pub fn analyze(input: &AnalysisInput) -> Analysis {
    let surviving: Vec<&ModelResponse> = input
        .responses
        .iter()
        .filter(|r| r.has_usable_text())
        .collect();

    if surviving.is_empty() {
        return Analysis {
            convergent_themes: Vec::new(),
            divergent_perspectives: Vec::new(),
            synthesis: format!("insufficient responses were gathered to answer: {}", input.question),
            confidence: 0.0,
        };
    }

    let tokenized: Vec<Vec<String>> = surviving.iter().map(|r| tokenize(&r.response)).collect();

    let themes = extract_convergent_themes(&tokenized);
    let perspectives = detect_divergent_perspectives(&surviving, &tokenized, &themes);
    let synthesis = compose_synthesis(input.question, input.focus, input.complexity, &themes, &perspectives);
    let confidence = calibrate_confidence(input, &surviving, &themes);

    Analysis {
        convergent_themes: themes,
        divergent_perspectives: perspectives,
        synthesis,
        confidence,
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

fn is_purely_numeric(word: &str) -> bool {
    !word.is_empty() && word.chars().all(|c| c.is_ascii_digit())
}

/// Generate all n-gram candidates (length 1-3) for one response's token list.
fn candidate_ngrams(tokens: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for n in 1..=3 {
        if tokens.len() < n {
            continue;
        }
        for window in tokens.windows(n) {
            if n == 1 {
                let word = &window[0];
                if word.chars().count() < 4 || is_purely_numeric(word) {
                    continue;
                }
            } else {
                // Multi-word phrases must not lead/trail with a stopword and
                // must contain at least one non-stopword.
                if is_stopword(&window[0]) || is_stopword(&window[n - 1]) {
                    continue;
                }
                if window.iter().all(|w| is_stopword(w)) {
                    continue;
                }
            }
            out.push(window.join(" "));
        }
    }
    out
}

struct ThemeStats {
    doc_freq: usize,
    total_freq: usize,
    ngram_len: usize,
}

fn extract_convergent_themes(tokenized: &[Vec<String>]) -> Vec<String> {
    let n_responses = tokenized.len();
    let mut stats: HashMap<String, ThemeStats> = HashMap::new();

    for tokens in tokenized {
        let ngrams = candidate_ngrams(tokens);
        let mut seen_in_doc: HashSet<&str> = HashSet::new();
        for ngram in &ngrams {
            let len = ngram.split(' ').count();
            let entry = stats.entry(ngram.clone()).or_insert(ThemeStats {
                doc_freq: 0,
                total_freq: 0,
                ngram_len: len,
            });
            entry.total_freq += 1;
            if seen_in_doc.insert(ngram.as_str()) {
                entry.doc_freq += 1;
            }
        }
    }

    let threshold = if n_responses == 2 {
        2
    } else {
        n_responses.div_ceil(2)
    };

    let mut candidates: Vec<(&String, &ThemeStats)> = stats
        .iter()
        .filter(|(_, s)| s.doc_freq >= threshold)
        .collect();

    candidates.sort_by(|a, b| {
        b.1.doc_freq
            .cmp(&a.1.doc_freq)
            .then_with(|| b.1.ngram_len.cmp(&a.1.ngram_len))
            .then_with(|| b.1.total_freq.cmp(&a.1.total_freq))
            .then_with(|| a.0.cmp(b.0))
    });

    candidates
        .into_iter()
        .take(MAX_THEMES)
        .map(|(phrase, _)| title_case(phrase))
        .collect()
}

fn title_case(phrase: &str) -> String {
    phrase
        .split(' ')
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Bag-of-words vector, keyed by token, for cosine similarity.
fn bag_of_words(tokens: &[String]) -> HashMap<&str, f64> {
    let mut counts: HashMap<&str, f64> = HashMap::new();
    for t in tokens {
        *counts.entry(t.as_str()).or_insert(0.0) += 1.0;
    }
    counts
}

fn cosine_similarity(a: &HashMap<&str, f64>, b: &HashMap<&str, f64>) -> f64 {
    let mut dot = 0.0;
    for (k, va) in a {
        if let Some(vb) = b.get(k) {
            dot += va * vb;
        }
    }
    let norm_a: f64 = a.values().map(|v| v * v).sum::<f64>().sqrt();
    let norm_b: f64 = b.values().map(|v| v * v).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn first_sentence(text: &str) -> String {
    let trimmed = text.trim();
    let end = trimmed
        .find(['.', '!', '?'])
        .map(|i| i + 1)
        .unwrap_or(trimmed.len());
    trimmed[..end].trim().to_string()
}

fn perspective_qualifier(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    let benefit_hits = BENEFIT_MARKERS.iter().filter(|m| lower.contains(*m)).count();
    let risk_hits = RISK_MARKERS.iter().filter(|m| lower.contains(*m)).count();
    let tradeoff_hits = TRADEOFF_MARKERS.iter().filter(|m| lower.contains(*m)).count();

    if tradeoff_hits >= benefit_hits && tradeoff_hits >= risk_hits && tradeoff_hits > 0 {
        "Weighing the tradeoffs,"
    } else if risk_hits > benefit_hits {
        "Emphasizing the risks,"
    } else if benefit_hits > 0 {
        "Emphasizing the benefits,"
    } else {
        "From a distinct angle,"
    }
}

fn detect_divergent_perspectives(
    responses: &[&ModelResponse],
    tokenized: &[Vec<String>],
    themes: &[String],
) -> Vec<String> {
    let vectors: Vec<HashMap<&str, f64>> = tokenized.iter().map(|t| bag_of_words(t)).collect();
    let n = responses.len();

    let mut sim = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..n {
            if i != j {
                sim[i][j] = cosine_similarity(&vectors[i], &vectors[j]);
            }
        }
    }

    let mut perspectives = Vec::new();

    for i in 0..n {
        if n < 2 {
            break;
        }
        let max_sim = (0..n).filter(|&j| j != i).map(|j| sim[i][j]).fold(0.0_f64, f64::max);
        if max_sim < DIVERGENCE_THRESHOLD {
            let qualifier = perspective_qualifier(&responses[i].response);
            let sentence = first_sentence(&responses[i].response);
            perspectives.push(format!("{qualifier} {sentence}"));
        }
    }

    // Cluster by similarity >= CLUSTER_THRESHOLD; contrast clusters that
    // disagree on a convergent theme's presence.
    if n >= 2 && !themes.is_empty() {
        let mut cluster_id = vec![usize::MAX; n];
        let mut next_cluster = 0;
        for i in 0..n {
            if cluster_id[i] != usize::MAX {
                continue;
            }
            cluster_id[i] = next_cluster;
            for j in (i + 1)..n {
                if cluster_id[j] == usize::MAX && sim[i][j] >= CLUSTER_THRESHOLD {
                    cluster_id[j] = next_cluster;
                }
            }
            next_cluster += 1;
        }

        if next_cluster >= 2 {
            'themes: for theme in themes {
                let theme_lower = theme.to_lowercase();
                let mut cluster_has_theme: HashMap<usize, bool> = HashMap::new();
                for i in 0..n {
                    let text_lower = responses[i].response.to_lowercase();
                    let has = text_lower.contains(&theme_lower);
                    let entry = cluster_has_theme.entry(cluster_id[i]).or_insert(false);
                    *entry = *entry || has;
                }
                let with_theme = cluster_has_theme.values().filter(|v| **v).count();
                let without_theme = cluster_has_theme.values().filter(|v| !**v).count();
                if with_theme > 0 && without_theme > 0 {
                    perspectives.push(format!(
                        "While some responses converge on \"{theme}\", others build their answer without mentioning it — a genuine split in framing."
                    ));
                    break 'themes;
                }
            }
        }
    }

    perspectives.truncate(MAX_PERSPECTIVES);
    perspectives
}

fn compose_synthesis(
    question: &str,
    focus: Focus,
    complexity: Complexity,
    themes: &[String],
    perspectives: &[String],
) -> String {
    let mut parts: Vec<String> = Vec::new();

    parts.push(format!("Synthesizing across models on: \"{question}\"."));

    if !themes.is_empty() {
        let connectors = ["", " Also,", " Further,", " Also,", " Further,"];
        let mut clause = String::from(" The responses converge on");
        for (i, theme) in themes.iter().take(5).enumerate() {
            if i == 0 {
                clause.push_str(&format!(" {theme}"));
            } else {
                clause.push_str(&format!(",{} {theme}", connectors[i % connectors.len()]));
            }
        }
        clause.push('.');
        parts.push(clause);
    }

    if !perspectives.is_empty() {
        let contrastive = ["However,", "Although views align broadly,", "While most agree,", "But"];
        for (i, perspective) in perspectives.iter().take(3).enumerate() {
            parts.push(format!(" {} {perspective}", contrastive[i % contrastive.len()]));
        }
    }

    let takeaway = match focus {
        Focus::Technical => " In practice, this points to a concrete implementation choice worth validating against the codebase at hand.",
        Focus::Business => " For decision-makers, the practical impact is on cost, timeline, and organizational readiness.",
        Focus::Ethical => " The underlying tension is between capability and responsible deployment.",
        Focus::Creative => " This opens space for possibilities worth exploring further.",
        Focus::General => " In summary, the models' combined view offers a reasonably complete picture.",
    };
    parts.push(takeaway.to_string());

    let mut synthesis = parts.concat();

    let max_len = match complexity {
        Complexity::Simple => 400,
        Complexity::Medium => 900,
        Complexity::Complex => 1_800,
    };

    if synthesis.len() > max_len {
        synthesis = truncate_at_sentence(&synthesis, max_len);
    }

    synthesis
}

/// Truncate to at most `max_len` bytes without ending mid-sentence.
fn truncate_at_sentence(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }
    let mut boundary = max_len;
    while boundary > 0 && !text.is_char_boundary(boundary) {
        boundary -= 1;
    }
    let slice = &text[..boundary];
    if let Some(last_stop) = slice.rfind(['.', '!', '?']) {
        slice[..=last_stop].to_string()
    } else {
        slice.to_string()
    }
}

fn calibrate_confidence(input: &AnalysisInput, surviving: &[&ModelResponse], themes: &[String]) -> f64 {
    let n_survived = surviving.len();
    if n_survived == 0 {
        return 0.0;
    }

    let base = surviving.iter().map(|r| r.confidence).sum::<f64>() / n_survived as f64;

    let agreement_boost = 0.15 * (themes.len() as f64 / 4.0).min(1.0);

    let tiers: HashSet<Tier> = surviving.iter().map(|r| r.tier).collect();
    let diversity_boost = if n_survived >= 2 && tiers.len() >= 2 { 0.05 } else { 0.0 };

    let total = input.responses.len().max(1);
    let error_count = input.responses.iter().filter(|r| r.is_error()).count();
    let failure_penalty = 0.15 * (error_count as f64 / total as f64);

    let max_budget = surviving
        .iter()
        .map(|r| r.budget_ms as f64)
        .fold(0.0_f64, f64::max)
        .max(1.0);
    let mean_response_time = surviving.iter().map(|r| r.response_time as f64).sum::<f64>() / n_survived as f64;
    let timeliness_penalty = if mean_response_time > 0.8 * max_budget { 0.1 } else { 0.0 };

    let upper_by_tier = if tiers.contains(&Tier::Quality) {
        0.60
    } else if tiers.contains(&Tier::Balanced) {
        0.50
    } else {
        0.45
    };
    let upper = upper_by_tier.min(0.95);

    let raw = base + agreement_boost + diversity_boost - failure_penalty - timeliness_penalty;
    raw.clamp(0.10, upper)
}
