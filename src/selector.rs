//! Model Selector: filter by complexity fit, score by focus/tier/history,
//! drop implausible timeout budgets, pick the top N, then diversify across
//! tiers.

use crate::history::PerformanceHistory;
use crate::model::{Complexity, Focus, ModelCapabilities, ModelStrategy, Tier};

pub const DEFAULT_PREFERRED_COUNT: usize = 3;
const MIN_PLAUSIBLE_BUDGET_MS: f64 = 1_000.0;

pub struct SelectionCriteria<'a> {
    pub complexity: Complexity,
    pub focus: Focus,
    pub available_models: &'a [ModelCapabilities],
    pub preferred_count: usize,
    pub require_diversity: bool,
    pub max_timeout_ms: u64,
}

impl<'a> SelectionCriteria<'a> {
    pub fn new(complexity: Complexity, focus: Focus, available_models: &'a [ModelCapabilities], max_timeout_ms: u64) -> Self {
        Self {
            complexity,
            focus,
            available_models,
            preferred_count: DEFAULT_PREFERRED_COUNT,
            require_diversity: true,
            max_timeout_ms,
        }
    }
}

/// Select a primary/secondary/tertiary strategy for one research request.
pub fn select(criteria: &SelectionCriteria, history: &PerformanceHistory) -> ModelStrategy {
    if criteria.available_models.is_empty() {
        return ModelStrategy::default();
    }

    // 1. Filter by complexity fit, falling back to the full set if empty.
    let filtered: Vec<&ModelCapabilities> = criteria
        .available_models
        .iter()
        .filter(|m| m.complexity_fit.contains(&criteria.complexity))
        .collect();
    let candidates: Vec<&ModelCapabilities> = if filtered.is_empty() {
        criteria.available_models.iter().collect()
    } else {
        filtered
    };

    // 2. Score.
    let mut scored: Vec<(&ModelCapabilities, f64)> = candidates
        .into_iter()
        .map(|m| (m, score(m, criteria, history)))
        .collect();

    // 3. Timeout filter: drop models whose per-model budget is implausibly short.
    let preferred_count = criteria.preferred_count.max(1);
    let plausible: Vec<(&ModelCapabilities, f64)> = scored
        .iter()
        .filter(|(m, _)| per_model_budget_ms(criteria.max_timeout_ms, preferred_count, m.timeout_multiplier) >= MIN_PLAUSIBLE_BUDGET_MS)
        .cloned()
        .collect();
    if !plausible.is_empty() {
        scored = plausible;
    } else {
        // Keep the fastest-tier candidates regardless.
        scored.sort_by(|a, b| a.0.tier.cmp(&b.0.tier));
    }

    // 4. Select top `preferred_count` by score, tie-break by (lower timeout
    //    multiplier, lexicographic name).
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                a.0.timeout_multiplier
                    .partial_cmp(&b.0.timeout_multiplier)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.0.name.cmp(&b.0.name))
    });
    let mut selected: Vec<ModelCapabilities> = scored
        .into_iter()
        .take(preferred_count)
        .map(|(m, _)| m.clone())
        .collect();

    // 5. Diversify across tiers when requested and possible.
    if criteria.require_diversity && selected.len() >= 2 {
        diversify(&mut selected, criteria.available_models);
    }

    // 6. Pack into slots.
    let mut slots = selected.into_iter();
    ModelStrategy {
        primary: slots.next(),
        secondary: slots.next(),
        tertiary: slots.next(),
    }
}

fn score(model: &ModelCapabilities, criteria: &SelectionCriteria, history: &PerformanceHistory) -> f64 {
    let focus_score = if model.focus_fit.contains(&criteria.focus) { 2.0 } else { 0.0 };
    let tier_score = tier_score_for(criteria.complexity, model.tier);
    let history_score = history
        .average(&model.name)
        .map(|avg| {
            let budget = criteria.max_timeout_ms.max(1) as f64;
            (1.0 - avg / budget).clamp(0.0, 1.0)
        })
        .unwrap_or(0.0);
    focus_score + tier_score + history_score
}

fn tier_score_for(complexity: Complexity, tier: Tier) -> f64 {
    match (complexity, tier) {
        (Complexity::Simple, Tier::Fast) => 2.0,
        (Complexity::Simple, Tier::Balanced) => 1.0,
        (Complexity::Simple, Tier::Quality) => 0.0,
        (Complexity::Medium, Tier::Balanced) => 2.0,
        (Complexity::Medium, Tier::Fast) => 1.0,
        (Complexity::Medium, Tier::Quality) => 1.0,
        (Complexity::Complex, Tier::Quality) => 2.0,
        (Complexity::Complex, Tier::Balanced) => 1.0,
        (Complexity::Complex, Tier::Fast) => 0.0,
    }
}

fn per_model_budget_ms(max_timeout_ms: u64, preferred_count: usize, timeout_multiplier: f64) -> f64 {
    (max_timeout_ms as f64 / preferred_count as f64) * timeout_multiplier
}

/// Walk the selected list, swapping a later slot for the next unrepresented
/// tier among all available candidates, until tiers differ or candidates run out.
fn diversify(selected: &mut [ModelCapabilities], all_available: &[ModelCapabilities]) {
    let tiers_represented = |list: &[ModelCapabilities]| -> usize {
        let mut tiers: Vec<Tier> = list.iter().map(|m| m.tier).collect();
        tiers.sort();
        tiers.dedup();
        tiers.len()
    };

    if tiers_represented(selected) >= 2 || all_available.len() < 2 {
        return;
    }

    let selected_names: std::collections::HashSet<&str> = selected.iter().map(|m| m.name.as_str()).collect();
    let present_tiers: std::collections::HashSet<Tier> = selected.iter().map(|m| m.tier).collect();

    let mut candidates: Vec<&ModelCapabilities> = all_available
        .iter()
        .filter(|m| !selected_names.contains(m.name.as_str()) && !present_tiers.contains(&m.tier))
        .collect();
    candidates.sort_by(|a, b| a.name.cmp(&b.name));

    if let Some(replacement) = candidates.into_iter().next()
        && let Some(last) = selected.last_mut()
    {
        *last = replacement.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn model(name: &str, tier: Tier) -> ModelCapabilities {
        ModelCapabilities {
            name: name.to_string(),
            size_bytes: 0,
            parameters: 0,
            tier,
            timeout_multiplier: tier.timeout_multiplier(),
            complexity_fit: BTreeSet::from([Complexity::Simple, Complexity::Medium, Complexity::Complex]),
            focus_fit: BTreeSet::from([Focus::General]),
        }
    }

    #[test]
    fn selects_primary_from_single_model() {
        let models = vec![model("a", Tier::Fast)];
        let history = PerformanceHistory::new();
        let criteria = SelectionCriteria::new(Complexity::Medium, Focus::General, &models, 60_000);
        let strategy = select(&criteria, &history);
        assert!(strategy.primary.is_some());
        assert!(strategy.secondary.is_none());
    }

    #[test]
    fn diversifies_across_tiers() {
        let models = vec![
            model("fast-a", Tier::Fast),
            model("fast-b", Tier::Fast),
            model("balanced-a", Tier::Balanced),
            model("quality-a", Tier::Quality),
        ];
        let history = PerformanceHistory::new();
        let criteria = SelectionCriteria::new(Complexity::Medium, Focus::General, &models, 60_000);
        let strategy = select(&criteria, &history);
        let tiers: std::collections::HashSet<Tier> = strategy.slots().iter().map(|m| m.tier).collect();
        assert!(tiers.len() >= 2);
    }

    #[test]
    fn selected_names_are_distinct() {
        let models = vec![
            model("a", Tier::Fast),
            model("b", Tier::Balanced),
            model("c", Tier::Quality),
        ];
        let history = PerformanceHistory::new();
        let criteria = SelectionCriteria::new(Complexity::Medium, Focus::General, &models, 60_000);
        let strategy = select(&criteria, &history);
        let names: Vec<&str> = strategy.slots().iter().map(|m| m.name.as_str()).collect();
        let unique: std::collections::HashSet<&str> = names.iter().copied().collect();
        assert_eq!(names.len(), unique.len());
    }

    #[test]
    fn falls_back_when_complexity_filter_empties() {
        let mut only_simple = model("only-simple", Tier::Fast);
        only_simple.complexity_fit = BTreeSet::from([Complexity::Simple]);
        let models = vec![only_simple];
        let history = PerformanceHistory::new();
        let criteria = SelectionCriteria::new(Complexity::Complex, Focus::General, &models, 60_000);
        let strategy = select(&criteria, &history);
        assert!(strategy.primary.is_some());
    }

    #[test]
    fn empty_registry_yields_empty_strategy() {
        let models: Vec<ModelCapabilities> = Vec::new();
        let history = PerformanceHistory::new();
        let criteria = SelectionCriteria::new(Complexity::Medium, Focus::General, &models, 60_000);
        let strategy = select(&criteria, &history);
        assert!(strategy.is_empty());
    }
}
