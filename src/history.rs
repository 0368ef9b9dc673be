//! Performance History: a bounded per-model rolling window of observed
//! response times, used as a low-weight tiebreaker during selection — never
//! a gatekeeper. Process-local, not persisted.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Maximum observations retained per model.
pub const WINDOW_SIZE: usize = 32;

pub struct PerformanceHistory {
    windows: Mutex<HashMap<String, VecDeque<f64>>>,
}

impl Default for PerformanceHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceHistory {
    pub fn new() -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Record an observed latency. Invalid inputs (empty name, non-finite or
    /// negative latency) are ignored without error.
    pub fn record(&self, name: &str, latency_ms: f64) {
        if name.trim().is_empty() || !latency_ms.is_finite() || latency_ms < 0.0 {
            return;
        }
        let mut windows = self.windows.lock().unwrap();
        let window = windows.entry(name.to_string()).or_default();
        if window.len() >= WINDOW_SIZE {
            window.pop_front();
        }
        window.push_back(latency_ms);
    }

    /// Arithmetic mean of the retained window, or `None` if no history exists.
    pub fn average(&self, name: &str) -> Option<f64> {
        let windows = self.windows.lock().unwrap();
        let window = windows.get(name)?;
        if window.is_empty() {
            return None;
        }
        Some(window.iter().sum::<f64>() / window.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_recorded_latencies() {
        let history = PerformanceHistory::new();
        history.record("m", 100.0);
        history.record("m", 200.0);
        assert_eq!(history.average("m"), Some(150.0));
    }

    #[test]
    fn ignores_invalid_inputs() {
        let history = PerformanceHistory::new();
        history.record("", 100.0);
        history.record("m", -5.0);
        history.record("m", f64::NAN);
        assert_eq!(history.average("m"), None);
    }

    #[test]
    fn window_is_bounded() {
        let history = PerformanceHistory::new();
        for i in 0..(WINDOW_SIZE + 10) {
            history.record("m", i as f64);
        }
        // Average should reflect only the most recent WINDOW_SIZE samples,
        // i.e. values 10..(WINDOW_SIZE+10).
        let expected: f64 = (10..(WINDOW_SIZE + 10)).map(|v| v as f64).sum::<f64>() / WINDOW_SIZE as f64;
        assert!((history.average("m").unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn unknown_model_has_no_average() {
        let history = PerformanceHistory::new();
        assert_eq!(history.average("nope"), None);
    }
}
