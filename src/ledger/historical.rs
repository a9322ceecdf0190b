//! Ledger-backed implementation of the Model Router's `HistoricalStats`
//! trait, kept under `ledger/` (not `router/`) so the Router stays a pure
//! consumer of the trait and never references SQLite directly.

use crate::ledger::store::Ledger;
use crate::router::HistoricalStats;
use crate::types::TaskDescriptor;

pub struct LedgerHistoricalStats<'a> {
    ledger: &'a Ledger,
}

impl<'a> LedgerHistoricalStats<'a> {
    pub fn new(ledger: &'a Ledger) -> Self {
        Self { ledger }
    }
}

impl<'a> HistoricalStats for LedgerHistoricalStats<'a> {
    fn lookup(&self, model: &str, descriptor: &TaskDescriptor) -> Option<(f64, f64)> {
        let row = self
            .ledger
            .model_performance(model, descriptor.task_type, descriptor.complexity)
            .ok()
            .flatten()?;
        if row.trial_count == 0 {
            return None;
        }
        let success_rate = row.success_count as f64 / row.trial_count as f64;
        // `weighted_rating` lives on the Tracker's 0..1 scale; the
        // Router's quality sub-scores (and `quality_score` on
        // `ModelProfile`) are 0..100, so scale up to match.
        let avg_quality = row.weighted_rating * 100.0;
        Some((success_rate, avg_quality))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Complexity, TaskPattern, TaskType};
    use chrono::Utc;

    fn descriptor() -> TaskDescriptor {
        TaskDescriptor {
            task_text: "task".into(),
            task_type: TaskType::Debugging,
            complexity: Complexity::Medium,
            pattern: TaskPattern::SingleShot,
            input_tokens_estimate: 500,
            output_tokens_estimate: 500,
            requires_thinking: false,
            involves_code: true,
            priority: 3,
            confidence: 0.8,
            constraints: None,
        }
    }

    #[test]
    fn lookup_returns_none_with_no_recorded_performance() {
        let ledger = Ledger::in_memory().unwrap();
        let stats = LedgerHistoricalStats::new(&ledger);
        assert!(stats.lookup("claude-sonnet", &descriptor()).is_none());
    }

    #[test]
    fn lookup_returns_success_rate_and_scaled_quality() {
        let ledger = Ledger::in_memory().unwrap();
        ledger
            .upsert_model_performance("claude-sonnet", TaskType::Debugging, Complexity::Medium, true, 0.8, Utc::now())
            .unwrap();
        let stats = LedgerHistoricalStats::new(&ledger);
        let (success_rate, avg_quality) = stats.lookup("claude-sonnet", &descriptor()).unwrap();
        assert!((success_rate - 1.0).abs() < 1e-9);
        assert!((avg_quality - 80.0).abs() < 1e-9);
    }
}
