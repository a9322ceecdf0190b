//! Feedback Loop orchestrator: periodically checks an agent's
//! performance trend against a threshold and proposes a `PromptUpdate`,
//! then rolls the decision up into a retained `EvolutionReport`.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::config::EvolutionThreshold;
use crate::tracker::Trend;
use crate::types::{OutcomeRecord, PromptVariant, VariantStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptUpdateAction {
    Evolve,
    AbTest,
    Rollback,
}

#[derive(Debug, Clone)]
pub struct PromptUpdate {
    pub agent_id: String,
    pub action: PromptUpdateAction,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct EvolutionReport {
    pub agent_id: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub task_count: usize,
    pub trend: Trend,
    pub update: Option<PromptUpdate>,
}

/// Threshold check: requires at least `min_task_count` tasks in the
/// window and a declining trend of at least `min_success_rate_drop` before
/// looking at `variants` to decide which action to take. The action itself
/// follows the agent's variant state rather than the size of the drop: a
/// testing variant already in flight means ab_test, an active variant that
/// has fallen behind the most recently archived one means rollback, and
/// anything else means evolve.
pub fn check_threshold(
    agent_id: &str,
    outcomes: &[OutcomeRecord],
    variants: &[PromptVariant],
    trend: Trend,
    threshold: &EvolutionThreshold,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
) -> EvolutionReport {
    let task_count = outcomes.len();

    let update = if task_count < threshold.min_task_count as usize {
        None
    } else if trend != Trend::Declining {
        None
    } else {
        let success_rate = success_rate(outcomes);
        let drop = 1.0 - success_rate;
        if drop < threshold.min_success_rate_drop {
            None
        } else if variants.iter().any(|v| v.status == VariantStatus::Testing) {
            Some(PromptUpdate {
                agent_id: agent_id.to_string(),
                action: PromptUpdateAction::AbTest,
                reason: format!(
                    "a testing variant is already in flight; let the A/B test run before evolving further ({success_rate:.2} success rate over {task_count} tasks)"
                ),
            })
        } else {
            let active = variants.iter().find(|v| v.status == VariantStatus::Active);
            let last_archived = variants
                .iter()
                .filter(|v| v.status == VariantStatus::Archived)
                .max_by_key(|v| v.version);
            let rollback = match (active, last_archived) {
                (Some(active), Some(archived)) => active.success_rate() < archived.success_rate(),
                _ => false,
            };
            if rollback {
                Some(PromptUpdate {
                    agent_id: agent_id.to_string(),
                    action: PromptUpdateAction::Rollback,
                    reason: format!(
                        "active variant underperforms the last archived variant ({success_rate:.2} success rate over {task_count} tasks)"
                    ),
                })
            } else {
                Some(PromptUpdate {
                    agent_id: agent_id.to_string(),
                    action: PromptUpdateAction::Evolve,
                    reason: format!("declining trend with success rate {success_rate:.2} over {task_count} tasks"),
                })
            }
        }
    };

    EvolutionReport {
        agent_id: agent_id.to_string(),
        period_start,
        period_end,
        task_count,
        trend,
        update,
    }
}

fn success_rate(outcomes: &[OutcomeRecord]) -> f64 {
    if outcomes.is_empty() {
        return 1.0;
    }
    let successes = outcomes.iter().filter(|o| o.success).count();
    successes as f64 / outcomes.len() as f64
}

/// A bounded, FIFO-evicting store of `EvolutionReport`s.
pub struct ReportLog {
    capacity: usize,
    reports: VecDeque<EvolutionReport>,
}

impl ReportLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            reports: VecDeque::new(),
        }
    }

    pub fn push(&mut self, report: EvolutionReport) {
        if self.reports.len() >= self.capacity {
            self.reports.pop_front();
        }
        self.reports.push_back(report);
    }

    pub fn reports(&self) -> impl Iterator<Item = &EvolutionReport> {
        self.reports.iter()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Complexity, TaskType};

    fn outcome(success: bool) -> OutcomeRecord {
        OutcomeRecord {
            task_id: "t".into(),
            model: "m".into(),
            variant_id: "v".into(),
            agent_id: "agent-a".into(),
            task_type: TaskType::Debugging,
            complexity: Complexity::Medium,
            success,
            quality: if success { 0.9 } else { 0.1 },
            actual_cost: 0.01,
            actual_latency_ms: 500,
            tokens_in: 100,
            tokens_out: 100,
            thinking_tokens: 0,
            used_fallback: false,
            error: None,
            user_rating: None,
            timestamp: Utc::now(),
        }
    }

    fn active_variant(success_rate_pct: u64) -> PromptVariant {
        let mut v = PromptVariant::seed("agent-a", "body", Utc::now());
        v.trial_count = 100;
        v.success_count = success_rate_pct;
        v.status = VariantStatus::Active;
        v
    }

    fn archived_variant(version: u32, success_rate_pct: u64) -> PromptVariant {
        let mut v = active_variant(success_rate_pct);
        v.version = version;
        v.status = VariantStatus::Archived;
        v
    }

    #[test]
    fn below_minimum_task_count_produces_no_update() {
        let threshold = EvolutionThreshold::default();
        let outcomes = vec![outcome(false); 3];
        let report = check_threshold("agent-a", &outcomes, &[], Trend::Declining, &threshold, Utc::now(), Utc::now());
        assert!(report.update.is_none());
    }

    #[test]
    fn stable_trend_produces_no_update_even_with_enough_tasks() {
        let threshold = EvolutionThreshold::default();
        let outcomes = vec![outcome(true); 20];
        let report = check_threshold("agent-a", &outcomes, &[], Trend::Stable, &threshold, Utc::now(), Utc::now());
        assert!(report.update.is_none());
    }

    #[test]
    fn decline_with_no_testing_variant_recommends_evolve() {
        let threshold = EvolutionThreshold::default();
        let outcomes: Vec<OutcomeRecord> = (0..15).map(|i| outcome(i < 5)).collect();
        let report = check_threshold("agent-a", &outcomes, &[], Trend::Declining, &threshold, Utc::now(), Utc::now());
        let update = report.update.unwrap();
        assert_eq!(update.action, PromptUpdateAction::Evolve);
    }

    #[test]
    fn decline_with_a_testing_variant_in_flight_recommends_ab_test() {
        let threshold = EvolutionThreshold::default();
        let outcomes = vec![outcome(false); 20];
        let mut testing = active_variant(50);
        testing.status = VariantStatus::Testing;
        let report = check_threshold("agent-a", &outcomes, &[testing], Trend::Declining, &threshold, Utc::now(), Utc::now());
        let update = report.update.unwrap();
        assert_eq!(update.action, PromptUpdateAction::AbTest);
    }

    #[test]
    fn active_underperforming_last_archived_recommends_rollback() {
        let threshold = EvolutionThreshold::default();
        let outcomes = vec![outcome(false); 20];
        let variants = vec![archived_variant(1, 80), active_variant(40)];
        let report = check_threshold("agent-a", &outcomes, &variants, Trend::Declining, &threshold, Utc::now(), Utc::now());
        let update = report.update.unwrap();
        assert_eq!(update.action, PromptUpdateAction::Rollback);
    }

    #[test]
    fn report_log_evicts_oldest_past_capacity() {
        let mut log = ReportLog::new(2);
        for i in 0..3 {
            log.push(EvolutionReport {
                agent_id: format!("agent-{i}"),
                period_start: Utc::now(),
                period_end: Utc::now(),
                task_count: 0,
                trend: Trend::Stable,
                update: None,
            });
        }
        assert_eq!(log.len(), 2);
        let ids: Vec<&str> = log.reports().map(|r| r.agent_id.as_str()).collect();
        assert_eq!(ids, vec!["agent-1", "agent-2"]);
    }
}
