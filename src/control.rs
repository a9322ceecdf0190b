//! Control surface: the command set exposed to callers (a CLI
//! front-end, an embedding service, or tests), expressed as one method per
//! command returning a uniform three-shape result.

use chrono::{DateTime, Duration, Utc};

use crate::classifier;
use crate::config::RuntimeConfig;
use crate::error::{Error, Result};
use crate::expander;
use crate::feedback::{self, EvolutionReport, PromptUpdateAction};
use crate::ledger::{BudgetPredictor, EvolutionReportRow, FallbackEvent, Ledger, LedgerHistoricalStats};
use crate::optimizer::{classify_error_kind, mutation_template, operators_for_error_kind, MutationTarget, PromptOptimizer};
use crate::router::{ModelRouter, RouterConfig};
use crate::tracker::PerformanceTracker;
use crate::types::{
    BudgetScope, CapabilityGap, GapStatus, ModelCatalog, OutcomeRecord, PrecheckResult,
    PromptVariant, RoutingDecision, TaskContext, TaskDescriptor, VariantStatus,
};

/// Aggregate counters returned by the `stats` command.
#[derive(Debug, Clone)]
pub struct RuntimeStats {
    pub outcome_count: usize,
    pub success_rate: f64,
    pub total_cost: f64,
    pub cache_hit_rate: f64,
}

/// A control-surface result shape: every command resolves to exactly one
/// of these three variants, from which an exit code is
/// derived.
#[derive(Debug)]
pub enum ControlResult<T> {
    Ok(T),
    Warning(T, String),
    Err(Error),
}

impl<T> ControlResult<T> {
    pub fn exit_code(&self) -> i32 {
        match self {
            ControlResult::Ok(_) | ControlResult::Warning(_, _) => 0,
            ControlResult::Err(e) => e.exit_code(),
        }
    }
}

pub struct Runtime {
    config: RuntimeConfig,
    router: ModelRouter,
    ledger: Ledger,
    catalog: ModelCatalog,
    tracker: PerformanceTracker,
    optimizer: PromptOptimizer,
}

impl Runtime {
    pub fn new(config: RuntimeConfig, ledger: Ledger, catalog: ModelCatalog) -> Self {
        let router = ModelRouter::new(RouterConfig {
            weights: config.weights,
            default_model: config.default_model.clone(),
            enable_cache: config.cache.enabled,
            cache_ttl_secs: config.cache.ttl_secs,
            enable_learning: config.enable_learning,
        });
        let tracker = PerformanceTracker::new(
            config.evolution.feedback_decay_half_life_days,
            config.evolution.implicit_feedback_weight,
            config.tracker.retention_days,
        );
        let optimizer = PromptOptimizer::new(
            config.evolution.exploration_parameter,
            crate::optimizer::PromotionConfig {
                min_trials: config.evolution.min_trials_before_promotion,
                ..crate::optimizer::PromotionConfig::default()
            },
        );
        Self {
            config,
            router,
            ledger,
            catalog,
            tracker,
            optimizer,
        }
    }

    /// `classify` command: run the Task Classifier only.
    pub fn classify(&self, task_text: &str, context: Option<&TaskContext>) -> ControlResult<TaskDescriptor> {
        ControlResult::Ok(classifier::classify(task_text, context))
    }

    /// `route` command: classify, then run the Model Router, gated by a
    /// budget precheck.
    pub fn route(&self, task_text: &str, context: Option<&TaskContext>) -> ControlResult<RoutingDecision> {
        let descriptor = classifier::classify(task_text, context);
        let historical = LedgerHistoricalStats::new(&self.ledger);
        let decision = self.router.route(&descriptor, &self.catalog, &historical);

        let predictor = BudgetPredictor::new(&self.ledger, &self.config.budget);
        let now = Utc::now();
        match predictor.precheck(decision.estimated_cost, now) {
            Ok(PrecheckResult::Block) => {
                return ControlResult::Err(Error::budget_block(
                    "daily",
                    0.0,
                    decision.estimated_cost,
                    self.config.budget.daily_limit,
                ));
            }
            Ok(PrecheckResult::Warning) => {
                return ControlResult::Warning(decision, "approaching budget limit".to_string());
            }
            Ok(PrecheckResult::Ok) => {}
            Err(e) => return ControlResult::Err(e),
        }

        ControlResult::Ok(decision)
    }

    /// `cost` command: total spend recorded since `since`, defaulting to
    /// the start of the current daily window.
    pub fn cost(&self, since: Option<chrono::DateTime<Utc>>) -> ControlResult<f64> {
        let since = since.unwrap_or_else(|| Utc::now() - chrono::Duration::days(1));
        match self.ledger.total_cost_since(since) {
            Ok(total) => ControlResult::Ok(total),
            Err(e) => ControlResult::Err(e),
        }
    }

    /// `budget` command: the current daily and monthly windows.
    pub fn budget(&self) -> ControlResult<(crate::types::BudgetWindow, crate::types::BudgetWindow)> {
        let predictor = BudgetPredictor::new(&self.ledger, &self.config.budget);
        let now = Utc::now();
        let daily = match predictor.current_window(BudgetScope::Daily, now) {
            Ok(w) => w,
            Err(e) => return ControlResult::Err(e),
        };
        let monthly = match predictor.current_window(BudgetScope::Monthly, now) {
            Ok(w) => w,
            Err(e) => return ControlResult::Err(e),
        };
        ControlResult::Ok((daily, monthly))
    }

    /// `config --set-weight` command.
    pub fn set_weight(&mut self, key: &str, value: f64) -> ControlResult<()> {
        match self.config.set_weight(key, value) {
            Ok(()) => {
                self.router.set_weights(self.config.weights);
                ControlResult::Ok(())
            }
            Err(e) => ControlResult::Err(e),
        }
    }

    /// `reset --cache` command.
    pub fn reset_cache(&self) -> ControlResult<()> {
        self.router.clear_cache();
        ControlResult::Ok(())
    }

    /// `reset --stats` command: zero the router's hit/miss counters without
    /// evicting cached decisions.
    pub fn reset_stats(&self) -> ControlResult<()> {
        self.router.reset_cache_stats();
        ControlResult::Ok(())
    }

    pub fn cache_stats(&self) -> crate::router::CacheStats {
        self.router.cache_stats()
    }

    /// `stats` command: aggregate outcome and cache counters over the
    /// trailing `period` (defaulting to 24 hours).
    pub fn stats(&self, period: Option<Duration>) -> ControlResult<RuntimeStats> {
        let since = Utc::now() - period.unwrap_or_else(|| Duration::hours(24));
        let outcomes = match self.ledger.outcomes_since(since) {
            Ok(o) => o,
            Err(e) => return ControlResult::Err(e),
        };
        let total_cost = match self.ledger.total_cost_since(since) {
            Ok(c) => c,
            Err(e) => return ControlResult::Err(e),
        };
        let success_rate = if outcomes.is_empty() {
            0.0
        } else {
            outcomes.iter().filter(|o| o.success).count() as f64 / outcomes.len() as f64
        };
        ControlResult::Ok(RuntimeStats {
            outcome_count: outcomes.len(),
            success_rate,
            total_cost,
            cache_hit_rate: self.router.cache_stats().hit_rate(),
        })
    }

    /// `fallback --list` command: the most recent fallback attempts recorded
    /// across all tasks, newest first.
    pub fn fallback_list(&self, limit: u32) -> ControlResult<Vec<FallbackEvent>> {
        match self.ledger.recent_fallback_events(limit) {
            Ok(events) => ControlResult::Ok(events),
            Err(e) => ControlResult::Err(e),
        }
    }

    /// `evolve --agent-id` command: run the Feedback Loop's threshold check
    /// for one agent over its retention window, act on the recommendation
    /// (mutate a new variant, roll back to the last archived one, or defer
    /// to an in-flight A/B test), and persist the resulting report.
    pub fn evolve(&self, agent_id: &str) -> ControlResult<EvolutionReport> {
        let now = Utc::now();
        let period_start = self.tracker.retention_cutoff(now);
        let outcomes = match self.ledger.outcomes_for_agent(agent_id, Some(period_start)) {
            Ok(o) => o,
            Err(e) => return ControlResult::Err(e),
        };
        let variants = match self.ledger.variants_for_agent(agent_id) {
            Ok(v) => v,
            Err(e) => return ControlResult::Err(e),
        };
        let trend = self.tracker.trend(&outcomes, now);
        let report = feedback::check_threshold(
            agent_id,
            &outcomes,
            &variants,
            trend,
            &self.config.evolution.evolution_threshold,
            period_start,
            now,
        );

        // Serialize the read-evaluate-write sequence per agent so two
        // concurrent `evolve` calls for the same agent can't both mutate or
        // roll back from the same snapshot of `variants`.
        let lock = self.optimizer.lock_agent(agent_id);
        let _guard = lock.lock().expect("optimizer lock poisoned");

        if let Some(update) = &report.update {
            let outcome = match update.action {
                PromptUpdateAction::Evolve => self.apply_evolve(agent_id, &variants, &outcomes, now),
                PromptUpdateAction::Rollback => self.apply_rollback(agent_id, &variants, now),
                PromptUpdateAction::AbTest => Ok(()),
            };
            if let Err(e) = outcome {
                return ControlResult::Err(e);
            }
        }

        let body = match &report.update {
            Some(update) => format!("{:?} trend over {} tasks; action={:?}: {}", report.trend, report.task_count, update.action, update.reason),
            None => format!("{:?} trend over {} tasks; no action", report.trend, report.task_count),
        };
        if let Err(e) = self.ledger.insert_evolution_report(&EvolutionReportRow {
            agent_id: agent_id.to_string(),
            period_start,
            period_end: now,
            body,
            created_at: now,
        }) {
            return ControlResult::Err(e);
        }

        ControlResult::Ok(report)
    }

    /// Mutate the current parent variant (the active one, or the
    /// highest-version variant if none is active yet) using the operator
    /// table keyed off the most recent failure's error text, and persist
    /// the resulting `testing` candidate.
    fn apply_evolve(&self, agent_id: &str, variants: &[PromptVariant], outcomes: &[OutcomeRecord], now: DateTime<Utc>) -> Result<()> {
        let parent = variants
            .iter()
            .find(|v| v.status == VariantStatus::Active)
            .or_else(|| variants.iter().max_by_key(|v| v.version))
            .cloned()
            .unwrap_or_else(|| PromptVariant::seed(agent_id, "You are a helpful assistant.", now));

        let error_kind = outcomes
            .iter()
            .filter(|o| !o.success)
            .find_map(|o| o.error.as_deref())
            .map(classify_error_kind)
            .unwrap_or("unknown");
        let operator = operators_for_error_kind(error_kind)[0];
        let new_prompt_body = format!("{}{}", parent.prompt_body, mutation_template(operator));

        let child = self.optimizer.mutate(&parent, operator, MutationTarget::Both, new_prompt_body, parent.system_prompt.clone(), now);
        self.ledger.insert_variant(&child)?;
        self.ledger.log_prompt_history(&child.id, agent_id, "mutated", Some(operator.as_str()), now)
    }

    /// Swap the active variant back to the last archived one, the inverse
    /// of a promotion: the current active is archived, the archived
    /// variant it demotes becomes active again.
    fn apply_rollback(&self, agent_id: &str, variants: &[PromptVariant], now: DateTime<Utc>) -> Result<()> {
        let active = variants.iter().find(|v| v.status == VariantStatus::Active);
        let last_archived = variants.iter().filter(|v| v.status == VariantStatus::Archived).max_by_key(|v| v.version);
        let (active, archived) = match (active, last_archived) {
            (Some(a), Some(b)) => (a, b),
            _ => return Ok(()),
        };

        let mut demoted = active.clone();
        demoted.status = VariantStatus::Archived;
        let mut promoted = archived.clone();
        promoted.status = VariantStatus::Active;

        self.ledger.update_variant(&demoted)?;
        self.ledger.update_variant(&promoted)?;
        self.ledger.log_prompt_history(&demoted.id, agent_id, "rolled_back", Some(&promoted.id), now)
    }

    /// Record a task outcome and keep the Model Router's historical
    /// sub-score fed: every recorded outcome rolls into that
    /// model/task-type/complexity cell's `model_performance` row via the
    /// Performance Tracker's decayed rating, not just the raw outcome log.
    pub fn record_outcome(&self, outcome: &OutcomeRecord) -> ControlResult<()> {
        if let Err(e) = self.ledger.record_outcome(outcome) {
            return ControlResult::Err(e);
        }

        let since = self.tracker.retention_cutoff(outcome.timestamp);
        let recent = match self
            .ledger
            .outcomes_for_model(&outcome.model, outcome.task_type, outcome.complexity, since)
        {
            Ok(o) => o,
            Err(e) => return ControlResult::Err(e),
        };
        let rating = self.tracker.weighted_rating(&recent, &[], outcome.timestamp);
        if let Err(e) = self.ledger.upsert_model_performance(
            &outcome.model,
            outcome.task_type,
            outcome.complexity,
            outcome.success,
            rating,
            outcome.timestamp,
        ) {
            return ControlResult::Err(e);
        }

        ControlResult::Ok(())
    }

    /// `gaps` command: open capability gaps discovered from recent failed
    /// outcomes, persisted so repeat discovery updates counts in place.
    pub fn gaps(&self, agent_id: &str, window_days: f64) -> ControlResult<Vec<CapabilityGap>> {
        let now = Utc::now();
        let since = now - Duration::seconds((window_days * 86_400.0) as i64);
        let outcomes = match self.ledger.outcomes_for_agent(agent_id, Some(since)) {
            Ok(o) => o,
            Err(e) => return ControlResult::Err(e),
        };
        let discovered = expander::discover_gaps(&outcomes, window_days);
        for gap in &discovered {
            if let Err(e) = self.ledger.upsert_gap(gap) {
                return ControlResult::Err(e);
            }
        }
        match self.ledger.gaps_by_status(GapStatus::Open) {
            Ok(gaps) => ControlResult::Ok(gaps),
            Err(e) => ControlResult::Err(e),
        }
    }

    /// `suggestions` command: skill suggestions for a known gap, computing
    /// and caching them on first request.
    pub fn suggestions(&self, gap: &CapabilityGap) -> ControlResult<Vec<String>> {
        match self.ledger.suggestions_for_gap(&gap.id) {
            Ok(existing) if !existing.is_empty() => ControlResult::Ok(existing),
            Ok(_) => {
                let suggestions = expander::suggest_skills(gap);
                if let Err(e) = self.ledger.insert_skill_suggestions(&gap.id, &suggestions, Utc::now()) {
                    return ControlResult::Err(e);
                }
                ControlResult::Ok(suggestions)
            }
            Err(e) => ControlResult::Err(e),
        }
    }

    /// `report --period` command: evolution reports recorded since `since`.
    pub fn report(&self, since: DateTime<Utc>) -> ControlResult<Vec<EvolutionReportRow>> {
        match self.ledger.evolution_reports_since(since) {
            Ok(reports) => ControlResult::Ok(reports),
            Err(e) => ControlResult::Err(e),
        }
    }

    /// `export --format json|csv` command: outcomes recorded since `since`,
    /// rendered in the requested format.
    pub fn export(&self, since: DateTime<Utc>, format: ExportFormat) -> ControlResult<String> {
        let outcomes = match self.ledger.outcomes_since(since) {
            Ok(o) => o,
            Err(e) => return ControlResult::Err(e),
        };
        match format {
            ExportFormat::Json => match serde_json::to_string_pretty(&outcomes) {
                Ok(text) => ControlResult::Ok(text),
                Err(e) => ControlResult::Err(Error::Serialization(e)),
            },
            ExportFormat::Csv => {
                let mut text = String::from("task_id,model,task_type,complexity,success,quality,actual_cost,actual_latency_ms\n");
                for outcome in &outcomes {
                    text.push_str(&format!(
                        "{},{},{},{:?},{},{},{},{}\n",
                        outcome.task_id,
                        outcome.model,
                        outcome.task_type,
                        outcome.complexity,
                        outcome.success,
                        outcome.quality,
                        outcome.actual_cost,
                        outcome.actual_latency_ms,
                    ));
                }
                ControlResult::Ok(text)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Capability, Complexity, ModelProfile, TaskType};
    use std::collections::HashMap;

    fn catalog() -> ModelCatalog {
        let mut catalog = HashMap::new();
        catalog.insert(
            "claude-haiku".to_string(),
            ModelProfile {
                name: "claude-haiku".into(),
                provider: "anthropic".into(),
                input_cost_per_1k: 0.0008,
                output_cost_per_1k: 0.004,
                quality_score: 75.0,
                p50_latency_ms: 500,
                context_window: 200_000,
                max_output: 8192,
                capabilities: vec![Capability::ToolUse],
                strength_tags: vec![TaskType::Documentation, TaskType::SimpleTask],
            },
        );
        catalog
    }

    fn runtime() -> Runtime {
        let mut config = RuntimeConfig::default();
        config.default_model = "claude-haiku".into();
        let ledger = Ledger::in_memory().unwrap();
        Runtime::new(config, ledger, catalog())
    }

    #[test]
    fn classify_command_returns_ok() {
        let runtime = runtime();
        let result = runtime.classify("Add docs to the utility module", None);
        assert!(matches!(result, ControlResult::Ok(_)));
        assert_eq!(result.exit_code(), 0);
    }

    #[test]
    fn route_command_returns_a_decision_under_budget() {
        let runtime = runtime();
        let result = runtime.route("Add a short docstring", None);
        match result {
            ControlResult::Ok(decision) => assert_eq!(decision.chosen_model, "claude-haiku"),
            other => panic!("expected Ok, got {other:?}"),
        }
    }

    #[test]
    fn route_command_blocks_when_daily_budget_exhausted() {
        let mut config = RuntimeConfig::default();
        config.default_model = "claude-haiku".into();
        config.budget.daily_limit = 0.00001;
        let ledger = Ledger::in_memory().unwrap();
        let runtime = Runtime::new(config, ledger, catalog());
        let result = runtime.route("Add a short docstring", None);
        assert_eq!(result.exit_code(), 1);
        assert!(matches!(result, ControlResult::Err(Error::BudgetBlock { .. })));
    }

    #[test]
    fn set_weight_rejects_unknown_key_without_mutating_router() {
        let mut runtime = runtime();
        let result = runtime.set_weight("bogus", 1.0);
        assert!(matches!(result, ControlResult::Err(_)));
    }

    #[test]
    fn reset_stats_command_zeroes_cache_counters() {
        let runtime = runtime();
        runtime.route("Add a short docstring", None);
        runtime.route("Add a short docstring", None);
        assert!(runtime.cache_stats().hits + runtime.cache_stats().misses > 0);
        runtime.reset_stats();
        let stats = runtime.cache_stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn stats_command_reflects_recorded_outcomes() {
        let runtime = runtime();
        runtime
            .route("Add a short docstring", None)
            .exit_code();
        let result = runtime.stats(Some(Duration::hours(1)));
        match result {
            ControlResult::Ok(stats) => assert_eq!(stats.outcome_count, 0),
            other => panic!("expected Ok, got {other:?}"),
        }
    }

    #[test]
    fn fallback_list_returns_an_empty_list_when_none_recorded() {
        let runtime = runtime();
        let result = runtime.fallback_list(10);
        match result {
            ControlResult::Ok(events) => assert!(events.is_empty()),
            other => panic!("expected Ok, got {other:?}"),
        }
    }

    #[test]
    fn evolve_command_produces_no_update_for_a_fresh_agent() {
        let runtime = runtime();
        let result = runtime.evolve("agent-a");
        match result {
            ControlResult::Ok(report) => assert!(report.update.is_none()),
            other => panic!("expected Ok, got {other:?}"),
        }
    }

    fn outcome(agent_id: &str, success: bool, error: Option<&str>, timestamp: DateTime<Utc>) -> OutcomeRecord {
        OutcomeRecord {
            task_id: format!("task-{}", timestamp.timestamp_nanos_opt().unwrap_or(0)),
            model: "claude-haiku".into(),
            variant_id: "seed".into(),
            agent_id: agent_id.to_string(),
            task_type: TaskType::SimpleTask,
            complexity: Complexity::Simple,
            success,
            quality: if success { 0.9 } else { 0.2 },
            actual_cost: 0.001,
            actual_latency_ms: 400,
            tokens_in: 100,
            tokens_out: 100,
            thinking_tokens: 0,
            used_fallback: false,
            error: error.map(|e| e.to_string()),
            user_rating: None,
            timestamp,
        }
    }

    #[test]
    fn evolve_command_mutates_a_new_variant_on_declining_trend_with_no_testing_variant() {
        let runtime = runtime();
        let now = Utc::now();
        for i in 0..20 {
            let success = i < 6;
            let error = if success { None } else { Some("the instructions were ambiguous") };
            let t = now - Duration::days(20 - i);
            runtime.ledger.record_outcome(&outcome("agent-a", success, error, t)).unwrap();
        }
        let result = runtime.evolve("agent-a");
        match result {
            ControlResult::Ok(report) => {
                let update = report.update.expect("expected an update");
                assert_eq!(update.action, PromptUpdateAction::Evolve);
            }
            other => panic!("expected Ok, got {other:?}"),
        }
        let variants = runtime.ledger.variants_for_agent("agent-a").unwrap();
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].status, VariantStatus::Testing);
        assert!(variants[0].prompt_body.contains("restate the task"));
    }

    #[test]
    fn evolve_command_rolls_back_when_active_underperforms_last_archived() {
        let runtime = runtime();
        let now = Utc::now();

        let mut archived = PromptVariant::seed("agent-a", "archived body", now - Duration::days(30));
        archived.version = 1;
        archived.trial_count = 100;
        archived.success_count = 80;
        archived.status = VariantStatus::Archived;
        runtime.ledger.insert_variant(&archived).unwrap();

        let mut active = PromptVariant::seed("agent-a", "active body", now - Duration::days(10));
        active.id = "agent-a-v2".into();
        active.version = 2;
        active.trial_count = 100;
        active.success_count = 40;
        active.status = VariantStatus::Active;
        runtime.ledger.insert_variant(&active).unwrap();

        for i in 0..20 {
            let success = i < 6;
            let t = now - Duration::days(20 - i);
            runtime.ledger.record_outcome(&outcome("agent-a", success, None, t)).unwrap();
        }

        let result = runtime.evolve("agent-a");
        match result {
            ControlResult::Ok(report) => {
                let update = report.update.expect("expected an update");
                assert_eq!(update.action, PromptUpdateAction::Rollback);
            }
            other => panic!("expected Ok, got {other:?}"),
        }

        let variants = runtime.ledger.variants_for_agent("agent-a").unwrap();
        let by_id = |id: &str| variants.iter().find(|v| v.id == id).unwrap();
        assert_eq!(by_id("agent-a-v2").status, VariantStatus::Archived);
        assert_eq!(by_id(&archived.id).status, VariantStatus::Active);
    }

    #[test]
    fn record_outcome_updates_model_performance_for_the_router() {
        let runtime = runtime();
        let now = Utc::now();
        let result = runtime.record_outcome(&outcome("agent-a", true, None, now));
        assert!(matches!(result, ControlResult::Ok(())));
        let row = runtime
            .ledger
            .model_performance("claude-haiku", TaskType::SimpleTask, Complexity::Simple)
            .unwrap()
            .expect("expected a model_performance row");
        assert_eq!(row.trial_count, 1);
        assert_eq!(row.success_count, 1);
    }

    #[test]
    fn gaps_command_returns_empty_for_an_agent_with_no_failures() {
        let runtime = runtime();
        let result = runtime.gaps("agent-a", 7.0);
        match result {
            ControlResult::Ok(gaps) => assert!(gaps.is_empty()),
            other => panic!("expected Ok, got {other:?}"),
        }
    }

    #[test]
    fn suggestions_are_cached_on_second_call() {
        let runtime = runtime();
        let gap = CapabilityGap {
            id: "gap-1".into(),
            category: crate::types::GapCategory::ToolLimitation,
            description: "d".into(),
            failure_count: 3,
            affected_task_ids: vec![],
            error_patterns: vec!["missing_tool_permission".into()],
            severity: crate::types::Severity::Medium,
            frequency_per_day: 1.0,
            status: GapStatus::Open,
        };
        let first = runtime.suggestions(&gap);
        let second = runtime.suggestions(&gap);
        match (first, second) {
            (ControlResult::Ok(a), ControlResult::Ok(b)) => assert_eq!(a, b),
            _ => panic!("expected both calls to return Ok"),
        }
    }

    #[test]
    fn report_command_returns_persisted_evolution_reports() {
        let runtime = runtime();
        runtime.evolve("agent-a");
        let result = runtime.report(Utc::now() - Duration::hours(1));
        match result {
            ControlResult::Ok(reports) => assert_eq!(reports.len(), 1),
            other => panic!("expected Ok, got {other:?}"),
        }
    }

    #[test]
    fn export_json_round_trips_recorded_outcomes() {
        let runtime = runtime();
        let result = runtime.export(Utc::now() - Duration::hours(1), ExportFormat::Json);
        match result {
            ControlResult::Ok(text) => assert!(text.starts_with('[')),
            other => panic!("expected Ok, got {other:?}"),
        }
    }
}
