//! The Ledger: a thread-safe SQLite-backed store for routing outcomes,
//! cost entries, prompt variants, and capability gaps.
//!
//! Adapted from the catalog's `SqliteMemoryStore` (`memory/store.rs`):
//! same `Arc<Mutex<Connection>>` + private `with_conn` helper shape, same
//! preference for dynamic `rusqlite::ToSql` parameter vectors when a query
//! has optional filters, but over the Ledger's tables instead of the
//! memory graph's nodes/edges.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::ledger::schema::initialize_schema;
use crate::types::{
    CapabilityGap, Complexity, FeedbackKind, FeedbackSignal, GapCategory, GapStatus,
    ImplicitSubKind, MutationType, OutcomeRecord, PromptVariant, Severity, TaskType,
    VariantStatus,
};

/// One row of the `model_performance` table: an aggregate per
/// (model, task type, complexity) bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPerformanceRow {
    pub trial_count: u64,
    pub success_count: u64,
    pub weighted_rating: f64,
}

/// One row of the `fallback_events` table: a single attempt made while
/// walking a `RoutingDecision`'s fallback chain.
#[derive(Debug, Clone)]
pub struct FallbackEvent {
    pub task_id: String,
    pub model: String,
    pub attempt: u32,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

/// One row of the `evolution_reports` table, kept as a rendered summary
/// rather than a reconstructed `EvolutionReport` since `Trend` and
/// `PromptUpdateAction` are in-memory enums without a stable wire form.
#[derive(Debug, Clone)]
pub struct EvolutionReportRow {
    pub agent_id: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct Ledger {
    conn: Arc<Mutex<Connection>>,
}

impl Ledger {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().expect("ledger connection poisoned");
        f(&conn)
    }

    pub fn record_outcome(&self, outcome: &OutcomeRecord) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO routing_outcomes (
                    task_id, model, variant_id, agent_id, task_type, complexity, success,
                    quality, actual_cost, actual_latency_ms, tokens_in, tokens_out,
                    thinking_tokens, used_fallback, error, user_rating, timestamp
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                params![
                    outcome.task_id,
                    outcome.model,
                    outcome.variant_id,
                    outcome.agent_id,
                    outcome.task_type.as_str(),
                    complexity_label(outcome.complexity),
                    outcome.success,
                    outcome.quality,
                    outcome.actual_cost,
                    outcome.actual_latency_ms,
                    outcome.tokens_in,
                    outcome.tokens_out,
                    outcome.thinking_tokens,
                    outcome.used_fallback,
                    outcome.error,
                    outcome.user_rating,
                    outcome.timestamp.to_rfc3339(),
                ],
            )?;
            conn.execute(
                "INSERT INTO cost_tracking (model, agent_id, cost, tokens_in, tokens_out, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    outcome.model,
                    outcome.agent_id,
                    outcome.actual_cost,
                    outcome.tokens_in,
                    outcome.tokens_out,
                    outcome.timestamp.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn outcomes_for_agent(&self, agent_id: &str, since: Option<DateTime<Utc>>) -> Result<Vec<OutcomeRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT task_id, model, variant_id, agent_id, task_type, complexity, success,
                        quality, actual_cost, actual_latency_ms, tokens_in, tokens_out,
                        thinking_tokens, used_fallback, error, user_rating, timestamp
                 FROM routing_outcomes WHERE agent_id = ?1 AND timestamp >= ?2
                 ORDER BY timestamp DESC",
            )?;
            let since_str = since.unwrap_or_else(|| DateTime::<Utc>::MIN_UTC).to_rfc3339();
            let rows = stmt.query_map(params![agent_id, since_str], row_to_outcome)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    pub fn total_cost_since(&self, since: DateTime<Utc>) -> Result<f64> {
        self.with_conn(|conn| {
            let total: f64 = conn.query_row(
                "SELECT COALESCE(SUM(cost), 0) FROM cost_tracking WHERE timestamp >= ?1",
                params![since.to_rfc3339()],
                |row| row.get(0),
            )?;
            Ok(total)
        })
    }

    pub fn insert_variant(&self, variant: &PromptVariant) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO prompt_variants (
                    id, agent_id, version, prompt_body, system_prompt, created_at, trial_count,
                    success_count, avg_duration_ms, avg_tokens, parent_variant_id, mutation_type,
                    mutation_reason, status
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    variant.id,
                    variant.agent_id,
                    variant.version,
                    variant.prompt_body,
                    variant.system_prompt,
                    variant.created_at.to_rfc3339(),
                    variant.trial_count,
                    variant.success_count,
                    variant.avg_duration_ms,
                    variant.avg_tokens,
                    variant.parent_variant_id,
                    mutation_type_label(variant.mutation_type),
                    variant.mutation_reason,
                    variant_status_label(variant.status),
                ],
            )?;
            Ok(())
        })
    }

    pub fn update_variant(&self, variant: &PromptVariant) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE prompt_variants SET
                    trial_count = ?2, success_count = ?3, avg_duration_ms = ?4, avg_tokens = ?5,
                    status = ?6
                 WHERE id = ?1",
                params![
                    variant.id,
                    variant.trial_count,
                    variant.success_count,
                    variant.avg_duration_ms,
                    variant.avg_tokens,
                    variant_status_label(variant.status),
                ],
            )?;
            Ok(())
        })
    }

    pub fn variants_for_agent(&self, agent_id: &str) -> Result<Vec<PromptVariant>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, agent_id, version, prompt_body, system_prompt, created_at, trial_count,
                        success_count, avg_duration_ms, avg_tokens, parent_variant_id, mutation_type,
                        mutation_reason, status
                 FROM prompt_variants WHERE agent_id = ?1 ORDER BY version",
            )?;
            let rows = stmt.query_map(params![agent_id], row_to_variant)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    pub fn log_prompt_history(&self, variant_id: &str, agent_id: &str, event: &str, detail: Option<&str>, now: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO prompt_history (variant_id, agent_id, event, detail, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![variant_id, agent_id, event, detail, now.to_rfc3339()],
            )?;
            Ok(())
        })
    }

    pub fn record_feedback(&self, signal: &FeedbackSignal) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO implicit_feedback (task_id, agent_id, rating, kind, sub_kind, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    signal.task_id,
                    signal.agent_id,
                    signal.rating,
                    feedback_kind_label(signal.kind),
                    signal.sub_kind.map(implicit_sub_kind_label),
                    signal.timestamp.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn budget_consumed(&self, scope: &str) -> Result<Option<(DateTime<Utc>, f64)>> {
        self.with_conn(|conn| {
            let row: Option<(String, f64)> = conn
                .query_row(
                    "SELECT window_start, consumed FROM budget_tracking WHERE scope = ?1",
                    params![scope],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            Ok(row.map(|(ts, consumed)| (parse_datetime(&ts), consumed)))
        })
    }

    pub fn set_budget_window(&self, scope: &str, window_start: DateTime<Utc>, consumed: f64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO budget_tracking (scope, window_start, consumed) VALUES (?1, ?2, ?3)
                 ON CONFLICT(scope) DO UPDATE SET window_start = excluded.window_start, consumed = excluded.consumed",
                params![scope, window_start.to_rfc3339(), consumed],
            )?;
            Ok(())
        })
    }

    pub fn increment_budget_consumed(&self, scope: &str, amount: f64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE budget_tracking SET consumed = consumed + ?2 WHERE scope = ?1",
                params![scope, amount],
            )?;
            Ok(())
        })
    }

    /// Upsert a discovered gap, keyed by its deterministic id, so rediscovery
    /// after more failures updates counts in place instead of duplicating rows.
    pub fn upsert_gap(&self, gap: &CapabilityGap) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO capability_gaps (
                    id, category, description, failure_count, affected_task_ids,
                    error_patterns, severity, frequency_per_day, status
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(id) DO UPDATE SET
                    failure_count = excluded.failure_count,
                    affected_task_ids = excluded.affected_task_ids,
                    error_patterns = excluded.error_patterns,
                    severity = excluded.severity,
                    frequency_per_day = excluded.frequency_per_day,
                    status = excluded.status",
                params![
                    gap.id,
                    gap_category_label(gap.category),
                    gap.description,
                    gap.failure_count,
                    gap.affected_task_ids.join(","),
                    gap.error_patterns.join("\u{1f}"),
                    severity_label(gap.severity),
                    gap.frequency_per_day,
                    gap_status_label(gap.status),
                ],
            )?;
            Ok(())
        })
    }

    /// Open gaps ranked by severity then frequency, both descending. Sorted
    /// in Rust rather than SQL since `severity` is stored as a label and an
    /// alphabetic `ORDER BY` would not respect severity rank.
    pub fn gaps_by_status(&self, status: GapStatus) -> Result<Vec<CapabilityGap>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, category, description, failure_count, affected_task_ids,
                        error_patterns, severity, frequency_per_day, status
                 FROM capability_gaps WHERE status = ?1",
            )?;
            let rows = stmt.query_map(params![gap_status_label(status)], row_to_gap)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            out.sort_by(|a, b| {
                b.severity
                    .cmp(&a.severity)
                    .then_with(|| b.frequency_per_day.partial_cmp(&a.frequency_per_day).unwrap_or(std::cmp::Ordering::Equal))
            });
            Ok(out)
        })
    }

    pub fn insert_skill_suggestions(&self, gap_id: &str, suggestions: &[String], now: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            for suggestion in suggestions {
                conn.execute(
                    "INSERT INTO skill_suggestions (gap_id, suggestion, created_at) VALUES (?1, ?2, ?3)",
                    params![gap_id, suggestion, now.to_rfc3339()],
                )?;
            }
            Ok(())
        })
    }

    pub fn suggestions_for_gap(&self, gap_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT suggestion FROM skill_suggestions WHERE gap_id = ?1 ORDER BY created_at",
            )?;
            let rows = stmt.query_map(params![gap_id], |row| row.get::<_, String>(0))?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    pub fn record_fallback_event(&self, event: &FallbackEvent) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO fallback_events (task_id, model, attempt, error, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![event.task_id, event.model, event.attempt, event.error, event.timestamp.to_rfc3339()],
            )?;
            Ok(())
        })
    }

    pub fn recent_fallback_events(&self, limit: u32) -> Result<Vec<FallbackEvent>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT task_id, model, attempt, error, timestamp FROM fallback_events
                 ORDER BY timestamp DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                let timestamp: String = row.get(4)?;
                Ok(FallbackEvent {
                    task_id: row.get(0)?,
                    model: row.get(1)?,
                    attempt: row.get(2)?,
                    error: row.get(3)?,
                    timestamp: parse_datetime(&timestamp),
                })
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    pub fn insert_evolution_report(&self, report: &EvolutionReportRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO evolution_reports (agent_id, period_start, period_end, body, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    report.agent_id,
                    report.period_start.to_rfc3339(),
                    report.period_end.to_rfc3339(),
                    report.body,
                    report.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn evolution_reports_since(&self, since: DateTime<Utc>) -> Result<Vec<EvolutionReportRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT agent_id, period_start, period_end, body, created_at FROM evolution_reports
                 WHERE created_at >= ?1 ORDER BY created_at DESC",
            )?;
            let rows = stmt.query_map(params![since.to_rfc3339()], |row| {
                let period_start: String = row.get(1)?;
                let period_end: String = row.get(2)?;
                let created_at: String = row.get(4)?;
                Ok(EvolutionReportRow {
                    agent_id: row.get(0)?,
                    period_start: parse_datetime(&period_start),
                    period_end: parse_datetime(&period_end),
                    body: row.get(3)?,
                    created_at: parse_datetime(&created_at),
                })
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    pub fn outcomes_since(&self, since: DateTime<Utc>) -> Result<Vec<OutcomeRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT task_id, model, variant_id, agent_id, task_type, complexity, success,
                        quality, actual_cost, actual_latency_ms, tokens_in, tokens_out,
                        thinking_tokens, used_fallback, error, user_rating, timestamp
                 FROM routing_outcomes WHERE timestamp >= ?1 ORDER BY timestamp DESC",
            )?;
            let rows = stmt.query_map(params![since.to_rfc3339()], row_to_outcome)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    /// Outcomes recorded for a specific (model, task type, complexity)
    /// bucket since `since`, used to recompute a weighted rating.
    pub fn outcomes_for_model(
        &self,
        model: &str,
        task_type: TaskType,
        complexity: Complexity,
        since: DateTime<Utc>,
    ) -> Result<Vec<OutcomeRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT task_id, model, variant_id, agent_id, task_type, complexity, success,
                        quality, actual_cost, actual_latency_ms, tokens_in, tokens_out,
                        thinking_tokens, used_fallback, error, user_rating, timestamp
                 FROM routing_outcomes
                 WHERE model = ?1 AND task_type = ?2 AND complexity = ?3 AND timestamp >= ?4
                 ORDER BY timestamp DESC",
            )?;
            let rows = stmt.query_map(
                params![model, task_type.as_str(), complexity_label(complexity), since.to_rfc3339()],
                row_to_outcome,
            )?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    /// Upsert the `model_performance` aggregate for a (model, task type,
    /// complexity) bucket: increments trial/success counters and
    /// overwrites the weighted rating with the caller's freshly
    /// recomputed value.
    pub fn upsert_model_performance(
        &self,
        model: &str,
        task_type: TaskType,
        complexity: Complexity,
        success: bool,
        weighted_rating: f64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO model_performance (
                    model, task_type, complexity, trial_count, success_count, weighted_rating, last_updated
                 ) VALUES (?1, ?2, ?3, 1, ?4, ?5, ?6)
                 ON CONFLICT(model, task_type, complexity) DO UPDATE SET
                    trial_count = trial_count + 1,
                    success_count = success_count + excluded.success_count,
                    weighted_rating = excluded.weighted_rating,
                    last_updated = excluded.last_updated",
                params![
                    model,
                    task_type.as_str(),
                    complexity_label(complexity),
                    success as i64,
                    weighted_rating,
                    now.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn model_performance(
        &self,
        model: &str,
        task_type: TaskType,
        complexity: Complexity,
    ) -> Result<Option<ModelPerformanceRow>> {
        self.with_conn(|conn| {
            let row: Option<(i64, i64, f64)> = conn
                .query_row(
                    "SELECT trial_count, success_count, weighted_rating FROM model_performance
                     WHERE model = ?1 AND task_type = ?2 AND complexity = ?3",
                    params![model, task_type.as_str(), complexity_label(complexity)],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;
            Ok(row.map(|(trial_count, success_count, weighted_rating)| ModelPerformanceRow {
                trial_count: trial_count as u64,
                success_count: success_count as u64,
                weighted_rating,
            }))
        })
    }

    pub fn record_rate_limit_event(
        &self,
        model: &str,
        reset_at: Option<DateTime<Utc>>,
        remaining: Option<u32>,
        limit: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO rate_limit_events (model, reset_at, remaining, limit_value, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![model, reset_at.map(|t| t.to_rfc3339()), remaining, limit, now.to_rfc3339()],
            )?;
            Ok(())
        })
    }

    /// The furthest-out reset time across `model`'s recorded rate-limit
    /// events, if any carried one. Takes the max rather than the single
    /// most recent row: a later event recorded without reset info (e.g. a
    /// provider response that didn't include it) must not mask an earlier
    /// event's still-future reset time for the same model.
    pub fn latest_rate_limit(&self, model: &str) -> Result<Option<DateTime<Utc>>> {
        self.with_conn(|conn| {
            let row: Option<String> = conn
                .query_row(
                    "SELECT MAX(reset_at) FROM rate_limit_events WHERE model = ?1 AND reset_at IS NOT NULL",
                    params![model],
                    |row| row.get(0),
                )
                .optional()?
                .flatten();
            Ok(row.map(|ts| parse_datetime(&ts)))
        })
    }
}

fn row_to_outcome(row: &rusqlite::Row) -> rusqlite::Result<OutcomeRecord> {
    let task_type: String = row.get(4)?;
    let complexity: String = row.get(5)?;
    let timestamp: String = row.get(16)?;
    Ok(OutcomeRecord {
        task_id: row.get(0)?,
        model: row.get(1)?,
        variant_id: row.get(2)?,
        agent_id: row.get(3)?,
        task_type: parse_task_type(&task_type),
        complexity: parse_complexity(&complexity),
        success: row.get(6)?,
        quality: row.get(7)?,
        actual_cost: row.get(8)?,
        actual_latency_ms: row.get(9)?,
        tokens_in: row.get(10)?,
        tokens_out: row.get(11)?,
        thinking_tokens: row.get(12)?,
        used_fallback: row.get(13)?,
        error: row.get(14)?,
        user_rating: row.get(15)?,
        timestamp: parse_datetime(&timestamp),
    })
}

fn row_to_variant(row: &rusqlite::Row) -> rusqlite::Result<PromptVariant> {
    let created_at: String = row.get(5)?;
    let mutation_type: String = row.get(11)?;
    let status: String = row.get(13)?;
    Ok(PromptVariant {
        id: row.get(0)?,
        agent_id: row.get(1)?,
        version: row.get(2)?,
        prompt_body: row.get(3)?,
        system_prompt: row.get(4)?,
        created_at: parse_datetime(&created_at),
        trial_count: row.get(6)?,
        success_count: row.get(7)?,
        avg_duration_ms: row.get(8)?,
        avg_tokens: row.get(9)?,
        parent_variant_id: row.get(10)?,
        mutation_type: parse_mutation_type(&mutation_type),
        mutation_reason: row.get(12)?,
        status: parse_variant_status(&status),
    })
}

fn row_to_gap(row: &rusqlite::Row) -> rusqlite::Result<CapabilityGap> {
    let category: String = row.get(1)?;
    let affected: String = row.get(4)?;
    let patterns: String = row.get(5)?;
    let severity: String = row.get(6)?;
    let status: String = row.get(8)?;
    Ok(CapabilityGap {
        id: row.get(0)?,
        category: parse_gap_category(&category),
        description: row.get(2)?,
        failure_count: row.get(3)?,
        affected_task_ids: if affected.is_empty() { Vec::new() } else { affected.split(',').map(String::from).collect() },
        error_patterns: if patterns.is_empty() { Vec::new() } else { patterns.split('\u{1f}').map(String::from).collect() },
        severity: parse_severity(&severity),
        frequency_per_day: row.get(7)?,
        status: parse_gap_status(&status),
    })
}

fn gap_category_label(c: GapCategory) -> &'static str {
    match c {
        GapCategory::MissingSkill => "missing-skill",
        GapCategory::ToolLimitation => "tool-limitation",
        GapCategory::KnowledgeGap => "knowledge-gap",
        GapCategory::PatternFailure => "pattern-failure",
    }
}

fn parse_gap_category(text: &str) -> GapCategory {
    match text {
        "tool-limitation" => GapCategory::ToolLimitation,
        "knowledge-gap" => GapCategory::KnowledgeGap,
        "pattern-failure" => GapCategory::PatternFailure,
        _ => GapCategory::MissingSkill,
    }
}

fn severity_label(s: Severity) -> &'static str {
    match s {
        Severity::Low => "low",
        Severity::Medium => "medium",
        Severity::High => "high",
        Severity::Critical => "critical",
    }
}

fn parse_severity(text: &str) -> Severity {
    match text {
        "medium" => Severity::Medium,
        "high" => Severity::High,
        "critical" => Severity::Critical,
        _ => Severity::Low,
    }
}

fn gap_status_label(s: GapStatus) -> &'static str {
    match s {
        GapStatus::Open => "open",
        GapStatus::Addressing => "addressing",
        GapStatus::Resolved => "resolved",
    }
}

fn parse_gap_status(text: &str) -> GapStatus {
    match text {
        "addressing" => GapStatus::Addressing,
        "resolved" => GapStatus::Resolved,
        _ => GapStatus::Open,
    }
}

fn parse_datetime(text: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn complexity_label(c: Complexity) -> &'static str {
    match c {
        Complexity::Simple => "simple",
        Complexity::Medium => "medium",
        Complexity::Complex => "complex",
        Complexity::Critical => "critical",
    }
}

fn parse_complexity(text: &str) -> Complexity {
    match text {
        "medium" => Complexity::Medium,
        "complex" => Complexity::Complex,
        "critical" => Complexity::Critical,
        _ => Complexity::Simple,
    }
}

fn parse_task_type(text: &str) -> TaskType {
    TaskType::ALL
        .into_iter()
        .find(|t| t.as_str() == text)
        .unwrap_or(TaskType::SimpleTask)
}

fn mutation_type_label(m: MutationType) -> &'static str {
    match m {
        MutationType::Manual => "manual",
        MutationType::Automated => "automated",
        MutationType::Evolutionary => "evolutionary",
    }
}

fn parse_mutation_type(text: &str) -> MutationType {
    match text {
        "automated" => MutationType::Automated,
        "evolutionary" => MutationType::Evolutionary,
        _ => MutationType::Manual,
    }
}

fn variant_status_label(s: VariantStatus) -> &'static str {
    match s {
        VariantStatus::Testing => "testing",
        VariantStatus::Active => "active",
        VariantStatus::Archived => "archived",
    }
}

fn parse_variant_status(text: &str) -> VariantStatus {
    match text {
        "active" => VariantStatus::Active,
        "archived" => VariantStatus::Archived,
        _ => VariantStatus::Testing,
    }
}

fn feedback_kind_label(k: FeedbackKind) -> &'static str {
    match k {
        FeedbackKind::Explicit => "explicit",
        FeedbackKind::Implicit => "implicit",
    }
}

fn implicit_sub_kind_label(k: ImplicitSubKind) -> &'static str {
    match k {
        ImplicitSubKind::Retry => "retry",
        ImplicitSubKind::MinorEdit => "minor-edit",
        ImplicitSubKind::MajorEdit => "major-edit",
        ImplicitSubKind::CompleteRewrite => "complete-rewrite",
        ImplicitSubKind::Abandon => "abandon",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Complexity;

    fn sample_outcome() -> OutcomeRecord {
        OutcomeRecord {
            task_id: "task-1".into(),
            model: "claude-sonnet".into(),
            variant_id: "agent-a-v1".into(),
            agent_id: "agent-a".into(),
            task_type: TaskType::Debugging,
            complexity: Complexity::Medium,
            success: true,
            quality: 0.9,
            actual_cost: 0.01,
            actual_latency_ms: 1200,
            tokens_in: 500,
            tokens_out: 800,
            thinking_tokens: 0,
            used_fallback: false,
            error: None,
            user_rating: Some(5),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn recording_and_reading_back_an_outcome_round_trips() {
        let ledger = Ledger::in_memory().unwrap();
        ledger.record_outcome(&sample_outcome()).unwrap();
        let outcomes = ledger.outcomes_for_agent("agent-a", None).unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].task_id, "task-1");
        assert_eq!(outcomes[0].task_type, TaskType::Debugging);
    }

    #[test]
    fn total_cost_since_sums_recorded_outcomes() {
        let ledger = Ledger::in_memory().unwrap();
        ledger.record_outcome(&sample_outcome()).unwrap();
        let total = ledger.total_cost_since(DateTime::<Utc>::MIN_UTC).unwrap();
        assert!((total - 0.01).abs() < 1e-9);
    }

    #[test]
    fn variant_insert_and_update_round_trips() {
        let ledger = Ledger::in_memory().unwrap();
        let mut variant = PromptVariant::seed("agent-a", "do the thing", Utc::now());
        ledger.insert_variant(&variant).unwrap();
        variant.trial_count = 5;
        variant.success_count = 3;
        ledger.update_variant(&variant).unwrap();
        let variants = ledger.variants_for_agent("agent-a").unwrap();
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].trial_count, 5);
        assert_eq!(variants[0].success_count, 3);
    }

    #[test]
    fn gap_upsert_updates_existing_row_in_place() {
        let ledger = Ledger::in_memory().unwrap();
        let mut gap = CapabilityGap {
            id: "gap-1".into(),
            category: GapCategory::ToolLimitation,
            description: "d".into(),
            failure_count: 3,
            affected_task_ids: vec!["t1".into(), "t2".into()],
            error_patterns: vec!["missing_tool_permission".into()],
            severity: Severity::Medium,
            frequency_per_day: 1.0,
            status: GapStatus::Open,
        };
        ledger.upsert_gap(&gap).unwrap();
        gap.failure_count = 5;
        gap.severity = Severity::High;
        ledger.upsert_gap(&gap).unwrap();

        let open = ledger.gaps_by_status(GapStatus::Open).unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].failure_count, 5);
        assert_eq!(open[0].severity, Severity::High);
        assert_eq!(open[0].affected_task_ids, vec!["t1", "t2"]);
    }

    #[test]
    fn skill_suggestions_round_trip_per_gap() {
        let ledger = Ledger::in_memory().unwrap();
        let now = Utc::now();
        ledger
            .insert_skill_suggestions("gap-1", &["add a worked example".to_string()], now)
            .unwrap();
        let suggestions = ledger.suggestions_for_gap("gap-1").unwrap();
        assert_eq!(suggestions, vec!["add a worked example"]);
    }

    #[test]
    fn fallback_events_are_recorded_most_recent_first() {
        let ledger = Ledger::in_memory().unwrap();
        let now = Utc::now();
        ledger
            .record_fallback_event(&FallbackEvent {
                task_id: "t1".into(),
                model: "claude-opus".into(),
                attempt: 1,
                error: "timeout".into(),
                timestamp: now,
            })
            .unwrap();
        ledger
            .record_fallback_event(&FallbackEvent {
                task_id: "t1".into(),
                model: "claude-sonnet".into(),
                attempt: 2,
                error: "timeout".into(),
                timestamp: now + chrono::Duration::seconds(1),
            })
            .unwrap();
        let events = ledger.recent_fallback_events(10).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].model, "claude-sonnet");
    }

    #[test]
    fn evolution_reports_round_trip_since_a_cutoff() {
        let ledger = Ledger::in_memory().unwrap();
        let now = Utc::now();
        ledger
            .insert_evolution_report(&EvolutionReportRow {
                agent_id: "agent-a".into(),
                period_start: now - chrono::Duration::days(7),
                period_end: now,
                body: "declining trend, recommend rollback".into(),
                created_at: now,
            })
            .unwrap();
        let reports = ledger.evolution_reports_since(now - chrono::Duration::days(1)).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].agent_id, "agent-a");
    }

    #[test]
    fn model_performance_upserts_accumulate_trials_and_overwrite_rating() {
        let ledger = Ledger::in_memory().unwrap();
        let now = Utc::now();
        ledger
            .upsert_model_performance("claude-sonnet", TaskType::Debugging, Complexity::Medium, true, 0.8, now)
            .unwrap();
        ledger
            .upsert_model_performance("claude-sonnet", TaskType::Debugging, Complexity::Medium, false, 0.6, now)
            .unwrap();
        let row = ledger
            .model_performance("claude-sonnet", TaskType::Debugging, Complexity::Medium)
            .unwrap()
            .unwrap();
        assert_eq!(row.trial_count, 2);
        assert_eq!(row.success_count, 1);
        assert!((row.weighted_rating - 0.6).abs() < 1e-9);
    }

    #[test]
    fn outcomes_for_model_filters_by_model_type_and_complexity() {
        let ledger = Ledger::in_memory().unwrap();
        ledger.record_outcome(&sample_outcome()).unwrap();
        let matching = ledger
            .outcomes_for_model("claude-sonnet", TaskType::Debugging, Complexity::Medium, DateTime::<Utc>::MIN_UTC)
            .unwrap();
        assert_eq!(matching.len(), 1);
        let non_matching = ledger
            .outcomes_for_model("claude-sonnet", TaskType::Documentation, Complexity::Medium, DateTime::<Utc>::MIN_UTC)
            .unwrap();
        assert!(non_matching.is_empty());
    }

    #[test]
    fn rate_limit_events_round_trip_the_latest_reset_time() {
        let ledger = Ledger::in_memory().unwrap();
        let now = Utc::now();
        ledger
            .record_rate_limit_event("claude-opus", Some(now + chrono::Duration::minutes(1)), Some(0), Some(10), now)
            .unwrap();
        let later = now + chrono::Duration::seconds(5);
        ledger
            .record_rate_limit_event("claude-opus", Some(later + chrono::Duration::minutes(1)), Some(0), Some(10), later)
            .unwrap();
        let latest = ledger.latest_rate_limit("claude-opus").unwrap().unwrap();
        assert!((latest - (later + chrono::Duration::minutes(1))).num_seconds().abs() < 2);
        assert!(ledger.latest_rate_limit("claude-haiku").unwrap().is_none());
    }

    #[test]
    fn latest_rate_limit_is_not_masked_by_a_later_event_with_no_reset_time() {
        let ledger = Ledger::in_memory().unwrap();
        let now = Utc::now();
        let reset_at = now + chrono::Duration::minutes(10);
        ledger.record_rate_limit_event("claude-opus", Some(reset_at), Some(0), Some(10), now).unwrap();
        let later = now + chrono::Duration::minutes(2);
        ledger.record_rate_limit_event("claude-opus", None, None, None, later).unwrap();
        let latest = ledger.latest_rate_limit("claude-opus").unwrap().unwrap();
        assert!((latest - reset_at).num_seconds().abs() < 2);
    }

    #[test]
    fn budget_window_increments_accumulate() {
        let ledger = Ledger::in_memory().unwrap();
        let now = Utc::now();
        ledger.set_budget_window("daily", now, 0.0).unwrap();
        ledger.increment_budget_consumed("daily", 1.5).unwrap();
        ledger.increment_budget_consumed("daily", 0.5).unwrap();
        let (_, consumed) = ledger.budget_consumed("daily").unwrap().unwrap();
        assert!((consumed - 2.0).abs() < 1e-9);
    }
}
