//! Prompt Optimizer: a per-agent UCB1 bandit over `PromptVariant`s,
//! plus the mutation table that drives evolution when a variant is
//! promoted or a capability gap demands a new candidate.
//!
//! Grounded on the catalog's evolution operations in `memory/store.rs`
//! (`promote`/`decay`/`consolidate`/`log_evolution`): same shape of
//! "serialize a state transition, then append an audit row" but applied
//! to prompt variants instead of memory nodes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::types::{MutationType, PromptVariant, VariantStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationOperator {
    Clarify,
    Expand,
    Simplify,
    Reframe,
    AddConstraint,
    RemoveConstraint,
}

impl MutationOperator {
    pub const ALL: [MutationOperator; 6] = [
        MutationOperator::Clarify,
        MutationOperator::Expand,
        MutationOperator::Simplify,
        MutationOperator::Reframe,
        MutationOperator::AddConstraint,
        MutationOperator::RemoveConstraint,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MutationOperator::Clarify => "clarify",
            MutationOperator::Expand => "expand",
            MutationOperator::Simplify => "simplify",
            MutationOperator::Reframe => "reframe",
            MutationOperator::AddConstraint => "add_constraint",
            MutationOperator::RemoveConstraint => "remove_constraint",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationTarget {
    System,
    User,
    Both,
}

/// Table-driven mapping from an observed failure category to the
/// mutation operators worth trying next.
pub fn operators_for_error_kind(error_kind: &str) -> &'static [MutationOperator] {
    match error_kind {
        "ambiguous_instructions" => &[MutationOperator::Clarify, MutationOperator::Reframe],
        "missed_constraint" => &[MutationOperator::AddConstraint, MutationOperator::Clarify],
        "over_verbose" => &[MutationOperator::Simplify, MutationOperator::RemoveConstraint],
        "under_specified" => &[MutationOperator::Expand, MutationOperator::AddConstraint],
        "wrong_format" => &[MutationOperator::Reframe, MutationOperator::AddConstraint],
        _ => &[MutationOperator::Clarify, MutationOperator::Expand, MutationOperator::Simplify],
    }
}

/// Classify a raw outcome error string into one of the failure categories
/// `operators_for_error_kind` understands. Mirrors `expander`'s
/// `classify_gap_category` substring heuristic, applied to a single error
/// instead of a group of outcomes.
pub fn classify_error_kind(error: &str) -> &'static str {
    let lower = error.to_lowercase();
    if lower.contains("ambiguous") || lower.contains("unclear") || lower.contains("misunderstood") {
        "ambiguous_instructions"
    } else if lower.contains("constraint") || lower.contains("requirement") || lower.contains("missed") {
        "missed_constraint"
    } else if lower.contains("verbose") || lower.contains("too long") || lower.contains("rambling") {
        "over_verbose"
    } else if lower.contains("under-specified") || lower.contains("underspecified") || lower.contains("incomplete") {
        "under_specified"
    } else if lower.contains("format") || lower.contains("schema") || lower.contains("parse") {
        "wrong_format"
    } else {
        "unknown"
    }
}

/// A canned instruction fragment appended to a parent variant's
/// `prompt_body` when no LLM rewrite is available to produce the mutated
/// text.
pub fn mutation_template(operator: MutationOperator) -> &'static str {
    match operator {
        MutationOperator::Clarify => {
            "\n\nBe explicit about what \"done\" looks like before you start; restate the task in your own words first."
        }
        MutationOperator::Expand => {
            "\n\nThink through edge cases and any information you are missing before answering; ask rather than assume."
        }
        MutationOperator::Simplify => {
            "\n\nAnswer as concisely as the task allows; drop any explanation the user did not ask for."
        }
        MutationOperator::Reframe => {
            "\n\nTreat this as a structured task with a specific required output shape, not open-ended prose."
        }
        MutationOperator::AddConstraint => {
            "\n\nFollow every constraint given exactly; do not substitute a similar approach for the one requested."
        }
        MutationOperator::RemoveConstraint => {
            "\n\nFocus only on the core request; do not add unrequested caveats, alternatives, or extra scope."
        }
    }
}

/// UCB1 score for a single variant given the total trial count across all
/// of its agent's variants. Uses `ln(n_total + 1)` rather than bare
/// `ln(n_total)` so a cold-started agent (zero total trials) never divides
/// by an undefined log (see the zero-trial-safeguard decision in DESIGN.md).
pub fn ucb1_score(variant: &PromptVariant, total_trials: u64, exploration_parameter: f64) -> f64 {
    if variant.trial_count == 0 {
        return f64::INFINITY;
    }
    let success_rate = variant.success_rate();
    let exploration = exploration_parameter
        * ((total_trials as f64 + 1.0).ln() / variant.trial_count as f64).sqrt();
    success_rate + exploration
}

#[derive(Debug, Clone)]
pub struct PromotionConfig {
    pub min_trials: u32,
    pub min_success_rate_delta: f64,
}

impl Default for PromotionConfig {
    fn default() -> Self {
        Self {
            min_trials: 20,
            min_success_rate_delta: 0.05,
        }
    }
}

/// An in-memory, per-agent view over variants. Persistence (insert/update
/// rows) is the Ledger's job; this type only holds the selection and
/// promotion logic over whatever the Ledger hands it.
pub struct PromptOptimizer {
    exploration_parameter: f64,
    promotion: PromotionConfig,
    /// Per-agent mutexes serializing promotion/mutation decisions so two
    /// concurrent evolutions for the same agent can't both win. `Runtime`'s
    /// control-surface methods are synchronous end to end (the Ledger
    /// itself is a `std::sync::Mutex<Connection>`), so this lock is
    /// synchronous too rather than `tokio::sync::Mutex`.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PromptOptimizer {
    pub fn new(exploration_parameter: f64, promotion: PromotionConfig) -> Self {
        Self {
            exploration_parameter,
            promotion,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Select the variant with the highest UCB1 score, forcing exploration
    /// of any variant with zero trials first.
    pub fn select<'a>(&self, variants: &'a [PromptVariant]) -> Option<&'a PromptVariant> {
        let active: Vec<&PromptVariant> = variants
            .iter()
            .filter(|v| v.status != VariantStatus::Archived)
            .collect();
        if active.is_empty() {
            return None;
        }
        let total_trials: u64 = active.iter().map(|v| v.trial_count).sum();
        active.into_iter().max_by(|a, b| {
            let sa = ucb1_score(a, total_trials, self.exploration_parameter);
            let sb = ucb1_score(b, total_trials, self.exploration_parameter);
            sa.partial_cmp(&sb).unwrap_or(std::cmp::Ordering::Equal)
        })
    }

    /// Update a variant's running statistics after an outcome. Uses the
    /// standard incremental-mean update so callers never need the full
    /// trial history in memory.
    pub fn record_outcome(
        &self,
        variant: &mut PromptVariant,
        success: bool,
        duration_ms: f64,
        tokens: f64,
    ) {
        let n = variant.trial_count as f64;
        variant.avg_duration_ms = (variant.avg_duration_ms * n + duration_ms) / (n + 1.0);
        variant.avg_tokens = (variant.avg_tokens * n + tokens) / (n + 1.0);
        variant.trial_count += 1;
        if success {
            variant.success_count += 1;
        }
    }

    /// Promotion rule: a `testing` variant with at least
    /// `min_trials` trials and a success rate at least
    /// `min_success_rate_delta` above the currently active variant
    /// becomes active; the previous active variant is archived.
    ///
    /// Caller must hold the per-agent lock (via `lock_agent`) across the
    /// read-evaluate-write sequence to keep the swap atomic.
    pub fn try_promote(&self, candidate: &PromptVariant, current_active: Option<&PromptVariant>) -> bool {
        if candidate.status != VariantStatus::Testing {
            return false;
        }
        if candidate.trial_count < self.promotion.min_trials as u64 {
            return false;
        }
        match current_active {
            None => true,
            Some(active) => {
                candidate.success_rate() >= active.success_rate() + self.promotion.min_success_rate_delta
            }
        }
    }

    /// Returns the mutex guarding `agent_id`'s promotion/mutation
    /// sequence, creating it on first use. The caller holds the returned
    /// guard across its read-evaluate-write sequence; the same agent id
    /// always resolves to the same underlying mutex.
    pub fn lock_agent(&self, agent_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().expect("optimizer lock table poisoned");
        locks.entry(agent_id.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Generate a new `testing`-status variant by applying a mutation
    /// operator to a parent. The actual text transformation is left to the
    /// caller (an LLM rewrite, or a canned template); this only book-keeps
    /// lineage and versioning.
    pub fn mutate(
        &self,
        parent: &PromptVariant,
        operator: MutationOperator,
        _target: MutationTarget,
        new_prompt_body: String,
        new_system_prompt: Option<String>,
        now: DateTime<Utc>,
    ) -> PromptVariant {
        PromptVariant {
            id: format!("{}-v{}", parent.agent_id, parent.version + 1),
            agent_id: parent.agent_id.clone(),
            version: parent.version + 1,
            prompt_body: new_prompt_body,
            system_prompt: new_system_prompt,
            created_at: now,
            trial_count: 0,
            success_count: 0,
            avg_duration_ms: 0.0,
            avg_tokens: 0.0,
            parent_variant_id: Some(parent.id.clone()),
            mutation_type: MutationType::Evolutionary,
            mutation_reason: Some(operator.as_str().to_string()),
            status: VariantStatus::Testing,
        }
    }
}
