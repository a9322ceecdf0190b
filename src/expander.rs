//! Capability Expander: discovers recurring failure patterns,
//! proposes skill suggestions, and generates agent compositions.
//!
//! Grounded on the catalog's grouping/aggregation style in
//! `memory/store.rs`'s `query_nodes` (group results, filter by a minimum
//! count, then rank) generalized from memory nodes to failed outcomes.

use std::collections::HashMap;

use crate::types::{CapabilityGap, GapCategory, GapStatus, OutcomeRecord, Severity};

pub const MIN_FAILURES_FOR_GAP: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositionPattern {
    Sequential,
    Hierarchical,
    Mesh,
    Parallel,
}

#[derive(Debug, Clone)]
pub struct AgentComposition {
    pub pattern: CompositionPattern,
    pub member_roles: Vec<String>,
    pub rationale: String,
}

/// Gap discovery: group failed outcomes by `(errorType, capabilities)`
/// (approximated here as `(error, sorted task types)` since the runtime
/// has no separate capability-tag field on an outcome) and keep groups at
/// or above `MIN_FAILURES_FOR_GAP`.
pub fn discover_gaps(failures: &[OutcomeRecord], window_days: f64) -> Vec<CapabilityGap> {
    let mut groups: HashMap<(String, String), Vec<&OutcomeRecord>> = HashMap::new();

    for outcome in failures.iter().filter(|o| !o.success) {
        let error_key = outcome.error.clone().unwrap_or_else(|| "unknown".to_string());
        let task_key = outcome.task_type.as_str().to_string();
        groups.entry((error_key, task_key)).or_default().push(outcome);
    }

    groups
        .into_iter()
        .filter(|(_, members)| members.len() >= MIN_FAILURES_FOR_GAP)
        .map(|((error_key, task_key), members)| {
            let failure_count = members.len() as u32;
            let frequency_per_day = failure_count as f64 / window_days.max(1.0);
            let severity = severity_for_frequency(frequency_per_day);
            CapabilityGap {
                id: format!("gap-{error_key}-{task_key}"),
                category: classify_gap_category(&error_key),
                description: format!("{failure_count} failures of kind '{error_key}' on {task_key} tasks"),
                failure_count,
                affected_task_ids: members.iter().map(|o| o.task_id.clone()).collect(),
                error_patterns: vec![error_key],
                severity,
                frequency_per_day,
                status: GapStatus::Open,
            }
        })
        .collect()
}

/// Severity thresholds: failures/day > 5 critical, > 2 high, > 0.5
/// medium, else low.
fn severity_for_frequency(frequency_per_day: f64) -> Severity {
    if frequency_per_day > 5.0 {
        Severity::Critical
    } else if frequency_per_day > 2.0 {
        Severity::High
    } else if frequency_per_day > 0.5 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

fn classify_gap_category(error_key: &str) -> GapCategory {
    let lower = error_key.to_lowercase();
    if lower.contains("tool") || lower.contains("permission") {
        GapCategory::ToolLimitation
    } else if lower.contains("unknown") || lower.contains("unfamiliar") || lower.contains("knowledge") {
        GapCategory::KnowledgeGap
    } else if lower.contains("pattern") || lower.contains("repeat") {
        GapCategory::PatternFailure
    } else {
        GapCategory::MissingSkill
    }
}

/// Skill suggestions: one short suggestion string per gap, keyed by
/// its category.
pub fn suggest_skills(gap: &CapabilityGap) -> Vec<String> {
    match gap.category {
        GapCategory::MissingSkill => vec![format!(
            "add a worked example covering: {}",
            gap.error_patterns.join(", ")
        )],
        GapCategory::ToolLimitation => vec![format!(
            "grant or document the tool access needed for: {}",
            gap.description
        )],
        GapCategory::KnowledgeGap => vec![format!(
            "add reference material for: {}",
            gap.error_patterns.join(", ")
        )],
        GapCategory::PatternFailure => vec![format!(
            "add a guardrail or checklist step to prevent: {}",
            gap.error_patterns.join(", ")
        )],
    }
}

/// Composition generation: propose a multi-agent split for a gap with
/// enough severity to warrant decomposition.
pub fn propose_composition(gap: &CapabilityGap) -> Option<AgentComposition> {
    if gap.severity < Severity::High {
        return None;
    }
    let pattern = match gap.category {
        GapCategory::MissingSkill => CompositionPattern::Sequential,
        GapCategory::ToolLimitation => CompositionPattern::Hierarchical,
        GapCategory::KnowledgeGap => CompositionPattern::Mesh,
        GapCategory::PatternFailure => CompositionPattern::Parallel,
    };
    Some(AgentComposition {
        pattern,
        member_roles: vec!["specialist".to_string(), "reviewer".to_string()],
        rationale: format!("split {} to isolate the recurring failure", gap.description),
    })
}
