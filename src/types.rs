//! Core data model: catalogs, descriptors, decisions, and ledger records.
//!
//! Every enum with a fixed member set is a real Rust enum (never a bare
//! string), following the catalog's `Provider`/`ModelTier` convention.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The 13 task-type buckets the classifier recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    CodeGeneration,
    Debugging,
    Architecture,
    Documentation,
    Refactoring,
    Testing,
    CodeReview,
    DataAnalysis,
    Research,
    Planning,
    Explanation,
    Translation,
    SimpleTask,
}

impl TaskType {
    pub const ALL: [TaskType; 13] = [
        TaskType::CodeGeneration,
        TaskType::Debugging,
        TaskType::Architecture,
        TaskType::Documentation,
        TaskType::Refactoring,
        TaskType::Testing,
        TaskType::CodeReview,
        TaskType::DataAnalysis,
        TaskType::Research,
        TaskType::Planning,
        TaskType::Explanation,
        TaskType::Translation,
        TaskType::SimpleTask,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::CodeGeneration => "code-generation",
            TaskType::Debugging => "debugging",
            TaskType::Architecture => "architecture",
            TaskType::Documentation => "documentation",
            TaskType::Refactoring => "refactoring",
            TaskType::Testing => "testing",
            TaskType::CodeReview => "code-review",
            TaskType::DataAnalysis => "data-analysis",
            TaskType::Research => "research",
            TaskType::Planning => "planning",
            TaskType::Explanation => "explanation",
            TaskType::Translation => "translation",
            TaskType::SimpleTask => "simple-task",
        }
    }

    /// More specific buckets win type-count ties.
    pub fn specificity(&self) -> u8 {
        match self {
            TaskType::SimpleTask => 0,
            TaskType::CodeGeneration => 1,
            TaskType::Explanation | TaskType::Translation | TaskType::Research => 2,
            TaskType::Documentation | TaskType::Planning | TaskType::DataAnalysis => 3,
            TaskType::Refactoring | TaskType::Testing | TaskType::CodeReview => 4,
            TaskType::Architecture | TaskType::Debugging => 5,
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple = 0,
    Medium = 1,
    Complex = 2,
    Critical = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskPattern {
    SingleShot,
    MultiStep,
    Iterative,
    ChainOfThought,
}

/// Hard constraints a `TaskDescriptor` may carry. Violating any of these
/// eliminates a candidate model regardless of its other scores.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskConstraints {
    pub max_cost: Option<f64>,
    pub max_latency_ms: Option<u32>,
    pub min_quality: Option<f64>,
    pub preferred_model: Option<String>,
    pub required_capabilities: Vec<Capability>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Vision,
    ToolUse,
    ExtendedThinking,
}

/// Optional session context consulted by the classifier for a confidence
/// nudge; never required for a correct classification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskContext {
    pub files_touched: Vec<String>,
    pub prior_turn_was_error: bool,
    pub recent_tool_output_chars: usize,
}

/// Output of the Task Classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub task_text: String,
    pub task_type: TaskType,
    pub complexity: Complexity,
    pub pattern: TaskPattern,
    pub input_tokens_estimate: u32,
    pub output_tokens_estimate: u32,
    pub requires_thinking: bool,
    pub involves_code: bool,
    pub priority: u8,
    pub confidence: f64,
    pub constraints: Option<TaskConstraints>,
}

/// A model's static profile as loaded from the (external) model catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelProfile {
    pub name: String,
    pub provider: String,
    pub input_cost_per_1k: f64,
    pub output_cost_per_1k: f64,
    pub quality_score: f64,
    pub p50_latency_ms: u32,
    pub context_window: u32,
    pub max_output: u32,
    pub capabilities: Vec<Capability>,
    pub strength_tags: Vec<TaskType>,
}

impl ModelProfile {
    pub fn estimated_cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        (input_tokens as f64 / 1000.0) * self.input_cost_per_1k
            + (output_tokens as f64 / 1000.0) * self.output_cost_per_1k
    }

    pub fn has_capability(&self, cap: Capability) -> bool {
        self.capabilities.contains(&cap)
    }
}

/// Mapping from model name to profile; the "model catalog" of .
pub type ModelCatalog = HashMap<String, ModelProfile>;

/// A scored alternative in a `RoutingDecision`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredAlternative {
    pub model: String,
    pub score: f64,
    pub reason: String,
}

/// Output of the Model Router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub chosen_model: String,
    pub confidence: f64,
    pub reasoning: Vec<String>,
    pub alternatives: Vec<ScoredAlternative>,
    pub estimated_cost: f64,
    pub estimated_latency_ms: u32,
    pub fallback_chain: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub cache_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantStatus {
    Testing,
    Active,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationType {
    Manual,
    Automated,
    Evolutionary,
}

/// A prompt variant owned by the Optimizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptVariant {
    pub id: String,
    pub agent_id: String,
    pub version: u32,
    pub prompt_body: String,
    pub system_prompt: Option<String>,
    pub created_at: DateTime<Utc>,
    pub trial_count: u64,
    pub success_count: u64,
    pub avg_duration_ms: f64,
    pub avg_tokens: f64,
    pub parent_variant_id: Option<String>,
    pub mutation_type: MutationType,
    pub mutation_reason: Option<String>,
    pub status: VariantStatus,
}

impl PromptVariant {
    pub fn success_rate(&self) -> f64 {
        if self.trial_count == 0 {
            0.0
        } else {
            self.success_count as f64 / self.trial_count as f64
        }
    }

    pub fn seed(agent_id: impl Into<String>, prompt_body: impl Into<String>, now: DateTime<Utc>) -> Self {
        let agent_id = agent_id.into();
        Self {
            id: format!("{agent_id}-v1"),
            agent_id,
            version: 1,
            prompt_body: prompt_body.into(),
            system_prompt: None,
            created_at: now,
            trial_count: 0,
            success_count: 0,
            avg_duration_ms: 0.0,
            avg_tokens: 0.0,
            parent_variant_id: None,
            mutation_type: MutationType::Manual,
            mutation_reason: None,
            status: VariantStatus::Active,
        }
    }
}

/// A recorded outcome of executing a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub task_id: String,
    pub model: String,
    pub variant_id: String,
    pub agent_id: String,
    pub task_type: TaskType,
    pub complexity: Complexity,
    pub success: bool,
    pub quality: f64,
    pub actual_cost: f64,
    pub actual_latency_ms: u32,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub thinking_tokens: u32,
    pub used_fallback: bool,
    pub error: Option<String>,
    pub user_rating: Option<u8>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Explicit,
    Implicit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImplicitSubKind {
    Retry,
    MinorEdit,
    MajorEdit,
    CompleteRewrite,
    Abandon,
}

impl ImplicitSubKind {
    /// Implicit-signal-to-rating mapping.
    pub fn implied_rating(&self) -> u8 {
        match self {
            ImplicitSubKind::Retry => 2,
            ImplicitSubKind::MinorEdit => 3,
            ImplicitSubKind::MajorEdit => 2,
            ImplicitSubKind::CompleteRewrite => 1,
            ImplicitSubKind::Abandon => 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackSignal {
    pub task_id: String,
    pub agent_id: String,
    pub rating: u8,
    pub kind: FeedbackKind,
    pub sub_kind: Option<ImplicitSubKind>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GapCategory {
    MissingSkill,
    ToolLimitation,
    KnowledgeGap,
    PatternFailure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low = 0,
    Medium = 1,
    High = 2,
    Critical = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapStatus {
    Open,
    Addressing,
    Resolved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityGap {
    pub id: String,
    pub category: GapCategory,
    pub description: String,
    pub failure_count: u32,
    pub affected_task_ids: Vec<String>,
    pub error_patterns: Vec<String>,
    pub severity: Severity,
    pub frequency_per_day: f64,
    pub status: GapStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetScope {
    Daily,
    Monthly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetWindow {
    pub scope: BudgetScope,
    pub limit: f64,
    pub consumed: f64,
    pub reset_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrecheckResult {
    Ok,
    Warning,
    Block,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_type_display_matches_kebab_case() {
        assert_eq!(TaskType::CodeReview.as_str(), "code-review");
        assert_eq!(TaskType::SimpleTask.to_string(), "simple-task");
    }

    #[test]
    fn debugging_is_more_specific_than_code_generation() {
        assert!(TaskType::Debugging.specificity() > TaskType::CodeGeneration.specificity());
    }

    #[test]
    fn model_profile_estimates_cost_linearly() {
        let profile = ModelProfile {
            name: "test-model".into(),
            provider: "test".into(),
            input_cost_per_1k: 0.003,
            output_cost_per_1k: 0.015,
            quality_score: 80.0,
            p50_latency_ms: 1000,
            context_window: 200_000,
            max_output: 8192,
            capabilities: vec![],
            strength_tags: vec![],
        };
        let cost = profile.estimated_cost(1000, 1000);
        assert!((cost - 0.018).abs() < 1e-9);
    }

    #[test]
    fn variant_success_rate_handles_zero_trials() {
        let now = Utc::now();
        let variant = PromptVariant::seed("agent-a", "do the thing", now);
        assert_eq!(variant.success_rate(), 0.0);
    }

    #[test]
    fn implicit_sub_kind_mapping_matches_spec() {
        assert_eq!(ImplicitSubKind::Retry.implied_rating(), 2);
        assert_eq!(ImplicitSubKind::MinorEdit.implied_rating(), 3);
        assert_eq!(ImplicitSubKind::Abandon.implied_rating(), 1);
    }
}
