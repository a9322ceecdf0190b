//! Deterministic, language-neutral task classification.
//!
//! Pure function, no I/O: a fixed keyword lexicon scores each of the 13
//! type buckets, and a handful of length/step-count heuristics fill in
//! complexity, pattern, and token estimates. Follows the catalog's
//! lazily-compiled regex-lexicon idiom rather than a runtime NLP model.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::{Complexity, TaskContext, TaskDescriptor, TaskPattern, TaskType};

struct TypeLexicon {
    task_type: TaskType,
    pattern: LazyLock<Regex>,
}

macro_rules! lexicon_entry {
    ($ty:expr, $pat:expr) => {
        TypeLexicon {
            task_type: $ty,
            pattern: LazyLock::new(|| Regex::new($pat).expect("invalid classifier regex")),
        }
    };
}

static DEBUGGING: TypeLexicon = lexicon_entry!(
    TaskType::Debugging,
    r"(?i)\b(debug|bug|error|exception|traceback|crash|broken|failing|stack\s*trace|not\s+work(ing)?|fix\s+the)\b"
);
static CODE_GENERATION: TypeLexicon = lexicon_entry!(
    TaskType::CodeGeneration,
    r"(?i)\b(implement|write\s+a|create\s+a|add\s+a|build\s+a|generate|scaffold|new\s+function|new\s+endpoint)\b"
);
static ARCHITECTURE: TypeLexicon = lexicon_entry!(
    TaskType::Architecture,
    r"(?i)\b(architecture|system\s+design|microservice|scalab|high.level\s+design|infrastructure|topology)\b"
);
static DOCUMENTATION: TypeLexicon = lexicon_entry!(
    TaskType::Documentation,
    r"(?i)\b(document|docs?\b|jsdoc|docstring|readme|comment(s|ing)?|changelog)\b"
);
static REFACTORING: TypeLexicon = lexicon_entry!(
    TaskType::Refactoring,
    r"(?i)\b(refactor|restructure|reorganize|clean\s*up|simplify\s+the|extract\s+(a\s+)?(function|method))\b"
);
static TESTING: TypeLexicon = lexicon_entry!(
    TaskType::Testing,
    r"(?i)\b(test|unit\s*test|integration\s*test|coverage|assert|mock|fixture)\b"
);
static CODE_REVIEW: TypeLexicon = lexicon_entry!(
    TaskType::CodeReview,
    r"(?i)\b(review\s+this|review\s+the|code\s+review|pull\s+request|pr\b|lgtm|feedback\s+on)\b"
);
static DATA_ANALYSIS: TypeLexicon = lexicon_entry!(
    TaskType::DataAnalysis,
    r"(?i)\b(analy[sz]e\s+the\s+data|dataset|statistics|correlation|visuali[sz]e|aggregate|metrics\s+report)\b"
);
static RESEARCH: TypeLexicon = lexicon_entry!(
    TaskType::Research,
    r"(?i)\b(research|investigate|compare\s+options|survey|evaluate\s+alternatives|look\s+into)\b"
);
static PLANNING: TypeLexicon = lexicon_entry!(
    TaskType::Planning,
    r"(?i)\b(plan|roadmap|milestone|break\s+down|prioriti[sz]e|schedule\s+the)\b"
);
static EXPLANATION: TypeLexicon = lexicon_entry!(
    TaskType::Explanation,
    r"(?i)\b(explain|what\s+(is|are|does)|how\s+does|why\s+does|walk\s+me\s+through)\b"
);
static TRANSLATION: TypeLexicon = lexicon_entry!(
    TaskType::Translation,
    r"(?i)\b(translate|localiz|convert\s+(this|the)\s+(code|file)\s+(to|into)|port\s+to)\b"
);

static ALL_LEXICONS: [&TypeLexicon; 12] = [
    &DEBUGGING,
    &CODE_GENERATION,
    &ARCHITECTURE,
    &DOCUMENTATION,
    &REFACTORING,
    &TESTING,
    &CODE_REVIEW,
    &DATA_ANALYSIS,
    &RESEARCH,
    &PLANNING,
    &EXPLANATION,
    &TRANSLATION,
];

static CRITICAL_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(production|mission.critical|critical\s+path|customer.facing\s+outage)\b")
        .expect("invalid regex")
});
static HIGH_COMPLEXITY_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(complex|intricate|multi.step|distributed|concurrent|comprehensive|thorough)\b")
        .expect("invalid regex")
});
static LOW_COMPLEXITY_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(simple|quick|trivial|just|only|small|tiny)\b").expect("invalid regex")
});
static STEP_SENTINELS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(then|next|after\s+that|finally)\b|^\s*\d+[.)]").expect("invalid regex")
});
static ITERATIVE_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(iterat|loop\s+until|repeat\s+until|try\s+again|retry)\b").expect("invalid regex")
});
static CHAIN_OF_THOUGHT_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(step\s+by\s+step|reason\s+through|think\s+through|walk\s+through\s+your\s+reasoning)\b")
        .expect("invalid regex")
});
static REASONING_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(why|reason|trade.?off|analy[sz]e|design\s+decision|root\s+cause)\b")
        .expect("invalid regex")
});
static BRIEF_MARKERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bbrief\b").expect("invalid regex"));
static DETAILED_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(comprehensive|detailed)\b").expect("invalid regex")
});
static CODE_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(function|class|method|endpoint|module|repository|codebase|code)\b")
        .expect("invalid regex")
});

/// Classify a single task string into a `TaskDescriptor`. Deterministic
/// and total: never fails, returns `simple-task` on empty or
/// unrecognizable input.
pub fn classify(task: &str, context: Option<&TaskContext>) -> TaskDescriptor {
    let trimmed = task.trim();
    if trimmed.is_empty() {
        return TaskDescriptor {
            task_text: task.to_string(),
            task_type: TaskType::SimpleTask,
            complexity: Complexity::Simple,
            pattern: TaskPattern::SingleShot,
            input_tokens_estimate: 0,
            output_tokens_estimate: 500,
            requires_thinking: false,
            involves_code: false,
            priority: 3,
            confidence: 0.3,
            constraints: None,
        };
    }

    let task_type = classify_type(trimmed);
    let complexity = classify_complexity(trimmed);
    let pattern = classify_pattern(trimmed);
    let involves_code = CODE_MARKERS.is_match(trimmed) || matches!(task_type, TaskType::CodeGeneration | TaskType::Debugging | TaskType::Refactoring | TaskType::Testing | TaskType::CodeReview);

    let input_tokens_estimate = estimate_input_tokens(trimmed);
    let output_tokens_estimate = estimate_output_tokens(trimmed, involves_code);
    let requires_thinking = matches!(complexity, Complexity::Complex | Complexity::Critical)
        || REASONING_KEYWORDS.is_match(trimmed);

    let mut confidence = base_confidence(trimmed, task_type);
    if let Some(ctx) = context {
        if ctx.files_touched.len() > 1 && matches!(task_type, TaskType::Refactoring | TaskType::Architecture | TaskType::Debugging) {
            confidence = (confidence + 0.05).min(1.0);
        }
    }

    TaskDescriptor {
        task_text: task.to_string(),
        task_type,
        complexity,
        pattern,
        input_tokens_estimate,
        output_tokens_estimate,
        requires_thinking,
        involves_code,
        priority: 3,
        confidence,
        constraints: None,
    }
}

/// Batch form of `classify`.
pub fn classify_many(tasks: &[String], context: Option<&TaskContext>) -> Vec<TaskDescriptor> {
    tasks.iter().map(|t| classify(t, context)).collect()
}

fn classify_type(task: &str) -> TaskType {
    let mut best: Option<(TaskType, usize)> = None;
    for lexicon in ALL_LEXICONS.iter() {
        let count = lexicon.pattern.find_iter(task).count();
        if count == 0 {
            continue;
        }
        best = Some(match best {
            None => (lexicon.task_type, count),
            Some((best_type, best_count)) => {
                if count > best_count
                    || (count == best_count && lexicon.task_type.specificity() > best_type.specificity())
                {
                    (lexicon.task_type, count)
                } else {
                    (best_type, best_count)
                }
            }
        });
    }
    best.map(|(t, _)| t).unwrap_or(TaskType::SimpleTask)
}

fn classify_complexity(task: &str) -> Complexity {
    if CRITICAL_MARKERS.is_match(task) {
        return Complexity::Critical;
    }

    let high = HIGH_COMPLEXITY_MARKERS.find_iter(task).count();
    let low = LOW_COMPLEXITY_MARKERS.find_iter(task).count();
    if high > low && high > 0 {
        return Complexity::Complex;
    }
    if low > high && low > 0 {
        return Complexity::Simple;
    }

    let len = task.len();
    if len > 500 {
        return Complexity::Complex;
    }
    if len < 100 {
        return Complexity::Simple;
    }

    let steps = STEP_SENTINELS.find_iter(task).count();
    if steps > 5 {
        Complexity::Complex
    } else if steps > 2 {
        Complexity::Medium
    } else {
        Complexity::Medium
    }
}

fn classify_pattern(task: &str) -> TaskPattern {
    if CHAIN_OF_THOUGHT_MARKERS.is_match(task) {
        TaskPattern::ChainOfThought
    } else if ITERATIVE_MARKERS.is_match(task) {
        TaskPattern::Iterative
    } else if STEP_SENTINELS.find_iter(task).count() >= 1 {
        TaskPattern::MultiStep
    } else {
        TaskPattern::SingleShot
    }
}

fn estimate_input_tokens(task: &str) -> u32 {
    let base = (task.len() as f64 / 4.0).ceil() as u32;
    base + 500
}

fn estimate_output_tokens(task: &str, involves_code: bool) -> u32 {
    let base: u32 = if BRIEF_MARKERS.is_match(task) {
        500
    } else if DETAILED_MARKERS.is_match(task) {
        2000
    } else if involves_code {
        1500
    } else {
        1000
    };

    if task.len() > 500 {
        ((base as f64) * 1.5) as u32
    } else {
        base
    }
}

fn base_confidence(task: &str, task_type: TaskType) -> f64 {
    let mut confidence: f64 = 0.5;
    if task_type != TaskType::SimpleTask {
        confidence += 0.2;
    }
    if task.len() > 20 {
        confidence += 0.1;
    }
    if task.len() > 200 {
        confidence += 0.1;
    }
    confidence.clamp(0.3, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_classifies_as_simple_task() {
        let descriptor = classify("", None);
        assert_eq!(descriptor.task_type, TaskType::SimpleTask);
        assert_eq!(descriptor.complexity, Complexity::Simple);
        assert_eq!(descriptor.pattern, TaskPattern::SingleShot);
        assert_eq!(descriptor.confidence, 0.3);
    }

    #[test]
    fn classification_is_deterministic() {
        let task = "Design scalable microservices architecture for e-commerce platform";
        assert_eq!(classify(task, None).task_type, classify(task, None).task_type);
    }

    #[test]
    fn documentation_task_is_simple() {
        let descriptor = classify("Add JSDoc comments to utility functions", None);
        assert_eq!(descriptor.task_type, TaskType::Documentation);
        assert_eq!(descriptor.complexity, Complexity::Simple);
    }

    #[test]
    fn architecture_task_requires_thinking() {
        let descriptor = classify(
            "Design scalable microservices architecture for e-commerce platform",
            None,
        );
        assert_eq!(descriptor.task_type, TaskType::Architecture);
        assert_eq!(descriptor.complexity, Complexity::Complex);
        assert!(descriptor.requires_thinking);
    }

    #[test]
    fn debugging_wins_tie_over_code_generation() {
        let task = "implement a fix for this bug";
        let descriptor = classify(task, None);
        assert_eq!(descriptor.task_type, TaskType::Debugging);
    }

    #[test]
    fn production_marker_forces_critical_complexity() {
        let descriptor = classify("Investigate a production incident affecting checkout", None);
        assert_eq!(descriptor.complexity, Complexity::Critical);
    }

    #[test]
    fn brief_marker_caps_output_estimate_at_500() {
        let descriptor = classify("Give me a brief explanation of this function", None);
        assert_eq!(descriptor.output_tokens_estimate, 500);
    }

    #[test]
    fn context_nudges_confidence_for_multi_file_refactor() {
        let ctx = TaskContext {
            files_touched: vec!["a.rs".into(), "b.rs".into()],
            prior_turn_was_error: false,
            recent_tool_output_chars: 0,
        };
        let without = classify("Refactor the shared utility module", None).confidence;
        let with = classify("Refactor the shared utility module", Some(&ctx)).confidence;
        assert!(with >= without);
    }
}
