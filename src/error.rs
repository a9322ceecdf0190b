//! Error types for the orchestration runtime.

use thiserror::Error;

/// Result type alias using the runtime's `Error` type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while routing, executing, or learning from a task.
#[derive(Error, Debug)]
pub enum Error {
    /// No model in the catalog could satisfy every hard constraint and no
    /// `defaultModel` was configured to absorb the failure.
    #[error("no model satisfies constraints: {0}")]
    ConstraintViolation(String),

    /// A budget window would be exceeded by the estimated cost of a task.
    #[error("budget blocked: {scope} window would exceed limit ({spent:.4} + {estimated:.4} > {limit:.4})")]
    BudgetBlock {
        scope: String,
        spent: f64,
        estimated: f64,
        limit: f64,
    },

    /// A provider reported rate limiting for `model`. Recovered locally by
    /// the Fallback Executor; only surfaces when every model is exhausted.
    #[error("model {model} is rate limited")]
    RateLimited { model: String },

    /// A provider error for `model`. `transient` errors are retried with
    /// backoff; non-transient errors fall through to the next model
    /// immediately.
    #[error("provider error for {model} ({kind}): {message}")]
    ProviderError {
        model: String,
        message: String,
        transient: bool,
        kind: ProviderErrorKind,
    },

    /// A single attempt against `model` exceeded its timeout. Always
    /// treated as transient.
    #[error("timed out invoking {model} after {duration_ms}ms")]
    TimeoutError { model: String, duration_ms: u64 },

    /// Every model in a fallback chain was exhausted without success.
    #[error("fallback chain exhausted after {attempts} attempts across {models_tried} models")]
    FallbackExhausted {
        attempts: u32,
        models_tried: u32,
        errors: Vec<String>,
    },

    /// The model or agent/variant catalog is missing an entry the runtime
    /// depends on. Fatal at startup, not during a request.
    #[error("catalog miss: {0}")]
    CatalogMiss(String),

    /// An internal invariant was violated. Logged and the current request
    /// is aborted without committing an outcome.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Configuration failed validation on load (e.g. weights do not sum
    /// to 1.0, or an unknown backoff kind was supplied).
    #[error("configuration error: {0}")]
    Config(String),

    /// Ledger (SQLite) storage error.
    #[error("ledger storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A suspension point (invoke, sleep, ledger write) was cancelled by
    /// the caller's cancellation token.
    #[error("operation cancelled")]
    Cancelled,

    /// Internal error not covered by a more specific variant.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Whether a provider error is worth retrying and how it was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Classified by substring match against the response body.
    Heuristic,
    /// Classified from a structured error reported by the invoker.
    Structured,
}

impl std::fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderErrorKind::Heuristic => write!(f, "heuristic"),
            ProviderErrorKind::Structured => write!(f, "structured"),
        }
    }
}

impl Error {
    pub fn constraint_violation(detail: impl Into<String>) -> Self {
        Self::ConstraintViolation(detail.into())
    }

    pub fn budget_block(scope: impl Into<String>, spent: f64, estimated: f64, limit: f64) -> Self {
        Self::BudgetBlock {
            scope: scope.into(),
            spent,
            estimated,
            limit,
        }
    }

    pub fn rate_limited(model: impl Into<String>) -> Self {
        Self::RateLimited {
            model: model.into(),
        }
    }

    pub fn provider_error(
        model: impl Into<String>,
        message: impl Into<String>,
        transient: bool,
        kind: ProviderErrorKind,
    ) -> Self {
        Self::ProviderError {
            model: model.into(),
            message: message.into(),
            transient,
            kind,
        }
    }

    pub fn timeout(model: impl Into<String>, duration_ms: u64) -> Self {
        Self::TimeoutError {
            model: model.into(),
            duration_ms,
        }
    }

    pub fn catalog_miss(detail: impl Into<String>) -> Self {
        Self::CatalogMiss(detail.into())
    }

    pub fn invariant_violation(detail: impl Into<String>) -> Self {
        Self::InvariantViolation(detail.into())
    }

    /// The exit-code mapping for the control surface: 0 ok (not an
    /// error), 1 constraint/budget, 2 everything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::ConstraintViolation(_) | Error::BudgetBlock { .. } => 1,
            _ => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_violation_exit_code_is_one() {
        assert_eq!(Error::constraint_violation("no match").exit_code(), 1);
    }

    #[test]
    fn budget_block_exit_code_is_one() {
        let err = Error::budget_block("daily", 0.95, 0.08, 1.0);
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn internal_error_exit_code_is_two() {
        assert_eq!(Error::Internal("oops".into()).exit_code(), 2);
    }

    #[test]
    fn fallback_exhausted_exit_code_is_two() {
        let err = Error::FallbackExhausted {
            attempts: 3,
            models_tried: 2,
            errors: vec!["a".into(), "b".into()],
        };
        assert_eq!(err.exit_code(), 2);
    }
}
