//! Fallback Executor: drives a `ModelInvoker` through a routing
//! decision's fallback chain with retry/backoff and rate-limit detection.
//!
//! Grounded on the catalog's `LLMClient` async trait (`llm/client.rs`) for
//! the shape of the callable contract, generalized from a single-provider
//! trait into one that any router-selected model can satisfy, and on
//! `orchestrator.rs`'s retry loop for the backoff/cancellation protocol.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::config::{BackoffKind, FallbackConfig};
use crate::error::{Error, ProviderErrorKind, Result};
use crate::types::RoutingDecision;

#[derive(Debug, Clone)]
pub struct InvokeRequest {
    pub model: String,
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct InvokeResponse {
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub latency_ms: u32,
}

/// Structured rate-limit metadata, when the provider supplies it.
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    pub reset_at: Option<chrono::DateTime<chrono::Utc>>,
    pub remaining: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone)]
pub enum InvokeError {
    RateLimited(RateLimitInfo),
    Transient(String),
    Terminal(String),
    Timeout,
    Cancelled,
}

/// The callable contract the Fallback Executor drives. Implemented by
/// whatever wraps the real provider SDK; kept as a trait so tests can
/// supply a scripted fake.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn invoke(&self, request: InvokeRequest) -> std::result::Result<InvokeResponse, InvokeError>;
}

/// Substring markers used when a provider doesn't return structured
/// rate-limit headers.
const RATE_LIMIT_MARKERS: &[&str] = &[
    "rate limit",
    "too many requests",
    "quota exceeded",
    "429",
    "throttled",
];

pub fn looks_like_rate_limit(message: &str) -> bool {
    let lower = message.to_lowercase();
    RATE_LIMIT_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// An idempotent transformation applied to a prompt before each retry
/// (e.g. stripping a prior failed attempt's partial output). Idempotent
/// so replaying it on an already-adapted prompt is a no-op.
pub type PromptAdapter = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Persisted rate-limit state lookup, injected so the Executor never
/// depends on the Ledger directly (mirrors the Router's `HistoricalStats`
/// decoupling).
pub trait RateLimitStore: Send + Sync {
    /// The recorded reset time for `model`, if it was rate-limited and
    /// that window hasn't passed yet.
    fn check(&self, model: &str) -> Option<DateTime<Utc>>;

    /// Record that `model` was rate-limited at `now`, per `info`.
    fn record(&self, model: &str, info: &RateLimitInfo, now: DateTime<Utc>);
}

pub struct FallbackExecutor {
    config: FallbackConfig,
    prompt_adapter: Option<PromptAdapter>,
    rate_limit_store: Option<Arc<dyn RateLimitStore>>,
}

#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    pub model: String,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub response: InvokeResponse,
    pub model_used: String,
    pub used_fallback: bool,
    pub attempts: Vec<AttemptOutcome>,
}

impl FallbackExecutor {
    pub fn new(config: FallbackConfig) -> Self {
        Self {
            config,
            prompt_adapter: None,
            rate_limit_store: None,
        }
    }

    pub fn with_prompt_adapter(mut self, adapter: PromptAdapter) -> Self {
        self.prompt_adapter = Some(adapter);
        self
    }

    pub fn with_rate_limit_store(mut self, store: Arc<dyn RateLimitStore>) -> Self {
        self.rate_limit_store = Some(store);
        self
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let secs = match self.config.backoff {
            BackoffKind::Linear => self.config.initial_delay_secs * (attempt as f64 + 1.0),
            BackoffKind::Exponential => self.config.initial_delay_secs * 2f64.powi(attempt as i32),
        };
        Duration::from_secs_f64(secs)
    }

    /// Execute against `decision.chosen_model`, then each model in
    /// `decision.fallback_chain` in order, until one succeeds, the chain is
    /// exhausted, or `cancel` fires.
    pub async fn execute(
        &self,
        invoker: &dyn ModelInvoker,
        decision: &RoutingDecision,
        mut request: InvokeRequest,
        cancel: &CancellationToken,
    ) -> Result<ExecutionOutcome> {
        if !self.config.enabled {
            let response = self
                .invoke_once(invoker, request, cancel)
                .await
                .map_err(|e| invoke_error_to_error(&decision.chosen_model, e))?;
            return Ok(ExecutionOutcome {
                response,
                model_used: decision.chosen_model.clone(),
                used_fallback: false,
                attempts: vec![],
            });
        }

        let mut models = vec![decision.chosen_model.clone()];
        models.extend(decision.fallback_chain.iter().cloned());

        let mut attempts = Vec::new();
        let mut models_tried = Vec::new();

        for (chain_index, model) in models.iter().enumerate() {
            request.model = model.clone();

            if let Some(store) = &self.rate_limit_store {
                if let Some(reset_at) = store.check(model) {
                    if reset_at > Utc::now() {
                        attempts.push(AttemptOutcome {
                            model: model.clone(),
                            error: "rate limited (persisted)".to_string(),
                        });
                        models_tried.push(model.clone());
                        continue;
                    }
                }
            }

            for retry in 0..self.config.max_attempts {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }

                let req = request.clone();
                let req = match &self.prompt_adapter {
                    Some(adapter) if retry > 0 => InvokeRequest {
                        prompt: adapter(&req.prompt),
                        ..req
                    },
                    _ => req,
                };

                match self.invoke_once(invoker, req, cancel).await {
                    Ok(response) => {
                        return Ok(ExecutionOutcome {
                            response,
                            model_used: model.clone(),
                            used_fallback: chain_index > 0,
                            attempts,
                        });
                    }
                    Err(InvokeError::Cancelled) => return Err(Error::Cancelled),
                    Err(InvokeError::Terminal(message)) => {
                        attempts.push(AttemptOutcome {
                            model: model.clone(),
                            error: message,
                        });
                        models_tried.push(model.clone());
                        break; // terminal errors don't retry the same model
                    }
                    Err(InvokeError::RateLimited(info)) => {
                        attempts.push(AttemptOutcome {
                            model: model.clone(),
                            error: "rate limited".to_string(),
                        });
                        models_tried.push(model.clone());
                        if let Some(store) = &self.rate_limit_store {
                            store.record(model, &info, Utc::now());
                        }
                        if let Some(reset_at) = info.reset_at {
                            let wait = (reset_at - Utc::now())
                                .to_std()
                                .unwrap_or_else(|_| self.delay_for_attempt(retry));
                            tokio::time::sleep(wait).await;
                        } else {
                            tokio::time::sleep(self.delay_for_attempt(retry)).await;
                        }
                        break; // a rate limit applies to the whole model, not just this attempt
                    }
                    Err(InvokeError::Timeout) => {
                        attempts.push(AttemptOutcome {
                            model: model.clone(),
                            error: "timeout".to_string(),
                        });
                        models_tried.push(model.clone());
                        tokio::time::sleep(self.delay_for_attempt(retry)).await;
                    }
                    Err(InvokeError::Transient(message)) => {
                        attempts.push(AttemptOutcome {
                            model: model.clone(),
                            error: message,
                        });
                        models_tried.push(model.clone());
                        tokio::time::sleep(self.delay_for_attempt(retry)).await;
                    }
                }
            }
        }

        Err(Error::FallbackExhausted {
            attempts: attempts.len() as u32,
            models_tried: models_tried.len() as u32,
            errors: attempts.iter().map(|a| a.error.clone()).collect(),
        })
    }

    async fn invoke_once(
        &self,
        invoker: &dyn ModelInvoker,
        request: InvokeRequest,
        cancel: &CancellationToken,
    ) -> std::result::Result<InvokeResponse, InvokeError> {
        let timeout = Duration::from_secs(self.config.timeout_secs);
        tokio::select! {
            _ = cancel.cancelled() => Err(InvokeError::Cancelled),
            result = tokio::time::timeout(timeout, invoker.invoke(request)) => {
                match result {
                    Ok(inner) => inner,
                    Err(_) => Err(InvokeError::Timeout),
                }
            }
        }
    }
}

fn invoke_error_to_error(model: &str, error: InvokeError) -> Error {
    match error {
        InvokeError::RateLimited(_) => Error::rate_limited(model),
        InvokeError::Transient(message) => {
            Error::provider_error(model, message, true, ProviderErrorKind::Heuristic)
        }
        InvokeError::Terminal(message) => {
            Error::provider_error(model, message, false, ProviderErrorKind::Heuristic)
        }
        InvokeError::Timeout => Error::timeout(model, 0),
        InvokeError::Cancelled => Error::Cancelled,
    }
}
