//! Model Router: scores candidate models under cost, latency,
//! quality, and capability constraints and emits a `RoutingDecision` with
//! an attached fallback chain.
//!
//! Generalizes the catalog's `SmartRouter` (which dispatches on a
//! five-variant `QueryType` and recursion depth) into a weighted
//! five-sub-score model over the full `TaskDescriptor`, with the same
//! "compute a decision, cache it, invalidate eagerly or lazily" shape.

mod cache;

pub use cache::{cache_key, CacheStats, DecisionCache};

use chrono::Utc;

use crate::config::RouterWeights;
use crate::types::{
    Complexity, ModelCatalog, ModelProfile, RoutingDecision, ScoredAlternative, TaskDescriptor,
};

/// Historical (model, task type, complexity) performance lookup, injected
/// so the Router never depends on the Ledger directly.
pub trait HistoricalStats: Send + Sync {
    /// Returns `(success_rate, avg_quality)` over outcomes matching
    /// `(model, task_type, complexity)`, or `None` if there is no history.
    fn lookup(&self, model: &str, descriptor: &TaskDescriptor) -> Option<(f64, f64)>;
}

/// A `HistoricalStats` that always reports no history (the "learning
/// disabled" case collapses to this automatically via `enable_learning`).
pub struct NoHistory;

impl HistoricalStats for NoHistory {
    fn lookup(&self, _model: &str, _descriptor: &TaskDescriptor) -> Option<(f64, f64)> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub weights: RouterWeights,
    pub default_model: String,
    pub enable_cache: bool,
    pub cache_ttl_secs: u64,
    pub enable_learning: bool,
}

struct SubScores {
    capability: f64,
    cost: f64,
    latency: f64,
    quality: f64,
    historical: f64,
    hard_fail: bool,
}

pub struct ModelRouter {
    config: RouterConfig,
    cache: DecisionCache,
}

impl ModelRouter {
    pub fn new(config: RouterConfig) -> Self {
        let cache = DecisionCache::new(config.cache_ttl_secs);
        Self { config, cache }
    }

    pub fn weights(&self) -> RouterWeights {
        self.config.weights
    }

    pub fn set_weights(&mut self, weights: RouterWeights) {
        self.config.weights = weights;
        self.cache.clear();
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn reset_cache_stats(&self) {
        self.cache.reset_stats();
    }

    /// Route a task against the given catalog, consulting `historical` for
    /// the historical sub-score when learning is enabled.
    pub fn route(
        &self,
        descriptor: &TaskDescriptor,
        catalog: &ModelCatalog,
        historical: &dyn HistoricalStats,
    ) -> RoutingDecision {
        let key = cache_key(descriptor);
        let now = Utc::now();

        if self.config.enable_cache {
            if let Some(cached) = self.cache.get(&key, now) {
                return cached;
            }
        }

        let mut scored: Vec<(String, f64, SubScores)> = catalog
            .iter()
            .map(|(name, profile)| {
                let scores = self.score_model(profile, descriptor, historical);
                let weighted = self.weighted_total(&scores);
                (name.clone(), weighted, scores)
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let decision = if scored.is_empty() || scored[0].2.hard_fail || scored[0].1 <= 0.0 {
            RoutingDecision {
                chosen_model: self.config.default_model.clone(),
                confidence: 0.0,
                reasoning: vec!["no model satisfied constraints".to_string()],
                alternatives: vec![],
                estimated_cost: catalog
                    .get(&self.config.default_model)
                    .map(|p| p.estimated_cost(descriptor.input_tokens_estimate, descriptor.output_tokens_estimate))
                    .unwrap_or(0.0),
                estimated_latency_ms: catalog
                    .get(&self.config.default_model)
                    .map(|p| p.p50_latency_ms)
                    .unwrap_or(0),
                fallback_chain: vec![],
                timestamp: now,
                cache_key: key.clone(),
            }
        } else {
            let (chosen_name, chosen_weighted, chosen_scores) = &scored[0];
            let chosen_profile = &catalog[chosen_name];
            let reasoning = self.reasoning_for(chosen_scores, descriptor);
            let alternatives: Vec<ScoredAlternative> = scored
                .iter()
                .skip(1)
                .take(3)
                .map(|(name, weighted, _)| ScoredAlternative {
                    model: name.clone(),
                    score: *weighted,
                    reason: format!("ranked alternative with weighted score {weighted:.1}"),
                })
                .collect();

            let fallback_chain: Vec<String> = scored
                .iter()
                .skip(1)
                .filter(|(_, weighted, _)| *weighted > 30.0)
                .take(3)
                .map(|(name, _, _)| name.clone())
                .collect();

            RoutingDecision {
                chosen_model: chosen_name.clone(),
                confidence: chosen_weighted.clamp(0.0, 100.0),
                reasoning,
                alternatives,
                estimated_cost: chosen_profile
                    .estimated_cost(descriptor.input_tokens_estimate, descriptor.output_tokens_estimate),
                estimated_latency_ms: chosen_profile.p50_latency_ms,
                fallback_chain,
                timestamp: now,
                cache_key: key.clone(),
            }
        };

        if self.config.enable_cache {
            self.cache.put(key, decision.clone(), now);
        }

        decision
    }

    fn score_model(
        &self,
        profile: &ModelProfile,
        descriptor: &TaskDescriptor,
        historical: &dyn HistoricalStats,
    ) -> SubScores {
        let mut hard_fail = false;

        // Capability match.
        let mut capability: f64 = 0.0;
        if profile.strength_tags.contains(&descriptor.task_type) {
            capability += 40.0;
        }
        if descriptor.requires_thinking {
            if profile.has_capability(crate::types::Capability::ExtendedThinking) {
                capability += 20.0;
            } else {
                capability -= 30.0;
            }
        }
        if descriptor.involves_code && profile.has_capability(crate::types::Capability::ToolUse) {
            capability += 15.0;
        }
        let total_estimate = descriptor.input_tokens_estimate + descriptor.output_tokens_estimate;
        if total_estimate > profile.context_window {
            capability -= 50.0;
        } else if (total_estimate as f64) > 0.9 * profile.context_window as f64 {
            capability -= 20.0;
        }
        if descriptor.output_tokens_estimate > profile.max_output {
            capability -= 50.0;
        }
        if complexity_preference_matches(descriptor.complexity, profile) {
            capability += 20.0;
        }
        let capability = (capability + 50.0).clamp(0.0, 100.0);

        // Cost efficiency.
        let estimated_cost = profile.estimated_cost(descriptor.input_tokens_estimate, descriptor.output_tokens_estimate);
        let cost = if let Some(constraints) = &descriptor.constraints {
            if let Some(max_cost) = constraints.max_cost {
                if estimated_cost > max_cost {
                    hard_fail = true;
                    0.0
                } else {
                    (100.0 * (1.0 - estimated_cost / 0.015)).clamp(0.0, 100.0)
                }
            } else {
                (100.0 * (1.0 - estimated_cost / 0.015)).clamp(0.0, 100.0)
            }
        } else {
            (100.0 * (1.0 - estimated_cost / 0.015)).clamp(0.0, 100.0)
        };

        // Latency.
        let latency = if let Some(constraints) = &descriptor.constraints {
            if let Some(max_latency) = constraints.max_latency_ms {
                if profile.p50_latency_ms > max_latency {
                    hard_fail = true;
                    0.0
                } else {
                    (100.0 * (1.0 - profile.p50_latency_ms as f64 / 10_000.0)).clamp(0.0, 100.0)
                }
            } else {
                (100.0 * (1.0 - profile.p50_latency_ms as f64 / 10_000.0)).clamp(0.0, 100.0)
            }
        } else {
            (100.0 * (1.0 - profile.p50_latency_ms as f64 / 10_000.0)).clamp(0.0, 100.0)
        };

        // Quality.
        let quality = if let Some(constraints) = &descriptor.constraints {
            if let Some(min_quality) = constraints.min_quality {
                if profile.quality_score < min_quality {
                    hard_fail = true;
                    0.0
                } else {
                    quality_with_critical_bonus(profile, descriptor)
                }
            } else {
                quality_with_critical_bonus(profile, descriptor)
            }
        } else {
            quality_with_critical_bonus(profile, descriptor)
        };

        // Historical.
        let historical_score = if !self.config.enable_learning {
            50.0
        } else {
            match historical.lookup(&profile.name, descriptor) {
                Some((success_rate, avg_quality)) => 60.0 * success_rate + 0.4 * avg_quality,
                None => 50.0,
            }
        };

        SubScores {
            capability,
            cost,
            latency,
            quality,
            historical: historical_score,
            hard_fail,
        }
    }

    fn weighted_total(&self, scores: &SubScores) -> f64 {
        if scores.hard_fail {
            return 0.0;
        }
        let w = &self.config.weights;
        w.capability * scores.capability
            + w.cost * scores.cost
            + w.latency * scores.latency
            + w.quality * scores.quality
            + w.historical * scores.historical
    }

    fn reasoning_for(&self, scores: &SubScores, descriptor: &TaskDescriptor) -> Vec<String> {
        let mut reasoning = Vec::new();
        if scores.capability > 70.0 {
            reasoning.push(format!("strong capability match for {}", descriptor.task_type));
        }
        if scores.cost > 70.0 {
            reasoning.push("cost-efficient choice".to_string());
        } else if scores.cost < 30.0 {
            reasoning.push("higher-cost choice justified by other scores".to_string());
        }
        if scores.quality > 90.0 {
            reasoning.push("high quality score".to_string());
        }
        if scores.latency > 80.0 {
            reasoning.push("low expected latency".to_string());
        }
        if scores.historical > 70.0 {
            reasoning.push("strong historical track record".to_string());
        }
        if matches!(descriptor.complexity, Complexity::Complex | Complexity::Critical) {
            reasoning.push("task is critical or complex".to_string());
        }
        if reasoning.is_empty() {
            reasoning.push("selected as highest weighted-score candidate".to_string());
        }
        reasoning
    }
}

fn quality_with_critical_bonus(profile: &ModelProfile, descriptor: &TaskDescriptor) -> f64 {
    let mut quality = profile.quality_score;
    if descriptor.complexity == Complexity::Critical && profile.quality_score > 90.0 {
        quality += 10.0;
    }
    quality
}

fn complexity_preference_matches(complexity: Complexity, profile: &ModelProfile) -> bool {
    // A model is "on the complexity preference table" when its strength
    // tags already include extended-thinking-worthy categories for
    // complex/critical tasks, or it is a fast/cheap model for simple ones.
    match complexity {
        Complexity::Critical | Complexity::Complex => {
            profile.has_capability(crate::types::Capability::ExtendedThinking)
        }
        Complexity::Simple => profile.input_cost_per_1k < 0.002,
        Complexity::Medium => false,
    }
}
