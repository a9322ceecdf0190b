//! Runtime configuration: the configuration surface.
//!
//! Matches the catalog's preference for plain `serde`-capable structs with
//! builder methods and `Default` impls over a dedicated configuration
//! crate; loaded from JSON and validated explicitly rather than relying on
//! a layered config-merge library.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Backoff strategy for the Fallback Executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    Linear,
    Exponential,
}

/// Weights for the Model Router's five sub-scores. Must sum to 1.0 within
/// ±0.001.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouterWeights {
    pub capability: f64,
    pub cost: f64,
    pub latency: f64,
    pub quality: f64,
    pub historical: f64,
}

impl Default for RouterWeights {
    fn default() -> Self {
        Self {
            capability: 0.35,
            cost: 0.20,
            latency: 0.15,
            quality: 0.20,
            historical: 0.10,
        }
    }
}

impl RouterWeights {
    pub fn sum(&self) -> f64 {
        self.capability + self.cost + self.latency + self.quality + self.historical
    }

    pub fn set(&mut self, key: &str, value: f64) -> Result<()> {
        match key {
            "capability" => self.capability = value,
            "cost" => self.cost = value,
            "latency" => self.latency = value,
            "quality" => self.quality = value,
            "historical" => self.historical = value,
            other => return Err(Error::Config(format!("unknown weight key: {other}"))),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    pub enabled: bool,
    pub max_attempts: u32,
    pub timeout_secs: u64,
    pub initial_delay_secs: f64,
    pub backoff: BackoffKind,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            timeout_secs: 60,
            initial_delay_secs: 1.0,
            backoff: BackoffKind::Exponential,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetAlerts {
    pub daily_warning: f64,
    pub monthly_warning: f64,
}

impl Default for BudgetAlerts {
    fn default() -> Self {
        Self {
            daily_warning: 0.75,
            monthly_warning: 0.80,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    pub daily_limit: f64,
    pub monthly_limit: f64,
    pub per_request_limit: f64,
    pub alerts: BudgetAlerts,
    pub timezone: String,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            daily_limit: 50.0,
            monthly_limit: 1000.0,
            per_request_limit: 2.0,
            alerts: BudgetAlerts::default(),
            timezone: "UTC".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionThreshold {
    pub min_success_rate_drop: f64,
    pub min_task_count: u32,
}

impl Default for EvolutionThreshold {
    fn default() -> Self {
        Self {
            min_success_rate_drop: 0.10,
            min_task_count: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    pub auto_enabled: bool,
    pub min_trials_before_promotion: u32,
    pub exploration_parameter: f64,
    pub evolution_threshold: EvolutionThreshold,
    pub implicit_feedback_weight: f64,
    pub feedback_decay_half_life_days: f64,
    pub report_frequency_days: u32,
    pub report_retention_count: usize,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            auto_enabled: true,
            min_trials_before_promotion: 20,
            exploration_parameter: 2.0,
            evolution_threshold: EvolutionThreshold::default(),
            implicit_feedback_weight: 0.3,
            feedback_decay_half_life_days: 7.0,
            report_frequency_days: 7,
            report_retention_count: 12,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub retention_days: i64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self { retention_days: 90 }
    }
}

/// The full runtime configuration tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub default_model: String,
    pub weights: RouterWeights,
    pub cache: CacheConfig,
    pub enable_learning: bool,
    pub fallback: FallbackConfig,
    pub budget: BudgetConfig,
    pub evolution: EvolutionConfig,
    pub tracker: TrackerConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_model: "claude-3-5-haiku-20241022".to_string(),
            weights: RouterWeights::default(),
            cache: CacheConfig::default(),
            enable_learning: true,
            fallback: FallbackConfig::default(),
            budget: BudgetConfig::default(),
            evolution: EvolutionConfig::default(),
            tracker: TrackerConfig::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate the weight sum and enum constraints, matching the catalog's
    /// load-time rejection rule.
    pub fn validate(&self) -> Result<()> {
        let sum = self.weights.sum();
        if (sum - 1.0).abs() > 0.001 {
            return Err(Error::Config(format!(
                "router weights must sum to 1.0 within +/-0.001, got {sum:.4}"
            )));
        }
        if self.budget.alerts.daily_warning < 0.0 || self.budget.alerts.daily_warning > 1.0 {
            return Err(Error::Config(
                "budget.alerts.dailyWarning must be in [0, 1]".to_string(),
            ));
        }
        if self.budget.alerts.monthly_warning < 0.0 || self.budget.alerts.monthly_warning > 1.0 {
            return Err(Error::Config(
                "budget.alerts.monthlyWarning must be in [0, 1]".to_string(),
            ));
        }
        if self.fallback.max_attempts == 0 {
            return Err(Error::Config(
                "fallback.maxAttempts must be at least 1".to_string(),
            ));
        }
        if self.budget.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(Error::Config(format!(
                "budget.timezone '{}' is not a recognized IANA timezone",
                self.budget.timezone
            )));
        }
        Ok(())
    }

    pub fn set_weight(&mut self, key: &str, value: f64) -> Result<()> {
        self.weights.set(key, value)?;
        self.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(RuntimeConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_weights_not_summing_to_one() {
        let mut config = RuntimeConfig::default();
        config.weights.capability = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn set_weight_rejects_unknown_key() {
        let mut config = RuntimeConfig::default();
        assert!(config.set_weight("bogus", 0.5).is_err());
    }

    #[test]
    fn round_trips_through_json() {
        let config = RuntimeConfig::default();
        let json = config.to_json().unwrap();
        let parsed = RuntimeConfig::from_json(&json).unwrap();
        assert_eq!(parsed.default_model, config.default_model);
        assert!((parsed.weights.sum() - 1.0).abs() < 0.001);
    }
}
