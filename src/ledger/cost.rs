//! Cost Ledger & Budget Predictor: budget windows, pre-flight
//! spend checks, thinking-token budget recommendations, and downgrade
//! suggestions.
//!
//! Budget windows are derived, not stored: the current calendar anchor
//! (local midnight for a daily window, the 1st of the month for a monthly
//! one, both in `config.timezone`) is recomputed from the current time on
//! every read rather than persisting a cron-driven reset, so a missed
//! reset self-heals on the next call.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use chrono_tz::Tz;

use crate::config::BudgetConfig;
use crate::error::Result;
use crate::ledger::store::Ledger;
use crate::types::{BudgetScope, BudgetWindow, Complexity, PrecheckResult};

pub struct BudgetPredictor<'a> {
    ledger: &'a Ledger,
    config: &'a BudgetConfig,
}

#[derive(Debug, Clone)]
pub struct DowngradeSuggestion {
    pub from_model: String,
    pub to_model: String,
    pub projected_monthly_savings: f64,
}

impl<'a> BudgetPredictor<'a> {
    pub fn new(ledger: &'a Ledger, config: &'a BudgetConfig) -> Self {
        Self { ledger, config }
    }

    fn scope_label(scope: BudgetScope) -> &'static str {
        match scope {
            BudgetScope::Daily => "daily",
            BudgetScope::Monthly => "monthly",
        }
    }

    fn timezone(&self) -> Tz {
        self.config.timezone.parse().unwrap_or(chrono_tz::UTC)
    }

    fn limit_for(&self, scope: BudgetScope) -> f64 {
        match scope {
            BudgetScope::Daily => self.config.daily_limit,
            BudgetScope::Monthly => self.config.monthly_limit,
        }
    }

    /// The start of the calendar window `now` falls in: local midnight for
    /// a daily window, local midnight on the 1st of the month for a
    /// monthly one.
    fn window_anchor(scope: BudgetScope, now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
        let local = now.with_timezone(&tz);
        let day = match scope {
            BudgetScope::Daily => local.day(),
            BudgetScope::Monthly => 1,
        };
        tz.with_ymd_and_hms(local.year(), local.month(), day, 0, 0, 0)
            .single()
            .unwrap_or(local)
            .with_timezone(&Utc)
    }

    /// The start of the calendar window immediately after `anchor`.
    fn next_anchor(scope: BudgetScope, anchor: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
        let local = anchor.with_timezone(&tz);
        match scope {
            BudgetScope::Daily => (local + Duration::days(1)).with_timezone(&Utc),
            BudgetScope::Monthly => {
                let (year, month) = if local.month() == 12 {
                    (local.year() + 1, 1)
                } else {
                    (local.year(), local.month() + 1)
                };
                tz.with_ymd_and_hms(year, month, 1, 0, 0, 0)
                    .single()
                    .unwrap_or(local)
                    .with_timezone(&Utc)
            }
        }
    }

    /// Read the current window, resetting it idempotently if the stored
    /// window predates the current calendar anchor. Never fails on a
    /// missing row: a fresh window starts at the anchor with zero
    /// consumption.
    pub fn current_window(&self, scope: BudgetScope, now: DateTime<Utc>) -> Result<BudgetWindow> {
        let label = Self::scope_label(scope);
        let limit = self.limit_for(scope);
        let tz = self.timezone();
        let anchor = Self::window_anchor(scope, now, tz);

        let existing = self.ledger.budget_consumed(label)?;
        let (window_start, consumed) = match existing {
            Some((start, consumed)) if start >= anchor => (start, consumed),
            _ => {
                self.ledger.set_budget_window(label, anchor, 0.0)?;
                (anchor, 0.0)
            }
        };

        Ok(BudgetWindow {
            scope,
            limit,
            consumed,
            reset_at: Self::next_anchor(scope, window_start, tz),
        })
    }

    pub fn record_spend(&self, scope: BudgetScope, amount: f64, now: DateTime<Utc>) -> Result<()> {
        let _ = self.current_window(scope, now)?; // ensures the window exists/reset
        self.ledger.increment_budget_consumed(Self::scope_label(scope), amount)
    }

    /// Precheck: block if spending `estimated_cost` would exceed the
    /// limit, warn past the configured alert thresholds, else ok.
    pub fn precheck(&self, estimated_cost: f64, now: DateTime<Utc>) -> Result<PrecheckResult> {
        let daily = self.current_window(BudgetScope::Daily, now)?;
        let monthly = self.current_window(BudgetScope::Monthly, now)?;

        if daily.consumed + estimated_cost > daily.limit || monthly.consumed + estimated_cost > monthly.limit {
            return Ok(PrecheckResult::Block);
        }

        let daily_ratio = (daily.consumed + estimated_cost) / daily.limit;
        let monthly_ratio = (monthly.consumed + estimated_cost) / monthly.limit;
        if daily_ratio >= self.config.alerts.daily_warning || monthly_ratio >= self.config.alerts.monthly_warning {
            return Ok(PrecheckResult::Warning);
        }

        Ok(PrecheckResult::Ok)
    }

    /// Thinking-token budget: a per-complexity base, scaled by a
    /// historical multiplier derived from how often this complexity tier
    /// actually needed extra thinking tokens in the past.
    pub fn thinking_token_budget(&self, complexity: Complexity, historical_multiplier: f64) -> u32 {
        let base: u32 = match complexity {
            Complexity::Simple => 1_000,
            Complexity::Medium => 3_000,
            Complexity::Complex => 8_000,
            Complexity::Critical => 16_000,
        };
        ((base as f64) * historical_multiplier.max(0.1)) as u32
    }

    /// Rank candidate (expensive, cheap) model substitutions by projected
    /// monthly savings and return the top 5.
    pub fn suggest_downgrades(&self, candidates: Vec<DowngradeSuggestion>) -> Vec<DowngradeSuggestion> {
        let mut sorted = candidates;
        sorted.sort_by(|a, b| {
            b.projected_monthly_savings
                .partial_cmp(&a.projected_monthly_savings)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        sorted.truncate(5);
        sorted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precheck_blocks_when_daily_limit_would_be_exceeded() {
        let ledger = Ledger::in_memory().unwrap();
        let config = BudgetConfig {
            daily_limit: 10.0,
            ..BudgetConfig::default()
        };
        let predictor = BudgetPredictor::new(&ledger, &config);
        let now = Utc::now();
        predictor.record_spend(BudgetScope::Daily, 9.5, now).unwrap();
        let result = predictor.precheck(1.0, now).unwrap();
        assert_eq!(result, PrecheckResult::Block);
    }

    #[test]
    fn precheck_warns_past_threshold_but_under_limit() {
        let ledger = Ledger::in_memory().unwrap();
        let config = BudgetConfig {
            daily_limit: 10.0,
            ..BudgetConfig::default()
        };
        let predictor = BudgetPredictor::new(&ledger, &config);
        let now = Utc::now();
        predictor.record_spend(BudgetScope::Daily, 8.0, now).unwrap();
        let result = predictor.precheck(0.1, now).unwrap();
        assert_eq!(result, PrecheckResult::Warning);
    }

    #[test]
    fn window_resets_after_expiry() {
        let ledger = Ledger::in_memory().unwrap();
        let config = BudgetConfig::default();
        let predictor = BudgetPredictor::new(&ledger, &config);
        let now = Utc::now();
        predictor.record_spend(BudgetScope::Daily, 5.0, now).unwrap();
        let later = now + Duration::days(2);
        let window = predictor.current_window(BudgetScope::Daily, later).unwrap();
        assert_eq!(window.consumed, 0.0);
    }

    #[test]
    fn window_resets_at_local_midnight_even_within_24_hours() {
        let ledger = Ledger::in_memory().unwrap();
        let config = BudgetConfig::default();
        let predictor = BudgetPredictor::new(&ledger, &config);
        let before_midnight = Utc.with_ymd_and_hms(2026, 3, 4, 23, 0, 0).unwrap();
        predictor.record_spend(BudgetScope::Daily, 5.0, before_midnight).unwrap();
        let after_midnight = Utc.with_ymd_and_hms(2026, 3, 5, 1, 0, 0).unwrap();
        let window = predictor.current_window(BudgetScope::Daily, after_midnight).unwrap();
        assert_eq!(window.consumed, 0.0);
    }

    #[test]
    fn monthly_window_anchors_to_the_first_of_the_month() {
        let ledger = Ledger::in_memory().unwrap();
        let config = BudgetConfig::default();
        let predictor = BudgetPredictor::new(&ledger, &config);
        let mid_january = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap();
        predictor.record_spend(BudgetScope::Monthly, 20.0, mid_january).unwrap();
        let early_february = Utc.with_ymd_and_hms(2026, 2, 1, 0, 30, 0).unwrap();
        let window = predictor.current_window(BudgetScope::Monthly, early_february).unwrap();
        assert_eq!(window.consumed, 0.0);
        assert_eq!(window.reset_at, Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn thinking_token_budget_scales_with_complexity() {
        let ledger = Ledger::in_memory().unwrap();
        let config = BudgetConfig::default();
        let predictor = BudgetPredictor::new(&ledger, &config);
        assert_eq!(predictor.thinking_token_budget(Complexity::Simple, 1.0), 1_000);
        assert_eq!(predictor.thinking_token_budget(Complexity::Critical, 1.0), 16_000);
    }

    #[test]
    fn downgrade_suggestions_are_capped_at_five_sorted_by_savings() {
        let ledger = Ledger::in_memory().unwrap();
        let config = BudgetConfig::default();
        let predictor = BudgetPredictor::new(&ledger, &config);
        let candidates = (0..8)
            .map(|i| DowngradeSuggestion {
                from_model: "expensive".into(),
                to_model: "cheap".into(),
                projected_monthly_savings: i as f64,
            })
            .collect();
        let top = predictor.suggest_downgrades(candidates);
        assert_eq!(top.len(), 5);
        assert_eq!(top[0].projected_monthly_savings, 7.0);
    }
}
