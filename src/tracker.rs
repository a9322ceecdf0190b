//! Performance Tracker: time-decayed weighted ratings blended from
//! explicit and implicit feedback, trend detection, and retention.
//!
//! The decay/blend arithmetic is new (the catalog has no direct analog),
//! but the "weighted accumulation over a bounded history, with an
//! explicit sweep to prune stale rows" shape follows `memory/store.rs`'s
//! `decay`/`consolidate` pair.

use chrono::{DateTime, Duration, Utc};

use crate::types::{FeedbackKind, FeedbackSignal, OutcomeRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

pub struct PerformanceTracker {
    half_life_days: f64,
    implicit_feedback_weight: f64,
    retention_days: i64,
}

impl PerformanceTracker {
    pub fn new(half_life_days: f64, implicit_feedback_weight: f64, retention_days: i64) -> Self {
        Self {
            half_life_days,
            implicit_feedback_weight,
            retention_days,
        }
    }

    fn decay_weight(&self, age: Duration, now: DateTime<Utc>) -> f64 {
        let _ = now;
        let age_days = age.num_milliseconds() as f64 / 86_400_000.0;
        0.5f64.powf(age_days / self.half_life_days)
    }

    /// Weighted rating: each outcome's quality is weighted by
    /// exponential recency decay, then explicit and implicit feedback are
    /// blended at `implicit_feedback_weight`.
    pub fn weighted_rating(&self, outcomes: &[OutcomeRecord], feedback: &[FeedbackSignal], now: DateTime<Utc>) -> f64 {
        let outcome_rating = self.decayed_average(outcomes, now);

        let explicit: Vec<&FeedbackSignal> = feedback.iter().filter(|f| f.kind == FeedbackKind::Explicit).collect();
        let implicit: Vec<&FeedbackSignal> = feedback.iter().filter(|f| f.kind == FeedbackKind::Implicit).collect();

        let explicit_avg = average_rating(&explicit, now, self.half_life_days);
        let implicit_avg = average_rating(&implicit, now, self.half_life_days);

        match (explicit_avg, implicit_avg) {
            (Some(e), Some(i)) => {
                let feedback_blend = (1.0 - self.implicit_feedback_weight) * e + self.implicit_feedback_weight * i;
                0.5 * outcome_rating + 0.5 * (feedback_blend / 5.0)
            }
            (Some(e), None) => 0.5 * outcome_rating + 0.5 * (e / 5.0),
            (None, Some(i)) => 0.5 * outcome_rating + 0.5 * (i / 5.0),
            (None, None) => outcome_rating,
        }
    }

    fn decayed_average(&self, outcomes: &[OutcomeRecord], now: DateTime<Utc>) -> f64 {
        if outcomes.is_empty() {
            return 0.0;
        }
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;
        for outcome in outcomes {
            let age = now - outcome.timestamp;
            let weight = self.decay_weight(age, now);
            weighted_sum += weight * outcome.quality;
            weight_total += weight;
        }
        if weight_total == 0.0 {
            0.0
        } else {
            weighted_sum / weight_total
        }
    }

    /// Trend detection: compares the weighted rating of the most
    /// recent half of a window against the earlier half.
    pub fn trend(&self, outcomes: &[OutcomeRecord], now: DateTime<Utc>) -> Trend {
        if outcomes.len() < 4 {
            return Trend::Stable;
        }
        let mut sorted: Vec<&OutcomeRecord> = outcomes.iter().collect();
        sorted.sort_by_key(|o| o.timestamp);
        let mid = sorted.len() / 2;
        let earlier: Vec<OutcomeRecord> = sorted[..mid].iter().map(|o| (*o).clone()).collect();
        let later: Vec<OutcomeRecord> = sorted[mid..].iter().map(|o| (*o).clone()).collect();

        let earlier_rating = self.decayed_average(&earlier, now);
        let later_rating = self.decayed_average(&later, now);

        if earlier_rating == 0.0 {
            return Trend::Stable;
        }

        let delta = (later_rating - earlier_rating) / earlier_rating;
        if delta >= 0.05 {
            Trend::Improving
        } else if delta <= -0.05 {
            Trend::Declining
        } else {
            Trend::Stable
        }
    }

    /// Retention sweep: outcomes older than `retention_days` are
    /// eligible for deletion. Returns the cutoff timestamp; callers issue
    /// the actual `DELETE` through the Ledger.
    pub fn retention_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(self.retention_days)
    }
}

fn average_rating(signals: &[&FeedbackSignal], now: DateTime<Utc>, half_life_days: f64) -> Option<f64> {
    if signals.is_empty() {
        return None;
    }
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    for signal in signals {
        let age_days = (now - signal.timestamp).num_milliseconds() as f64 / 86_400_000.0;
        let weight = 0.5f64.powf(age_days / half_life_days);
        weighted_sum += weight * signal.rating as f64;
        weight_total += weight;
    }
    if weight_total == 0.0 {
        None
    } else {
        Some(weighted_sum / weight_total)
    }
}
