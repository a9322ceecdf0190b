//! Ledger-backed implementation of the Fallback Executor's
//! `RateLimitStore` trait, kept under `ledger/` for the same reason as
//! `historical.rs`: the Executor stays decoupled from SQLite and only
//! ever sees the trait object.

use chrono::{DateTime, Utc};

use crate::executor::{RateLimitInfo, RateLimitStore};
use crate::ledger::store::Ledger;

/// `Ledger` is cheap to clone (its connection is an `Arc<Mutex<_>>`), so
/// this type owns one rather than borrowing, making it trivially
/// `'static` and suitable for `Arc<dyn RateLimitStore>`.
pub struct LedgerRateLimitStore {
    ledger: Ledger,
}

impl LedgerRateLimitStore {
    pub fn new(ledger: Ledger) -> Self {
        Self { ledger }
    }
}

impl RateLimitStore for LedgerRateLimitStore {
    fn check(&self, model: &str) -> Option<DateTime<Utc>> {
        self.ledger.latest_rate_limit(model).ok().flatten()
    }

    fn record(&self, model: &str, info: &RateLimitInfo, now: DateTime<Utc>) {
        let _ = self
            .ledger
            .record_rate_limit_event(model, info.reset_at, info.remaining, info.limit, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn check_returns_none_with_no_recorded_events() {
        let ledger = Ledger::in_memory().unwrap();
        let store = LedgerRateLimitStore::new(ledger);
        assert!(store.check("claude-opus").is_none());
    }

    #[test]
    fn record_then_check_round_trips_the_reset_time() {
        let ledger = Ledger::in_memory().unwrap();
        let store = LedgerRateLimitStore::new(ledger);
        let now = Utc::now();
        let reset_at = now + Duration::minutes(2);
        store.record(
            "claude-opus",
            &RateLimitInfo {
                reset_at: Some(reset_at),
                remaining: Some(0),
                limit: Some(10),
            },
            now,
        );
        let checked = store.check("claude-opus").unwrap();
        assert!((checked - reset_at).num_seconds().abs() < 2);
    }
}
