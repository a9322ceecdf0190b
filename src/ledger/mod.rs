//! Persistence layer: SQLite-backed outcome, variant, and budget storage.

pub mod cost;
pub mod historical;
pub mod rate_limit;
pub mod schema;
pub mod store;

pub use cost::{BudgetPredictor, DowngradeSuggestion};
pub use historical::LedgerHistoricalStats;
pub use rate_limit::LedgerRateLimitStore;
pub use store::{EvolutionReportRow, FallbackEvent, Ledger, ModelPerformanceRow};
