//! An agent-orchestration runtime: classifies tasks, routes them to a
//! model, executes with fallback, and learns from outcomes.
//!
//! The four stages run in sequence per request (Task Classifier ->
//! Model Router -> Fallback Executor -> Performance Tracker), with the
//! Prompt Optimizer, Cost Ledger, and Capability Expander feeding back
//! into routing and prompt selection over time.

pub mod classifier;
pub mod config;
pub mod error;
pub mod executor;
pub mod expander;
pub mod feedback;
pub mod ledger;
pub mod optimizer;
pub mod router;
pub mod tracker;
pub mod types;

pub use config::RuntimeConfig;
pub use error::{Error, Result};
pub use types::{RoutingDecision, TaskDescriptor};

pub mod control;
pub use control::{ControlResult, Runtime};
