//! SQLite schema for the persistence layer: routing decisions, cost
//! tracking, prompt variants, capability gaps, and feedback.
//!
//! Adapted from the catalog's `memory/schema.rs` (`SCHEMA_VERSION`,
//! `initialize_schema`, idempotent `apply_vN_schema`) but over the
//! Ledger's tables instead of the memory graph's nodes/hyperedges.

use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: i64 = 1;

/// Open a fresh connection's schema up to `SCHEMA_VERSION`, applying
/// pragmas first so every subsequent statement in this connection runs
/// under WAL with foreign keys enforced.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;",
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        )",
        [],
    )?;

    let current = get_schema_version(conn)?;
    if current == 0 {
        apply_v1_schema(conn)?;
        conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [SCHEMA_VERSION])?;
    }

    Ok(())
}

pub fn get_schema_version(conn: &Connection) -> Result<i64> {
    let version: Option<i64> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .ok();
    Ok(version.unwrap_or(0))
}

pub fn is_initialized(conn: &Connection) -> Result<bool> {
    Ok(get_schema_version(conn)? > 0)
}

fn apply_v1_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE routing_decisions (
            cache_key TEXT NOT NULL,
            chosen_model TEXT NOT NULL,
            confidence REAL NOT NULL,
            reasoning TEXT NOT NULL,
            estimated_cost REAL NOT NULL,
            estimated_latency_ms INTEGER NOT NULL,
            fallback_chain TEXT NOT NULL,
            timestamp TEXT NOT NULL
        );
        CREATE INDEX idx_routing_decisions_timestamp ON routing_decisions(timestamp);

        CREATE TABLE routing_outcomes (
            task_id TEXT PRIMARY KEY,
            model TEXT NOT NULL,
            variant_id TEXT NOT NULL,
            agent_id TEXT NOT NULL,
            task_type TEXT NOT NULL,
            complexity TEXT NOT NULL,
            success INTEGER NOT NULL,
            quality REAL NOT NULL,
            actual_cost REAL NOT NULL,
            actual_latency_ms INTEGER NOT NULL,
            tokens_in INTEGER NOT NULL,
            tokens_out INTEGER NOT NULL,
            thinking_tokens INTEGER NOT NULL,
            used_fallback INTEGER NOT NULL,
            error TEXT,
            user_rating INTEGER,
            timestamp TEXT NOT NULL
        );
        CREATE INDEX idx_routing_outcomes_agent_ts ON routing_outcomes(agent_id, timestamp DESC);

        CREATE TABLE model_performance (
            model TEXT NOT NULL,
            task_type TEXT NOT NULL,
            complexity TEXT NOT NULL,
            trial_count INTEGER NOT NULL DEFAULT 0,
            success_count INTEGER NOT NULL DEFAULT 0,
            weighted_rating REAL NOT NULL DEFAULT 0,
            last_updated TEXT NOT NULL,
            PRIMARY KEY (model, task_type, complexity)
        );

        CREATE TABLE cost_tracking (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            model TEXT NOT NULL,
            agent_id TEXT,
            cost REAL NOT NULL,
            tokens_in INTEGER NOT NULL,
            tokens_out INTEGER NOT NULL,
            timestamp TEXT NOT NULL
        );
        CREATE INDEX idx_cost_tracking_timestamp ON cost_tracking(timestamp);

        CREATE TABLE budget_tracking (
            scope TEXT PRIMARY KEY,
            window_start TEXT NOT NULL,
            consumed REAL NOT NULL DEFAULT 0
        );

        CREATE TABLE fallback_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            task_id TEXT NOT NULL,
            model TEXT NOT NULL,
            attempt INTEGER NOT NULL,
            error TEXT NOT NULL,
            timestamp TEXT NOT NULL
        );

        CREATE TABLE rate_limit_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            model TEXT NOT NULL,
            reset_at TEXT,
            remaining INTEGER,
            limit_value INTEGER,
            timestamp TEXT NOT NULL
        );

        CREATE TABLE prompt_variants (
            id TEXT PRIMARY KEY,
            agent_id TEXT NOT NULL,
            version INTEGER NOT NULL,
            prompt_body TEXT NOT NULL,
            system_prompt TEXT,
            created_at TEXT NOT NULL,
            trial_count INTEGER NOT NULL DEFAULT 0,
            success_count INTEGER NOT NULL DEFAULT 0,
            avg_duration_ms REAL NOT NULL DEFAULT 0,
            avg_tokens REAL NOT NULL DEFAULT 0,
            parent_variant_id TEXT,
            mutation_type TEXT NOT NULL,
            mutation_reason TEXT,
            status TEXT NOT NULL
        );
        CREATE INDEX idx_prompt_variants_agent_status ON prompt_variants(agent_id, status);

        CREATE TABLE prompt_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            variant_id TEXT NOT NULL,
            agent_id TEXT NOT NULL,
            event TEXT NOT NULL,
            detail TEXT,
            timestamp TEXT NOT NULL
        );

        CREATE TABLE capability_gaps (
            id TEXT PRIMARY KEY,
            category TEXT NOT NULL,
            description TEXT NOT NULL,
            failure_count INTEGER NOT NULL DEFAULT 0,
            affected_task_ids TEXT NOT NULL,
            error_patterns TEXT NOT NULL,
            severity TEXT NOT NULL,
            frequency_per_day REAL NOT NULL,
            status TEXT NOT NULL
        );
        CREATE INDEX idx_capability_gaps_status_severity ON capability_gaps(status, severity DESC);

        CREATE TABLE skill_suggestions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            gap_id TEXT NOT NULL,
            suggestion TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE implicit_feedback (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            task_id TEXT NOT NULL,
            agent_id TEXT NOT NULL,
            rating INTEGER NOT NULL,
            kind TEXT NOT NULL,
            sub_kind TEXT,
            timestamp TEXT NOT NULL
        );

        CREATE TABLE evolution_reports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            agent_id TEXT NOT NULL,
            period_start TEXT NOT NULL,
            period_end TEXT NOT NULL,
            body TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE evolution_state (
            agent_id TEXT PRIMARY KEY,
            last_checked_at TEXT NOT NULL,
            last_report_at TEXT
        );
        ",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initializing_twice_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        initialize_schema(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn fresh_connection_is_not_initialized() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(!is_initialized(&conn).unwrap());
    }

    #[test]
    fn all_tables_exist_after_initialization() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'routing_outcomes'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }
}
