//! SQL schema definitions.

/// Complete schema for the Harbor v1 database.
pub const SCHEMA_V1: &str = r#"
-- ============================================================
-- Vault ledger
-- ============================================================

CREATE TABLE IF NOT EXISTS vault_state (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    vault_address TEXT NOT NULL,
    owner TEXT NOT NULL,
    reward_token TEXT NOT NULL,
    lending_market TEXT NOT NULL,
    rate_numerator INTEGER NOT NULL,
    rate_denominator INTEGER NOT NULL CHECK (rate_denominator > 0),
    price_oracle TEXT,
    total_staked TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS accounts (
    address TEXT PRIMARY KEY,
    staked_balance TEXT NOT NULL,
    last_accrual_timestamp INTEGER NOT NULL,
    settled_reward_amount TEXT NOT NULL
);

-- ============================================================
-- Event log
-- ============================================================

CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    payload TEXT NOT NULL,
    timestamp INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_name ON events(name);

-- ============================================================
-- Settings (JSON blobs keyed by name)
-- ============================================================

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;
