//! # harbor-db
//!
//! SQLite persistence for the Harbor daemon: one database file,
//! `$HARBOR_DATA_DIR/harbor.db`.
//!
//! ## Schema
//!
//! - WAL journal, foreign keys on
//! - Timestamps are Unix seconds in INTEGER columns
//! - `u128` amounts and addresses are TEXT, so no precision is lost
//! - Schema version lives in `PRAGMA user_version` (see [`migrations`])
//!
//! ## Modules
//!
//! - [`migrations`] — Forward-only schema upgrades
//! - [`queries`] — Vault ledger, event log and settings access
//! - [`schema`] — DDL

pub mod migrations;
pub mod queries;
pub mod schema;

use std::path::Path;

use rusqlite::Connection;

/// Schema version this build writes.
pub const SCHEMA_VERSION: u32 = 1;

/// Database error types.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    /// A lookup by key found no row.
    #[error("not found: {0}")]
    NotFound(String),

    /// A value does not fit its column.
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// A stored value could not be decoded, or a value could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Open (creating if needed) the database at `path` and migrate it.
///
/// # Errors
///
/// Any [`DbError`] from opening, configuring or migrating.
pub fn open(path: &Path) -> Result<Connection> {
    prepare(Connection::open(path)?)
}

/// Open a migrated in-memory database.
///
/// # Errors
///
/// Any [`DbError`] from configuring or migrating.
pub fn open_memory() -> Result<Connection> {
    prepare(Connection::open_in_memory()?)
}

fn prepare(conn: Connection) -> Result<Connection> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )?;
    migrations::run(&conn)?;
    Ok(conn)
}

/// Parse a TEXT column holding a decimal `u128`.
pub(crate) fn parse_amount(column: &str, text: &str) -> Result<u128> {
    text.parse()
        .map_err(|e| DbError::Serialization(format!("{column}: {e}")))
}

/// Parse a TEXT column holding an address.
pub(crate) fn parse_address(column: &str, text: &str) -> Result<harbor_types::Address> {
    text.parse()
        .map_err(|e| DbError::Serialization(format!("{column}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_version(conn: &Connection) -> u32 {
        conn.pragma_query_value(None, "user_version", |row| row.get(0))
            .expect("user_version")
    }

    #[test]
    fn test_open_memory_is_migrated() {
        let conn = open_memory().expect("open in-memory db");
        assert_eq!(user_version(&conn), SCHEMA_VERSION);

        // Migrating an up-to-date database changes nothing.
        migrations::run(&conn).expect("second run");
        assert_eq!(user_version(&conn), SCHEMA_VERSION);
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let conn = open_memory().expect("open");
        let enabled: i64 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .expect("foreign_keys");
        assert_eq!(enabled, 1);
    }

    #[test]
    fn test_parse_helpers() {
        assert_eq!(
            parse_amount("x", "340282366920938463463374607431768211455").expect("max"),
            u128::MAX
        );
        assert!(matches!(parse_amount("x", "-1"), Err(DbError::Serialization(_))));
        assert!(parse_address("a", "0xzz").is_err());
    }
}
