//! Key/value settings.
//!
//! Values are JSON documents keyed by name; the daemon keeps the reward
//! token state here.

use rusqlite::{Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};

use crate::{DbError, Result};

/// Key under which the reward token state is stored.
pub const REWARD_TOKEN_KEY: &str = "reward_token";

/// Raw value stored under `key`.
///
/// # Errors
///
/// - [`DbError::NotFound`] if the key was never set
pub fn get(conn: &Connection, key: &str) -> Result<String> {
    lookup(conn, key)?.ok_or_else(|| DbError::NotFound(format!("setting '{key}'")))
}

fn lookup(conn: &Connection, key: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
            row.get(0)
        })
        .optional()?)
}

/// Store `value` under `key`, replacing any previous value.
pub fn set(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        [key, value],
    )?;
    Ok(())
}

/// Store `value` as JSON under `key`.
pub fn set_json<T: Serialize>(conn: &Connection, key: &str, value: &T) -> Result<()> {
    let json = serde_json::to_string(value).map_err(|e| DbError::Serialization(e.to_string()))?;
    set(conn, key, &json)
}

/// Load the JSON value under `key`, or `None` if unset.
pub fn get_json<T: DeserializeOwned>(conn: &Connection, key: &str) -> Result<Option<T>> {
    lookup(conn, key)?
        .map(|json| serde_json::from_str(&json).map_err(|e| DbError::Serialization(e.to_string())))
        .transpose()
}
