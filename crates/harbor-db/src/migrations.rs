//! Forward-only schema migrations.
//!
//! `PRAGMA user_version` holds the applied version. Migration `n` is
//! `MIGRATIONS[n - 1]`; each one runs in its own transaction together with
//! the version bump.

use std::cmp::Ordering;

use rusqlite::Connection;

use crate::{schema, DbError, Result, SCHEMA_VERSION};

/// Migration scripts, oldest first. The last entry defines [`SCHEMA_VERSION`].
const MIGRATIONS: &[&str] = &[schema::SCHEMA_V1];

/// Bring the database up to [`SCHEMA_VERSION`].
///
/// # Errors
///
/// - [`DbError::Migration`] if the database is newer than this build
/// - [`DbError::Sqlite`] if a script fails; that migration is rolled back
pub fn run(conn: &Connection) -> Result<()> {
    let current: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    match current.cmp(&SCHEMA_VERSION) {
        Ordering::Equal => Ok(()),
        Ordering::Greater => Err(DbError::Migration(format!(
            "database schema v{current} is newer than supported v{SCHEMA_VERSION}"
        ))),
        Ordering::Less => {
            for version in (current + 1)..=SCHEMA_VERSION {
                apply(conn, version)?;
            }
            Ok(())
        }
    }
}

fn apply(conn: &Connection, version: u32) -> Result<()> {
    let script = usize::try_from(version)
        .ok()
        .and_then(|v| v.checked_sub(1))
        .and_then(|i| MIGRATIONS.get(i))
        .ok_or_else(|| DbError::Migration(format!("no migration for v{version}")))?;

    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(script)?;
    tx.pragma_update(None, "user_version", version)?;
    tx.commit()?;
    tracing::info!(version, "db: schema migrated");
    Ok(())
}
