//! Event log query functions.

use rusqlite::Connection;

use harbor_types::{Event, EventKind};

use crate::{DbError, Result};

/// A stored event with its row id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventRow {
    pub id: i64,
    pub event: Event,
}

/// Append an event. Returns its row id.
pub fn append(conn: &Connection, event: &Event) -> Result<i64> {
    let payload =
        serde_json::to_string(&event.kind).map_err(|e| DbError::Serialization(e.to_string()))?;
    let timestamp = i64::try_from(event.timestamp)
        .map_err(|_| DbError::Constraint(format!("timestamp out of range: {}", event.timestamp)))?;
    conn.execute(
        "INSERT INTO events (name, payload, timestamp) VALUES (?1, ?2, ?3)",
        rusqlite::params![event.kind.name(), payload, timestamp],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Append several events in one transaction.
pub fn append_all(conn: &Connection, events: &[Event]) -> Result<()> {
    if events.is_empty() {
        return Ok(());
    }
    let tx = conn.unchecked_transaction()?;
    for event in events {
        append(&tx, event)?;
    }
    tx.commit()?;
    Ok(())
}

/// Most recent events, newest first.
pub fn recent(conn: &Connection, limit: u32) -> Result<Vec<EventRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, payload, timestamp FROM events ORDER BY id DESC LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([limit], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, payload, timestamp)| {
            let kind: EventKind = serde_json::from_str(&payload)
                .map_err(|e| DbError::Serialization(e.to_string()))?;
            Ok(EventRow {
                id,
                event: Event {
                    timestamp: timestamp as u64,
                    kind,
                },
            })
        })
        .collect()
}

/// Number of stored events named `name`.
pub fn count_by_name(conn: &Connection, name: &str) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM events WHERE name = ?1",
        [name],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use harbor_types::{Address, UNIT};

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    fn deposit(timestamp: u64) -> Event {
        Event {
            timestamp,
            kind: EventKind::Deposit {
                account: Address::derive("alice"),
                amount: 10 * UNIT,
            },
        }
    }

    #[test]
    fn test_append_and_recent() {
        let conn = test_db();
        append(&conn, &deposit(100)).expect("append");
        let withdrawal = Event {
            timestamp: 200,
            kind: EventKind::Withdrawal {
                account: Address::derive("alice"),
                amount: 10 * UNIT,
                reward_paid: UNIT / 10,
            },
        };
        append(&conn, &withdrawal).expect("append");

        let rows = recent(&conn, 10).expect("recent");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].event, withdrawal);
        assert_eq!(rows[1].event, deposit(100));
        assert!(rows[0].id > rows[1].id);
    }

    #[test]
    fn test_recent_limit() {
        let conn = test_db();
        append_all(&conn, &[deposit(1), deposit(2), deposit(3)]).expect("append");
        let rows = recent(&conn, 2).expect("recent");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].event.timestamp, 3);
    }

    #[test]
    fn test_count_by_name() {
        let conn = test_db();
        append_all(&conn, &[deposit(1), deposit(2)]).expect("append");
        append(
            &conn,
            &Event {
                timestamp: 3,
                kind: EventKind::ChangedAuthority {
                    new_authority: Address::derive("vault"),
                },
            },
        )
        .expect("append");
        assert_eq!(count_by_name(&conn, "Deposit").expect("count"), 2);
        assert_eq!(count_by_name(&conn, "ChangedAuthority").expect("count"), 1);
        assert_eq!(count_by_name(&conn, "Withdrawal").expect("count"), 0);
    }
}
