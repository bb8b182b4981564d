//! Vault ledger query functions.
//!
//! The whole ledger is written in one transaction so a crash never leaves
//! `total_staked` disagreeing with the account rows.

use std::collections::BTreeMap;

use rusqlite::{Connection, OptionalExtension, Transaction};

use harbor_types::{AccountState, Address, AnnualRate, GlobalVaultState, LedgerSnapshot, Timestamp};

use crate::{parse_address, parse_amount, DbError, Result};

/// A persisted vault: its identity and owner alongside the ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VaultRecord {
    pub vault_address: Address,
    pub owner: Address,
    pub snapshot: LedgerSnapshot,
    pub updated_at: Timestamp,
}

/// Replace the stored vault with `record`.
pub fn save(conn: &Connection, record: &VaultRecord) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    write(&tx, record)?;
    tx.commit()?;
    Ok(())
}

/// Replace the stored vault with `record` inside the caller's transaction.
///
/// Nothing is committed here; pair it with the other writes of the same
/// commit so they land together.
pub fn write(tx: &Transaction<'_>, record: &VaultRecord) -> Result<()> {
    let global = &record.snapshot.global;
    tx.execute(
        "INSERT OR REPLACE INTO vault_state
         (id, vault_address, owner, reward_token, lending_market, rate_numerator,
          rate_denominator, price_oracle, total_staked, updated_at)
         VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            record.vault_address.to_string(),
            record.owner.to_string(),
            global.reward_token.to_string(),
            global.lending_market.to_string(),
            to_i64("rate_numerator", global.annual_rate.numerator)?,
            to_i64("rate_denominator", global.annual_rate.denominator)?,
            global.price_oracle.map(|a| a.to_string()),
            global.total_staked.to_string(),
            to_i64("updated_at", record.updated_at)?,
        ],
    )?;

    tx.execute("DELETE FROM accounts", [])?;
    {
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO accounts
             (address, staked_balance, last_accrual_timestamp, settled_reward_amount)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for (address, account) in &record.snapshot.accounts {
            stmt.execute(rusqlite::params![
                address.to_string(),
                account.staked_balance.to_string(),
                to_i64("last_accrual_timestamp", account.last_accrual_timestamp)?,
                account.settled_reward_amount.to_string(),
            ])?;
        }
    }

    tracing::debug!(
        accounts = record.snapshot.accounts.len(),
        total_staked = global.total_staked,
        "db: vault written"
    );
    Ok(())
}

/// Load the stored vault, if one was ever saved.
pub fn load(conn: &Connection) -> Result<Option<VaultRecord>> {
    let row = conn
        .query_row(
            "SELECT vault_address, owner, reward_token, lending_market, rate_numerator,
                    rate_denominator, price_oracle, total_staked, updated_at
             FROM vault_state WHERE id = 1",
            [],
            |row| {
                Ok(StateRow {
                    vault_address: row.get(0)?,
                    owner: row.get(1)?,
                    reward_token: row.get(2)?,
                    lending_market: row.get(3)?,
                    rate_numerator: row.get(4)?,
                    rate_denominator: row.get(5)?,
                    price_oracle: row.get(6)?,
                    total_staked: row.get(7)?,
                    updated_at: row.get(8)?,
                })
            },
        )
        .optional()?;
    let Some(row) = row else {
        return Ok(None);
    };

    let annual_rate = AnnualRate::new(
        from_i64("rate_numerator", row.rate_numerator)?,
        from_i64("rate_denominator", row.rate_denominator)?,
    )
    .map_err(|e| DbError::Serialization(e.to_string()))?;
    let global = GlobalVaultState {
        total_staked: parse_amount("total_staked", &row.total_staked)?,
        reward_token: parse_address("reward_token", &row.reward_token)?,
        lending_market: parse_address("lending_market", &row.lending_market)?,
        annual_rate,
        price_oracle: row
            .price_oracle
            .as_deref()
            .map(|text| parse_address("price_oracle", text))
            .transpose()?,
    };

    Ok(Some(VaultRecord {
        vault_address: parse_address("vault_address", &row.vault_address)?,
        owner: parse_address("owner", &row.owner)?,
        snapshot: LedgerSnapshot {
            global,
            accounts: load_accounts(conn)?,
        },
        updated_at: from_i64("updated_at", row.updated_at)?,
    }))
}

/// Load a single account row.
pub fn account(conn: &Connection, address: &Address) -> Result<AccountState> {
    conn.query_row(
        "SELECT staked_balance, last_accrual_timestamp, settled_reward_amount
         FROM accounts WHERE address = ?1",
        [address.to_string()],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
            ))
        },
    )
    .optional()?
    .ok_or_else(|| DbError::NotFound(format!("account {address}")))
    .and_then(|(staked, last, settled)| {
        Ok(AccountState {
            staked_balance: parse_amount("staked_balance", &staked)?,
            last_accrual_timestamp: from_i64("last_accrual_timestamp", last)?,
            settled_reward_amount: parse_amount("settled_reward_amount", &settled)?,
        })
    })
}

fn load_accounts(conn: &Connection) -> Result<BTreeMap<Address, AccountState>> {
    let mut stmt = conn.prepare(
        "SELECT address, staked_balance, last_accrual_timestamp, settled_reward_amount
         FROM accounts",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(address, staked, last, settled)| {
            Ok((
                parse_address("address", &address)?,
                AccountState {
                    staked_balance: parse_amount("staked_balance", &staked)?,
                    last_accrual_timestamp: from_i64("last_accrual_timestamp", last)?,
                    settled_reward_amount: parse_amount("settled_reward_amount", &settled)?,
                },
            ))
        })
        .collect()
}

struct StateRow {
    vault_address: String,
    owner: String,
    reward_token: String,
    lending_market: String,
    rate_numerator: i64,
    rate_denominator: i64,
    price_oracle: Option<String>,
    total_staked: String,
    updated_at: i64,
}

fn to_i64(column: &str, value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| DbError::Constraint(format!("{column} out of range: {value}")))
}

fn from_i64(column: &str, value: i64) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| DbError::Serialization(format!("{column} is negative: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use harbor_types::UNIT;

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    fn record() -> VaultRecord {
        let mut accounts = BTreeMap::new();
        accounts.insert(
            Address::derive("alice"),
            AccountState {
                staked_balance: 10 * UNIT,
                last_accrual_timestamp: 1_700_000_000,
                settled_reward_amount: UNIT / 10,
            },
        );
        accounts.insert(Address::derive("bob"), AccountState::new(1_700_000_100));
        VaultRecord {
            vault_address: Address::derive("vault"),
            owner: Address::derive("owner"),
            snapshot: LedgerSnapshot {
                global: GlobalVaultState {
                    total_staked: 10 * UNIT,
                    reward_token: Address::derive("token"),
                    lending_market: Address::derive("market"),
                    annual_rate: AnnualRate::from_bps(100),
                    price_oracle: Some(Address::derive("oracle")),
                },
                accounts,
            },
            updated_at: 1_700_000_200,
        }
    }

    #[test]
    fn test_load_empty() {
        let conn = test_db();
        assert_eq!(load(&conn).expect("load"), None);
    }

    #[test]
    fn test_save_and_load() {
        let conn = test_db();
        let record = record();
        save(&conn, &record).expect("save");
        assert_eq!(load(&conn).expect("load"), Some(record));
    }

    #[test]
    fn test_save_replaces() {
        let conn = test_db();
        let mut record = record();
        save(&conn, &record).expect("save");

        let alice = Address::derive("alice");
        record.snapshot.global.total_staked = 0;
        if let Some(account) = record.snapshot.accounts.get_mut(&alice) {
            account.staked_balance = 0;
            account.settled_reward_amount = 0;
        }
        record.snapshot.global.price_oracle = None;
        save(&conn, &record).expect("save again");

        let loaded = load(&conn).expect("load").expect("present");
        assert_eq!(loaded, record);
        assert!(loaded.snapshot.is_conserved());
    }

    #[test]
    fn test_large_amounts_survive() {
        let conn = test_db();
        let mut record = record();
        let alice = Address::derive("alice");
        record.snapshot.global.total_staked = u128::MAX;
        if let Some(account) = record.snapshot.accounts.get_mut(&alice) {
            account.staked_balance = u128::MAX;
        }
        save(&conn, &record).expect("save");
        assert_eq!(
            account(&conn, &alice).expect("account").staked_balance,
            u128::MAX
        );
    }

    #[test]
    fn test_missing_account() {
        let conn = test_db();
        assert!(matches!(
            account(&conn, &Address::derive("nobody")),
            Err(DbError::NotFound(_))
        ));
    }
}
