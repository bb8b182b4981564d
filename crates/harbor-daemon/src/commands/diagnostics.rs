//! Diagnostics command handlers.

use std::sync::Arc;

use harbor_db::queries::events;
use serde_json::Value;

use crate::events::EventFilter;
use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

/// Default number of events returned by `recent_events`.
const DEFAULT_EVENT_LIMIT: u32 = 50;

/// Upper bound on `recent_events.limit`.
const MAX_EVENT_LIMIT: u32 = 1000;

/// Simulated market state, accrued to now.
pub async fn market_status(state: &Arc<DaemonState>) -> Result {
    let now = (state.clock)();
    let mut node = state.node.lock().await;
    node.accrue(now)?;
    let status = node.vault().market().status();
    let underlying = status.underlying;
    let total_staked = node.vault().total_staked();

    let mut result =
        serde_json::to_value(status).map_err(|e| RpcError::internal_error(&e.to_string()))?;
    result["total_staked"] = Value::String(total_staked.to_string());
    result["skimmable"] = Value::String(underlying.saturating_sub(total_staked).to_string());
    Ok(result)
}

/// Most recent persisted events, newest first.
///
/// Params: `limit` (default 50), optional `names` and `since` filters.
pub async fn recent_events(state: &Arc<DaemonState>, params: &Value) -> Result {
    let limit = match params.get("limit") {
        None | Some(Value::Null) => DEFAULT_EVENT_LIMIT,
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .filter(|n| (1..=MAX_EVENT_LIMIT).contains(n))
            .ok_or_else(|| {
                RpcError::invalid_params(&format!("limit must be between 1 and {MAX_EVENT_LIMIT}"))
            })?,
    };
    let filter: EventFilter = match params {
        Value::Object(_) => serde_json::from_value(params.clone())
            .map_err(|e| RpcError::invalid_params(&e.to_string()))?,
        _ => EventFilter::default(),
    };

    let db = state.db.lock().await;
    let rows = events::recent(&db, limit)
        .map_err(|e| RpcError::internal_error(&format!("db error: {e}")))?;

    let result: Vec<Value> = rows
        .into_iter()
        .filter(|row| filter.matches(&row.event))
        .map(|row| {
            serde_json::json!({
                "id": row.id,
                "name": row.event.kind.name(),
                "timestamp": row.event.timestamp,
                "event": row.event.kind,
            })
        })
        .collect();

    Ok(serde_json::json!(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{test_support, vault};
    use harbor_types::{Address, SECONDS_PER_YEAR, UNIT};
    use serde_json::json;

    #[tokio::test]
    async fn test_market_status_reports_surplus() {
        let (state, clock) = test_support::state();
        vault::deposit(
            &state,
            &json!({
                "caller": Address::derive("alice").to_string(),
                "amount": (100 * UNIT).to_string(),
            }),
        )
        .await
        .expect("deposit");
        clock.advance(SECONDS_PER_YEAR);

        let status = market_status(&state).await.expect("status");
        assert_eq!(status["total_staked"], (100 * UNIT).to_string());
        assert_ne!(status["skimmable"], "0");
        assert_eq!(status["unavailable"], false);
    }

    #[tokio::test]
    async fn test_recent_events_newest_first() {
        let (state, _clock) = test_support::state();
        let alice = Address::derive("alice").to_string();
        vault::deposit(&state, &json!({"caller": alice, "amount": (10 * UNIT).to_string()}))
            .await
            .expect("deposit");
        vault::withdraw(&state, &json!({"caller": alice, "amount": (10 * UNIT).to_string()}))
            .await
            .expect("withdraw");

        let all = recent_events(&state, &json!({})).await.expect("events");
        let names: Vec<&str> = all
            .as_array()
            .expect("array")
            .iter()
            .filter_map(|e| e["name"].as_str())
            .collect();
        assert_eq!(names, vec!["Withdrawal", "Deposit", "ChangedAuthority"]);

        let deposits = recent_events(&state, &json!({"names": ["Deposit"]}))
            .await
            .expect("filtered");
        assert_eq!(deposits.as_array().expect("array").len(), 1);
        assert_eq!(deposits[0]["event"]["amount"], (10 * UNIT).to_string());
    }

    #[tokio::test]
    async fn test_recent_events_rejects_bad_limit() {
        let (state, _clock) = test_support::state();
        let err = recent_events(&state, &json!({"limit": 0}))
            .await
            .expect_err("zero limit");
        assert_eq!(err.code, -32602);
    }
}
