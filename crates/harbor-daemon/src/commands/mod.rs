//! RPC command handlers.
//!
//! Each submodule implements the commands for one category. Amounts travel
//! as decimal strings of base units; addresses as `0x`-prefixed hex.
//!
//! The `caller` param is taken as claimed. Owner and authority checks run
//! against it, so they guard against mistakes, not against a hostile
//! client; the owner-only socket is what keeps other users out.

pub mod admin;
pub mod diagnostics;
pub mod vault;

use harbor_types::{Address, Amount, Timestamp};
use serde_json::Value;

use crate::node::Harbor;
use crate::rpc::RpcError;
use crate::DaemonState;

/// Read a required address parameter.
pub(crate) fn address_param(params: &Value, name: &str) -> Result<Address, RpcError> {
    params
        .get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| RpcError::invalid_params(&format!("{name} required")))?
        .parse()
        .map_err(|e| RpcError::invalid_params(&format!("{name}: {e}")))
}

/// Read a required amount parameter. Accepts a decimal string or a JSON
/// integer.
pub(crate) fn amount_param(params: &Value, name: &str) -> Result<Amount, RpcError> {
    match params.get(name) {
        Some(Value::String(s)) => s
            .parse()
            .map_err(|_| RpcError::invalid_params(&format!("{name}: not a base-unit amount"))),
        Some(v) => v
            .as_u64()
            .map(Amount::from)
            .ok_or_else(|| RpcError::invalid_params(&format!("{name}: not a base-unit amount"))),
        None => Err(RpcError::invalid_params(&format!("{name} required"))),
    }
}

/// Persist the node after a committed mutation and publish its events.
pub(crate) async fn commit(
    state: &DaemonState,
    node: &mut Harbor,
    now: Timestamp,
) -> Result<(), RpcError> {
    let db = state.db.lock().await;
    let events = node.persist(&db, now).map_err(|e| {
        tracing::error!(error = %e, "commit: failed to persist node state");
        RpcError::from(e)
    })?;
    let listeners = state.event_bus.publish(events);
    tracing::trace!(listeners, "commit: events published");
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_amount_param() {
        let params = json!({
            "a": "340282366920938463463374607431768211455",
            "b": 7,
            "c": "1.5",
            "d": -1,
        });
        assert_eq!(amount_param(&params, "a").expect("a"), u128::MAX);
        assert_eq!(amount_param(&params, "b").expect("b"), 7);
        assert_eq!(amount_param(&params, "c").expect_err("c").code, -32602);
        assert_eq!(amount_param(&params, "d").expect_err("d").code, -32602);
        assert_eq!(amount_param(&params, "missing").expect_err("missing").code, -32602);
    }

    #[test]
    fn test_address_param() {
        let alice = Address::derive("alice");
        let params = json!({"account": alice.to_string(), "bad": "0x12"});
        assert_eq!(address_param(&params, "account").expect("account"), alice);
        assert_eq!(address_param(&params, "bad").expect_err("bad").code, -32602);
    }
}
