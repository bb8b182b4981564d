//! Depositor command handlers.

use std::sync::Arc;

use serde_json::Value;

use super::{address_param, amount_param, commit};
use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

/// Stake `amount` for `caller`.
pub async fn deposit(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = address_param(params, "caller")?;
    let amount = amount_param(params, "amount")?;
    let now = (state.clock)();

    let mut node = state.node.lock().await;
    node.deposit(caller, amount, now)?;
    commit(state, &mut node, now).await?;

    Ok(serde_json::json!({
        "staked_balance": node.vault().staked_balance(&caller).to_string(),
        "total_staked": node.vault().total_staked().to_string(),
    }))
}

/// Withdraw `amount` of principal for `caller`, paying its reward.
pub async fn withdraw(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = address_param(params, "caller")?;
    let amount = amount_param(params, "amount")?;
    let now = (state.clock)();

    let mut node = state.node.lock().await;
    let reward = node.withdraw(caller, amount, now)?;
    commit(state, &mut node, now).await?;

    Ok(serde_json::json!({
        "reward_paid": reward.to_string(),
        "staked_balance": node.vault().staked_balance(&caller).to_string(),
        "total_staked": node.vault().total_staked().to_string(),
    }))
}

/// Principal staked by `account`.
pub async fn staked_balance(state: &Arc<DaemonState>, params: &Value) -> Result {
    let account = address_param(params, "account")?;
    let node = state.node.lock().await;
    Ok(serde_json::json!({
        "account": account.to_string(),
        "staked_balance": node.vault().staked_balance(&account).to_string(),
    }))
}

/// Reward `account` would receive if it withdrew now.
pub async fn accrued_reward(state: &Arc<DaemonState>, params: &Value) -> Result {
    let account = address_param(params, "account")?;
    let now = (state.clock)();
    let node = state.node.lock().await;
    let accrued = node
        .vault()
        .accrued_reward(&account, now)
        .map_err(|e| RpcError::vault(&e))?;
    Ok(serde_json::json!({
        "account": account.to_string(),
        "accrued_reward": accrued.to_string(),
        "as_of": now,
    }))
}

/// Sum of all principal.
pub async fn total_staked(state: &Arc<DaemonState>) -> Result {
    let node = state.node.lock().await;
    Ok(serde_json::json!({
        "total_staked": node.vault().total_staked().to_string(),
    }))
}

/// Reward tokens held by `account`, and base asset paid out to it.
pub async fn reward_balance(state: &Arc<DaemonState>, params: &Value) -> Result {
    let account = address_param(params, "account")?;
    let node = state.node.lock().await;
    Ok(serde_json::json!({
        "account": account.to_string(),
        "reward_balance": node.token().balance_of(&account).to_string(),
        "reward_total_supply": node.token().total_supply().to_string(),
        "base_asset_received": node.cash().balance_of(&account).to_string(),
    }))
}
