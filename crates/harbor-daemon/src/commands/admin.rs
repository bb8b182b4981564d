//! Owner and dev-only command handlers.
//!
//! Owner commands take an explicit `caller`; the vault and token check it
//! against their stored owner.

use std::sync::Arc;

use harbor_types::parse_units;
use serde_json::Value;

use super::{address_param, commit};
use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

/// Forward the market's protocol reward to `recipient`.
pub async fn claim_external_protocol_reward(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = address_param(params, "caller")?;
    let recipient = address_param(params, "recipient")?;
    let now = (state.clock)();

    let mut node = state.node.lock().await;
    let claimed = node.claim_external_protocol_reward(&caller, recipient, now)?;
    commit(state, &mut node, now).await?;

    Ok(serde_json::json!({
        "claimed": claimed.to_string(),
        "recipient_balance": node
            .vault()
            .market()
            .protocol_reward_balance(&recipient)
            .to_string(),
    }))
}

/// Send market interest above total principal to `recipient`.
pub async fn skim_external_interest(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = address_param(params, "caller")?;
    let recipient = address_param(params, "recipient")?;
    let now = (state.clock)();

    let mut node = state.node.lock().await;
    let skimmed = node.skim_external_interest(&caller, recipient, now)?;
    commit(state, &mut node, now).await?;

    Ok(serde_json::json!({ "skimmed": skimmed.to_string() }))
}

/// Point the vault at another reward token.
pub async fn set_reward_token(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = address_param(params, "caller")?;
    let reward_token = address_param(params, "reward_token")?;
    let now = (state.clock)();

    let mut node = state.node.lock().await;
    node.set_reward_token(&caller, reward_token)?;
    commit(state, &mut node, now).await?;

    Ok(serde_json::json!({ "reward_token": reward_token.to_string() }))
}

/// Change the reward token's mint authority.
pub async fn set_vault_authority(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = address_param(params, "caller")?;
    let authority = address_param(params, "authority")?;
    let now = (state.clock)();

    let mut node = state.node.lock().await;
    node.set_vault_authority(&caller, authority)?;
    commit(state, &mut node, now).await?;

    Ok(serde_json::json!({ "vault_authority": authority.to_string() }))
}

/// Hand vault ownership to `new_owner`.
pub async fn transfer_ownership(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = address_param(params, "caller")?;
    let new_owner = address_param(params, "new_owner")?;
    let now = (state.clock)();

    let mut node = state.node.lock().await;
    node.transfer_ownership(&caller, new_owner)?;
    commit(state, &mut node, now).await?;

    Ok(serde_json::json!({ "owner": new_owner.to_string() }))
}

/// Set the feed price (dev only). `price` is in whole quote units, e.g.
/// "2000.5"; it is scaled by the feed decimals.
pub async fn dev_set_price(state: &Arc<DaemonState>, params: &Value) -> Result {
    let price = params
        .get("price")
        .and_then(|v| v.as_str())
        .ok_or_else(|| RpcError::invalid_params("price required"))?;
    let now = (state.clock)();

    let mut node = state.node.lock().await;
    let decimals = node.price()?.decimals;
    let value =
        parse_units(price, decimals).map_err(|e| RpcError::invalid_params(&format!("price: {e}")))?;
    node.set_price(value, now)?;

    Ok(serde_json::json!({
        "price": value.to_string(),
        "decimals": decimals,
        "updated_at": now,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{test_support, vault};
    use crate::config::HarborConfig;
    use crate::node::Deployment;
    use harbor_types::{Address, SECONDS_PER_YEAR, UNIT};
    use harbor_vault::AccrualMode;
    use serde_json::json;

    /// The deployer owns both the vault and the token.
    fn owner() -> String {
        Deployment::derive().deployer.to_string()
    }

    fn addr(label: &str) -> String {
        Address::derive(label).to_string()
    }

    #[tokio::test]
    async fn test_owner_commands_gated() {
        let (state, _clock) = test_support::state();
        let stranger = addr("mallory");

        let params = json!({"caller": stranger, "recipient": stranger});
        let err = skim_external_interest(&state, &params)
            .await
            .expect_err("not owner");
        assert_eq!(err.code, -32001);

        let err = set_vault_authority(&state, &json!({"caller": stranger, "authority": stranger}))
            .await
            .expect_err("not token owner");
        assert_eq!(err.code, -32001);

        let err = set_reward_token(&state, &json!({"caller": stranger, "reward_token": stranger}))
            .await
            .expect_err("not owner");
        assert_eq!(err.code, -32001);
    }

    #[tokio::test]
    async fn test_skim_and_claim_with_no_deposits_are_noops() {
        let (state, clock) = test_support::state();
        let owner = owner();
        clock.advance(SECONDS_PER_YEAR);

        let params = json!({"caller": owner, "recipient": addr("treasury")});
        let skim = skim_external_interest(&state, &params).await.expect("skim");
        assert_eq!(skim["skimmed"], "0");

        let claim = claim_external_protocol_reward(
            &state,
            &json!({"caller": owner, "recipient": addr("treasury")}),
        )
        .await
        .expect("claim");
        assert_eq!(claim["claimed"], "0");
    }

    #[tokio::test]
    async fn test_skim_pays_only_surplus() {
        let (state, clock) = test_support::state();
        let owner = owner();
        let stake = json!({"caller": addr("alice"), "amount": (100 * UNIT).to_string()});
        vault::deposit(&state, &stake).await.expect("deposit");
        clock.advance(SECONDS_PER_YEAR);

        let params = json!({"caller": owner, "recipient": addr("treasury")});
        let skim = skim_external_interest(&state, &params).await.expect("skim");
        assert_ne!(skim["skimmed"], "0");

        // Principal is still fully redeemable.
        let result = vault::withdraw(&state, &stake).await.expect("withdraw");
        assert_eq!(result["total_staked"], "0");
    }

    #[tokio::test]
    async fn test_revoked_authority_blocks_reward_withdrawal() {
        let (state, clock) = test_support::state();
        let owner = owner();
        vault::deposit(&state, &json!({"caller": addr("alice"), "amount": (10 * UNIT).to_string()}))
            .await
            .expect("deposit");
        set_vault_authority(&state, &json!({"caller": owner, "authority": addr("elsewhere")}))
            .await
            .expect("set authority");
        clock.advance(SECONDS_PER_YEAR);

        let exit = json!({"caller": addr("alice"), "amount": (10 * UNIT).to_string()});
        let err = vault::withdraw(&state, &exit)
            .await
            .expect_err("vault can no longer mint");
        assert_eq!(err.code, -32001);

        let staked = vault::staked_balance(&state, &json!({"account": addr("alice")}))
            .await
            .expect("staked");
        assert_eq!(staked["staked_balance"], (10 * UNIT).to_string());
    }

    #[tokio::test]
    async fn test_dev_set_price_changes_conversion() {
        let mut config = HarborConfig::default();
        config.vault.accrual = AccrualMode::PriceConverted;
        config.vault.annual_rate_bps = 1000;
        config.oracle.staleness_secs = 2 * SECONDS_PER_YEAR;
        let (state, clock) = test_support::state_with(config);

        vault::deposit(&state, &json!({"caller": addr("alice"), "amount": (10 * UNIT).to_string()}))
            .await
            .expect("deposit");
        clock.advance(SECONDS_PER_YEAR);

        let set = dev_set_price(&state, &json!({"price": "200"})).await.expect("set price");
        assert_eq!(set["price"], "20000000000");

        let accrued = vault::accrued_reward(&state, &json!({"account": addr("alice")}))
            .await
            .expect("accrued");
        assert_eq!(accrued["accrued_reward"], (200 * UNIT).to_string());

        let err = dev_set_price(&state, &json!({"price": "0"})).await.expect_err("zero price");
        assert_eq!(err.code, -32003);
    }

    #[tokio::test]
    async fn test_transfer_ownership() {
        let (state, _clock) = test_support::state();
        let owner = owner();
        let new_owner = addr("new-owner");
        transfer_ownership(&state, &json!({"caller": owner, "new_owner": new_owner}))
            .await
            .expect("transfer");

        let err = set_reward_token(&state, &json!({"caller": owner, "reward_token": addr("t2")}))
            .await
            .expect_err("old owner");
        assert_eq!(err.code, -32001);
        set_reward_token(&state, &json!({"caller": new_owner, "reward_token": addr("t2")}))
            .await
            .expect("new owner");
    }
}
