//! Integration test: Reward token authority and wiring.
//!
//! Exercises the token as the vault sees it:
//! 1. Only the vault authority mints and burns; only the owner reassigns it
//! 2. Withdrawal rewards arrive as mints and can be transferred on
//! 3. A revoked authority rolls the whole withdrawal back
//! 4. A vault pointed at another token refuses to pay out

use harbor_access::AccessError;
use harbor_integration_tests::{account, Fixture, BASE_TIME};
use harbor_token::TokenError;
use harbor_types::{Address, EventKind, SECONDS_PER_YEAR, UNIT};
use harbor_vault::{ErrorKind, VaultError};

#[test]
fn only_vault_authority_mints_and_burns() {
    let mut fx = Fixture::deploy().expect("deploy");
    let mallory = account("mallory");
    let owner = fx.owner;

    assert_eq!(fx.token.vault_authority(), Some(fx.vault.address()));

    let err = fx.token.mint(&mallory, mallory, UNIT).expect_err("not authority");
    assert_eq!(
        err,
        TokenError::AccessDenied(AccessError::NotAuthority { caller: mallory })
    );
    // Ownership of the token does not imply mint rights.
    assert!(fx.token.mint(&owner, owner, UNIT).is_err());
    assert!(fx.token.burn(&owner, owner, 0).is_err());

    let err = fx
        .token
        .set_vault_authority(&mallory, mallory)
        .expect_err("not owner");
    assert_eq!(
        err,
        TokenError::AccessDenied(AccessError::NotOwner { caller: mallory })
    );
    assert_eq!(fx.token.total_supply(), 0);
}

#[test]
fn rewards_arrive_as_mints_and_transfer_on() {
    let mut fx = Fixture::deploy().expect("deploy");
    let alice = account("alice");
    let bob = account("bob");
    fx.deposit("alice", 10 * UNIT, BASE_TIME).expect("deposit");
    fx.withdraw("alice", 10 * UNIT, BASE_TIME + SECONDS_PER_YEAR)
        .expect("withdraw");

    assert_eq!(
        fx.token.drain_events(),
        vec![
            EventKind::ChangedAuthority {
                new_authority: fx.vault.address(),
            },
            EventKind::Transfer {
                from: None,
                to: Some(alice),
                amount: UNIT / 10,
            },
        ]
    );

    fx.token.transfer(&alice, bob, UNIT / 20).expect("transfer");
    assert_eq!(fx.token.balance_of(&alice), UNIT / 20);
    assert_eq!(fx.token.balance_of(&bob), UNIT / 20);
    assert_eq!(fx.token.total_supply(), UNIT / 10);

    let err = fx.token.transfer(&bob, alice, UNIT).expect_err("overdraw");
    assert!(matches!(err, TokenError::InsufficientBalance { .. }));
    let err = fx
        .token
        .transfer(&alice, Address::ZERO, 1)
        .expect_err("zero recipient");
    assert_eq!(err, TokenError::InvalidRecipient);
}

#[test]
fn revoked_authority_rolls_back_withdrawal() {
    let mut fx = Fixture::deploy().expect("deploy");
    let owner = fx.owner;
    fx.deposit("alice", 10 * UNIT, BASE_TIME).expect("deposit");
    let before = fx.vault.snapshot();

    fx.token
        .set_vault_authority(&owner, account("elsewhere"))
        .expect("reassign");
    let err = fx
        .withdraw("alice", 10 * UNIT, BASE_TIME + SECONDS_PER_YEAR)
        .expect_err("vault cannot mint");
    assert_eq!(err.kind(), ErrorKind::AccessDenied);
    assert_eq!(fx.vault.snapshot(), before);
    assert_eq!(fx.cash.balance_of(&account("alice")), 0);
    assert!(fx.market_position().expect("position") >= 10 * UNIT);

    // Restoring the authority lets the same withdrawal through.
    let vault = fx.vault.address();
    fx.token.set_vault_authority(&owner, vault).expect("restore");
    let reward = fx
        .withdraw("alice", 10 * UNIT, BASE_TIME + SECONDS_PER_YEAR)
        .expect("withdraw");
    assert_eq!(reward, UNIT / 10);
}

#[test]
fn mismatched_reward_token_is_misconfiguration() {
    let mut fx = Fixture::deploy().expect("deploy");
    let owner = fx.owner;
    let wired = fx.token.address();
    fx.deposit("alice", 10 * UNIT, BASE_TIME).expect("deposit");

    let other = account("other-token");
    fx.vault.set_reward_token(&owner, other).expect("set token");
    assert_eq!(fx.vault.reward_token(), other);

    let err = fx
        .withdraw("alice", 10 * UNIT, BASE_TIME + 60)
        .expect_err("wrong token");
    assert_eq!(
        err,
        VaultError::RewardTokenMismatch {
            expected: other,
            actual: wired,
        }
    );
    assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
    assert_eq!(fx.vault.staked_balance(&account("alice")), 10 * UNIT);

    fx.vault.set_reward_token(&owner, wired).expect("reset token");
    fx.withdraw("alice", 10 * UNIT, BASE_TIME + 60).expect("withdraw");
    assert!(fx
        .vault
        .drain_events()
        .contains(&EventKind::RewardTokenChanged { reward_token: other }));
}
