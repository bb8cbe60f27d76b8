//! Fixtures shared by the unit tests.

use alloy_primitives::{address, b256, hex, Address, U256};
use k256::ecdsa::SigningKey;
use vault_relay_types::{
    ConsumeParams, ForwardRequest, LedgerRoles, MerchantId, OperationCall, PromoTier,
};

use crate::{
    calldata::encode_call,
    config::VaultConfig,
    ledger::{FeeRule, InMemoryLedger},
    signer::LocalKeySigner,
};

/// First Hardhat dev account.
pub const HARDHAT_KEY_0: [u8; 32] =
    hex!("ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80");

pub const CHAIN_ID: u64 = 31_337;
pub const NOW: u64 = 1_700_000_000;

pub const VAULT: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");
pub const FORWARDER: Address = address!("e7f1725E7734CE288F8367e1Bb143E90bb3F0512");
pub const TOKEN: Address = address!("9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0");
pub const OWNER: Address = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");
pub const MERCHANT_WALLET: Address = address!("3C44CdDdB6a900fa2b585dd299e03d12FA4293BC");
/// Address of [`HARDHAT_KEY_0`].
pub const USER: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

/// `MerchantId::from_name("coffee")`.
pub const MERCHANT: MerchantId = MerchantId(b256!(
    "636f666665650000000000000000000000000000000000000000000000000000"
));

pub fn hardhat_signer() -> LocalKeySigner {
    LocalKeySigner::new(SigningKey::from_slice(&HARDHAT_KEY_0).unwrap())
}

pub fn config() -> VaultConfig {
    VaultConfig::new(CHAIN_ID, VAULT, FORWARDER)
}

pub fn consume_params(amount: u64, voucher_id: u64) -> ConsumeParams {
    ConsumeParams {
        merchant_id: MERCHANT,
        token: TOKEN,
        amount: U256::from(amount),
        voucher_id: U256::from(voucher_id),
        point_to_use: U256::ZERO,
        idx: U256::ZERO,
        seq: U256::from(1u64),
        recipient: USER,
    }
}

pub fn forward_request(from: Address, nonce: u64) -> ForwardRequest {
    ForwardRequest {
        from,
        to: VAULT,
        value: U256::ZERO,
        gas: U256::from(100_000u64),
        nonce: U256::from(nonce),
        deadline: NOW + 600,
        data: encode_call(&OperationCall::Consume(consume_params(100, 0))),
    }
}

/// 90% of the amount is charged, 10 points per 100 discounted, 5-unit voucher valid a day.
pub fn tier() -> PromoTier {
    PromoTier {
        min_amount: U256::from(10u64),
        discount_rate: U256::from(90u64),
        voucher_amount: U256::from(5u64),
        point_amount: U256::from(10u64),
        start_time: 0,
        end_time: 0,
        voucher_expire_period: 86_400,
        enabled: true,
    }
}

/// Vault with one whitelisted token, one merchant on tier 0, a flat fee of 1 and
/// a funded, approved user.
pub fn seeded_ledger() -> InMemoryLedger {
    let ledger = InMemoryLedger::new();
    ledger.whitelist_token(TOKEN);
    ledger.set_merchant_recipient(MERCHANT, MERCHANT_WALLET);
    ledger.set_discount_base(U256::from(100u64));
    ledger.set_promo_tier(MERCHANT, U256::ZERO, tier());
    ledger.set_fee_rule(FeeRule::Flat(U256::from(1u64)));
    ledger.set_point_balance(MERCHANT, USER, U256::from(25u64));
    ledger.set_token_balance(TOKEN, USER, U256::from(1_000_000u64));
    ledger.set_token_allowance(TOKEN, USER, VAULT, U256::from(1_000_000u64));
    ledger.set_roles(LedgerRoles {
        owner: OWNER,
        fee_receiver: OWNER,
        fee_rule_provider: OWNER,
        trusted_forwarder: FORWARDER,
    });
    ledger
}

#[test]
fn merchant_constant_matches_name() {
    assert_eq!(MERCHANT, MerchantId::from_name("coffee"));
}
