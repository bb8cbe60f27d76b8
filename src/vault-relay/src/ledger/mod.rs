//! Ledger collaborator seams.
//!
//! The engine never talks to a chain directly; it reads through [`LedgerReader`] and
//! submits through [`LedgerWriter`]. [`RpcLedger`] backs both with a JSON-RPC node,
//! [`InMemoryLedger`] with process-local state.

use std::{future::Future, time::Duration};

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use serde::Serialize;
use vault_relay_types::{ForwardRequest, LedgerRoles, MerchantId, PromoTier, Voucher};

use crate::errors::LedgerError;

pub mod memory;
pub mod rpc;

pub use memory::{FeeRule, InMemoryLedger};
pub use rpc::RpcLedger;

/// Read side of the vault, its forwarder, the fee rule provider and ERC-20 tokens.
///
/// Every method is a single remote read; callers bound them with [`bounded`].
#[async_trait]
pub trait LedgerReader: Send + Sync {
    /// Next forwarder nonce of `account`.
    async fn nonce_of(&self, account: Address) -> Result<U256, LedgerError>;

    async fn promo_tier(&self, merchant: MerchantId, idx: U256) -> Result<PromoTier, LedgerError>;

    /// A voucher that was never minted comes back with a zero merchant id.
    async fn voucher(&self, id: U256) -> Result<Voucher, LedgerError>;

    async fn is_seq_used(&self, sender: Address, seq: U256) -> Result<bool, LedgerError>;

    async fn is_token_whitelisted(&self, token: Address) -> Result<bool, LedgerError>;

    /// Zero address when the merchant has no recipient.
    async fn merchant_recipient(&self, merchant: MerchantId) -> Result<Address, LedgerError>;

    async fn point_balance(&self, merchant: MerchantId, account: Address) -> Result<U256, LedgerError>;

    /// Denominator of promo-tier discount and point rates.
    async fn discount_base(&self) -> Result<U256, LedgerError>;

    async fn fee_for(
        &self,
        merchant: MerchantId,
        token: Address,
        amount: U256,
    ) -> Result<U256, LedgerError>;

    async fn roles(&self) -> Result<LedgerRoles, LedgerError>;

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, LedgerError>;

    async fn token_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, LedgerError>;
}

/// Write side: hand a signed request to the forwarder's `execute`.
///
/// Split where a transaction hash first exists: [`LedgerWriter::send`] returns it and
/// [`LedgerWriter::confirm`] resolves it.
#[async_trait]
pub trait LedgerWriter: Send + Sync {
    /// Broadcast `execute(request, signature)` and return its transaction hash.
    ///
    /// A request the forwarder would refuse fails with [`LedgerError::Reverted`]
    /// and is never broadcast.
    async fn send(&self, request: &ForwardRequest, signature: &Bytes) -> Result<B256, LedgerError>;

    /// Wait for `tx_hash` to be mined and report whether the forwarded call took effect.
    ///
    /// Does not return until a receipt exists; callers bound it.
    async fn confirm(&self, tx_hash: B256) -> Result<SubmissionStatus, LedgerError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum SubmissionStatus {
    Confirmed,
    Reverted { reason: String },
    /// Broadcast; no receipt within the confirmation window.
    Pending,
}

/// Await `fut` for at most `limit`, naming `call` in the timeout error.
pub async fn bounded<T, F>(call: &'static str, limit: Duration, fut: F) -> Result<T, LedgerError>
where
    F: Future<Output = Result<T, LedgerError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(LedgerError::Timeout {
            call,
            timeout_ms: limit.as_millis() as u64,
        }),
    }
}
