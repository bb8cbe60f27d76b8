//! Process-local ledger for tests and offline dry runs.
//!
//! Mirrors the vault's public reads and applies the subset of `execute` effects the
//! relayer can observe afterwards (nonce bump, seq and voucher consumption).

use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use async_trait::async_trait;
use vault_relay_types::{ForwardRequest, LedgerRoles, MerchantId, OperationCall, PromoTier, Voucher};

use super::{LedgerReader, LedgerWriter, SubmissionStatus};
use crate::{calldata::decode_any, errors::LedgerError};

pub const DEFAULT_DISCOUNT_BASE: u64 = 10_000;

/// How the fee rule provider prices a consumption.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeeRule {
    Flat(U256),
    /// Basis points of the discounted amount, truncating.
    Bps(u64),
}

impl FeeRule {
    fn apply(&self, amount: U256) -> U256 {
        match self {
            FeeRule::Flat(fee) => *fee,
            FeeRule::Bps(bps) => amount.saturating_mul(U256::from(*bps)) / U256::from(10_000u64),
        }
    }
}

struct State {
    nonces: HashMap<Address, U256>,
    tiers: HashMap<(MerchantId, U256), PromoTier>,
    vouchers: HashMap<U256, Voucher>,
    used_seqs: HashSet<(Address, U256)>,
    whitelist: HashSet<Address>,
    recipients: HashMap<MerchantId, Address>,
    points: HashMap<(MerchantId, Address), U256>,
    balances: HashMap<(Address, Address), U256>,
    allowances: HashMap<(Address, Address, Address), U256>,
    discount_base: U256,
    fee_rule: FeeRule,
    roles: LedgerRoles,
    offline: bool,
    revert_next: Option<String>,
    pending_next: bool,
    submitted: Vec<ForwardRequest>,
    /// `None` while the transaction is waiting to be mined.
    receipts: HashMap<B256, Option<SubmissionStatus>>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            nonces: HashMap::new(),
            tiers: HashMap::new(),
            vouchers: HashMap::new(),
            used_seqs: HashSet::new(),
            whitelist: HashSet::new(),
            recipients: HashMap::new(),
            points: HashMap::new(),
            balances: HashMap::new(),
            allowances: HashMap::new(),
            discount_base: U256::from(DEFAULT_DISCOUNT_BASE),
            fee_rule: FeeRule::Flat(U256::ZERO),
            roles: LedgerRoles::default(),
            offline: false,
            revert_next: None,
            pending_next: false,
            submitted: Vec::new(),
            receipts: HashMap::new(),
        }
    }
}

#[derive(Default)]
pub struct InMemoryLedger {
    state: Mutex<State>,
    latency: Option<Duration>,
    submit_latency: Option<Duration>,
}

async fn pause(latency: Option<Duration>) {
    if let Some(latency) = latency {
        tokio::time::sleep(latency).await;
    }
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every read by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Delay both `send` and `confirm` by `latency`.
    pub fn with_submit_latency(mut self, latency: Duration) -> Self {
        self.submit_latency = Some(latency);
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }


    async fn read<T, F>(&self, call: &'static str, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&State) -> T + Send,
    {
        pause(self.latency).await;
        let state = self.state();
        if state.offline {
            return Err(LedgerError::Transport {
                call,
                reason: "ledger offline".into(),
            });
        }
        Ok(f(&state))
    }

    pub fn set_nonce(&self, account: Address, nonce: U256) {
        self.state().nonces.insert(account, nonce);
    }

    pub fn set_promo_tier(&self, merchant: MerchantId, idx: U256, tier: PromoTier) {
        self.state().tiers.insert((merchant, idx), tier);
    }

    pub fn set_voucher(&self, id: U256, voucher: Voucher) {
        self.state().vouchers.insert(id, voucher);
    }

    pub fn mark_seq_used(&self, sender: Address, seq: U256) {
        self.state().used_seqs.insert((sender, seq));
    }

    pub fn whitelist_token(&self, token: Address) {
        self.state().whitelist.insert(token);
    }

    pub fn set_merchant_recipient(&self, merchant: MerchantId, recipient: Address) {
        self.state().recipients.insert(merchant, recipient);
    }

    pub fn set_point_balance(&self, merchant: MerchantId, account: Address, points: U256) {
        self.state().points.insert((merchant, account), points);
    }

    pub fn set_discount_base(&self, base: U256) {
        self.state().discount_base = base;
    }

    pub fn set_fee_rule(&self, rule: FeeRule) {
        self.state().fee_rule = rule;
    }

    pub fn set_roles(&self, roles: LedgerRoles) {
        self.state().roles = roles;
    }

    pub fn set_token_balance(&self, token: Address, owner: Address, amount: U256) {
        self.state().balances.insert((token, owner), amount);
    }

    pub fn set_token_allowance(&self, token: Address, owner: Address, spender: Address, amount: U256) {
        self.state().allowances.insert((token, owner, spender), amount);
    }

    /// Fail every read with a transport error while `offline` is set.
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// The next submission is broadcast but fails with `reason` once mined.
    pub fn revert_next_submission(&self, reason: impl Into<String>) {
        self.state().revert_next = Some(reason.into());
    }

    /// The next submission is broadcast but never mined.
    pub fn leave_next_pending(&self) {
        self.state().pending_next = true;
    }

    pub fn submitted(&self) -> Vec<ForwardRequest> {
        self.state().submitted.clone()
    }
}

#[async_trait]
impl LedgerReader for InMemoryLedger {
    async fn nonce_of(&self, account: Address) -> Result<U256, LedgerError> {
        self.read("getNonce", |s| s.nonces.get(&account).copied().unwrap_or_default())
            .await
    }

    async fn promo_tier(&self, merchant: MerchantId, idx: U256) -> Result<PromoTier, LedgerError> {
        self.read("getPromoTier", |s| s.tiers.get(&(merchant, idx)).cloned())
            .await?
            .ok_or_else(|| LedgerError::Reverted {
                call: "getPromoTier",
                reason: "tier not found".into(),
            })
    }

    async fn voucher(&self, id: U256) -> Result<Voucher, LedgerError> {
        self.read("getVoucher", |s| s.vouchers.get(&id).cloned().unwrap_or_default())
            .await
    }

    async fn is_seq_used(&self, sender: Address, seq: U256) -> Result<bool, LedgerError> {
        self.read("isSeqUsed", |s| s.used_seqs.contains(&(sender, seq))).await
    }

    async fn is_token_whitelisted(&self, token: Address) -> Result<bool, LedgerError> {
        self.read("isTokenWhitelisted", |s| s.whitelist.contains(&token)).await
    }

    async fn merchant_recipient(&self, merchant: MerchantId) -> Result<Address, LedgerError> {
        self.read("merchantRecipient", |s| {
            s.recipients.get(&merchant).copied().unwrap_or_default()
        })
        .await
    }

    async fn point_balance(&self, merchant: MerchantId, account: Address) -> Result<U256, LedgerError> {
        self.read("pointBalance", |s| {
            s.points.get(&(merchant, account)).copied().unwrap_or_default()
        })
        .await
    }

    async fn discount_base(&self) -> Result<U256, LedgerError> {
        self.read("DISCOUNT_BASE", |s| s.discount_base).await
    }

    async fn fee_for(
        &self,
        _merchant: MerchantId,
        _token: Address,
        amount: U256,
    ) -> Result<U256, LedgerError> {
        self.read("calculateFee", |s| s.fee_rule.apply(amount)).await
    }

    async fn roles(&self) -> Result<LedgerRoles, LedgerError> {
        self.read("roles", |s| s.roles).await
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, LedgerError> {
        self.read("balanceOf", |s| {
            s.balances.get(&(token, owner)).copied().unwrap_or_default()
        })
        .await
    }

    async fn token_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, LedgerError> {
        self.read("allowance", |s| {
            s.allowances
                .get(&(token, owner, spender))
                .copied()
                .unwrap_or_default()
        })
        .await
    }
}

#[async_trait]
impl LedgerWriter for InMemoryLedger {
    async fn send(&self, request: &ForwardRequest, _signature: &Bytes) -> Result<B256, LedgerError> {
        pause(self.submit_latency).await;
        let mut state = self.state();
        if state.offline {
            return Err(LedgerError::Transport {
                call: "execute",
                reason: "ledger offline".into(),
            });
        }

        let expected = state.nonces.get(&request.from).copied().unwrap_or_default();
        if request.nonce != expected {
            return Err(LedgerError::Reverted {
                call: "execute",
                reason: format!("forwarder: nonce {} expected {}", request.nonce, expected),
            });
        }

        let mut preimage = request.from.to_vec();
        preimage.extend_from_slice(&request.nonce.to_be_bytes::<32>());
        let tx_hash = keccak256(preimage);
        state.submitted.push(request.clone());

        if std::mem::take(&mut state.pending_next) {
            state.receipts.insert(tx_hash, None);
            return Ok(tx_hash);
        }

        // The forwarder bumps the nonce even when the inner call fails.
        state
            .nonces
            .insert(request.from, expected.saturating_add(U256::from(1u64)));
        if let Some(reason) = state.revert_next.take() {
            state
                .receipts
                .insert(tx_hash, Some(SubmissionStatus::Reverted { reason }));
            return Ok(tx_hash);
        }

        match decode_any(&request.data) {
            Ok(OperationCall::Payment(p)) => {
                state.used_seqs.insert((request.from, p.seq));
            }
            Ok(OperationCall::Consume(p)) => {
                state.used_seqs.insert((request.from, p.seq));
                if let Some(voucher) = state.vouchers.get_mut(&p.voucher_id) {
                    voucher.used = true;
                }
                if let Some(points) = state.points.get_mut(&(p.merchant_id, request.from)) {
                    *points = points.saturating_sub(p.point_to_use);
                }
            }
            _ => {}
        }
        state.receipts.insert(tx_hash, Some(SubmissionStatus::Confirmed));
        Ok(tx_hash)
    }

    async fn confirm(&self, tx_hash: B256) -> Result<SubmissionStatus, LedgerError> {
        pause(self.submit_latency).await;
        let receipt = self.state().receipts.get(&tx_hash).cloned();
        match receipt {
            Some(Some(status)) => Ok(status),
            Some(None) => std::future::pending().await,
            None => Err(LedgerError::Transport {
                call: "receipt",
                reason: format!("unknown transaction {tx_hash}"),
            }),
        }
    }
}
