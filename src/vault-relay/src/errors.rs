use alloy_primitives::{Address, Selector, U256};
use thiserror::Error;
use vault_relay_types::{MerchantId, OperationType};

/// Call data does not match the declared operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("call data too short for a selector ({0} bytes)")]
    Truncated(usize),
    #[error("selector {found} does not match `{operation}` (expected {expected})")]
    SelectorMismatch {
        operation: OperationType,
        expected: Selector,
        found: Selector,
    },
    #[error("selector {0} is not a relayable vault operation")]
    UnknownSelector(Selector),
    #[error("malformed `{operation}` arguments: {reason}")]
    Malformed {
        operation: OperationType,
        reason: String,
    },
    #[error("request targets {found}, expected vault {expected}")]
    UnexpectedTarget { expected: Address, found: Address },
}

/// Errors from the external signing collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    #[error("no signing credential is connected")]
    Unavailable,
    #[error("signer {signer} cannot sign for {from}")]
    AddressMismatch { signer: Address, from: Address },
    #[error("invalid key material: {0}")]
    InvalidKey(String),
    #[error("signing failed: {0}")]
    Signing(String),
}

/// Errors during remote ledger access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("`{call}` timed out after {timeout_ms} ms")]
    Timeout { call: &'static str, timeout_ms: u64 },
    #[error("transport error during `{call}`: {reason}")]
    Transport { call: &'static str, reason: String },
    #[error("`{call}` reverted: {reason}")]
    Reverted { call: &'static str, reason: String },
    #[error("malformed return data from `{call}`")]
    MalformedReturn { call: &'static str },
    #[error("no relayer wallet configured for submission")]
    NotConfigured,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NonceError {
    #[error("nonce for {account} unavailable: {reason}")]
    Unavailable { account: Address, reason: LedgerError },
}

/// Structural and economic preconditions checked before a request is relayed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Precondition {
    #[error("amount must be greater than zero")]
    ZeroAmount,
    #[error("{0} must not be the zero address")]
    ZeroAddress(&'static str),
    #[error("merchant id must not be zero")]
    ZeroMerchant,
    #[error("vault calls carry no native value (got {0})")]
    UnexpectedValue(U256),
    #[error("token {0} is not whitelisted")]
    TokenNotWhitelisted(Address),
    #[error("merchant {0} has no recipient configured")]
    MerchantRecipientMissing(MerchantId),
    #[error("seq {seq} already used by {sender}")]
    SeqAlreadyUsed { sender: Address, seq: U256 },
    #[error("voucher {0} not found")]
    VoucherNotFound(U256),
    #[error("voucher {0} belongs to a different merchant or token")]
    VoucherMismatch(U256),
    #[error("voucher {0} already used")]
    VoucherUsed(U256),
    #[error("voucher {id} expired at {expire_at}")]
    VoucherExpired { id: U256, expire_at: u64 },
    #[error("promo tier {0} not found")]
    TierNotFound(U256),
    #[error("promo tier {0} is disabled")]
    TierDisabled(U256),
    #[error("amount {amount} below promo tier minimum {min_amount}")]
    BelowTierMinimum { amount: U256, min_amount: U256 },
    #[error("promo tier {idx} starts at {start_time}")]
    TierNotStarted { idx: U256, start_time: u64 },
    #[error("promo tier {idx} ended at {end_time}")]
    TierEnded { idx: U256, end_time: u64 },
    #[error("discount rate {rate} exceeds discount base {base}")]
    InvalidDiscountRate { rate: U256, base: U256 },
    #[error("arithmetic overflow computing {0}")]
    ArithmeticOverflow(&'static str),
    #[error("fee {fee} exceeds discounted amount {amount}")]
    FeeExceedsAmount { fee: U256, amount: U256 },
    #[error("{requested} points requested, {available} available")]
    InsufficientPoints { requested: U256, available: U256 },
    #[error("voucher and points ({credits}) exceed discounted amount {amount}")]
    CreditsExceedAmount { credits: U256, amount: U256 },
    #[error("token balance {available} below spend {required}")]
    InsufficientBalance { required: U256, available: U256 },
    #[error("vault allowance {available} below spend {required}")]
    InsufficientAllowance { required: U256, available: U256 },
}

/// Why a relay request was rejected or failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Signer(#[from] SignerError),
    #[error("request carries no signature")]
    MissingSignature,
    #[error("signature recovers to {recovered}, request claims {claimed}")]
    SignatureInvalid { claimed: Address, recovered: Address },
    #[error("deadline {deadline} reached (now {now})")]
    DeadlineExpired { deadline: u64, now: u64 },
    #[error("nonce {provided} is not the next nonce {expected} of {account}")]
    NonceMismatch {
        account: Address,
        provided: U256,
        expected: U256,
    },
    #[error(transparent)]
    NonceUnavailable(#[from] NonceError),
    #[error("precondition failed: {0}")]
    Precondition(#[from] Precondition),
    #[error("vault trusts forwarder {on_ledger}, configured {configured}")]
    ForwarderMismatch { configured: Address, on_ledger: Address },
    #[error("ledger reverted: {reason}")]
    LedgerRevert { reason: String },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
