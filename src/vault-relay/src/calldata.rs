//! Vault call-data codec.
//!
//! Each relayable operation maps to one vault function. Decoding checks the declared
//! operation's selector first, then requires the exact static argument length, so
//! truncated or padded payloads never reach the ABI decoder.

use alloy_primitives::{Address, Bytes, Selector, U256};
use alloy_sol_types::SolCall;
use vault_relay_types::{
    ConsumeParams, MerchantId, OperationCall, OperationType, PaymentParams, VaultTransferParams,
};

use crate::{abi::IConsumeVault, errors::DecodeError};

pub fn selector(op: OperationType) -> Selector {
    let raw = match op {
        OperationType::Payment => IConsumeVault::payCall::SELECTOR,
        OperationType::Consume => IConsumeVault::consumeCall::SELECTOR,
        OperationType::Deposit => IConsumeVault::depositCall::SELECTOR,
        OperationType::Withdraw => IConsumeVault::withdrawCall::SELECTOR,
    };
    Selector::from(raw)
}

/// Number of 32-byte argument words; every argument is a static type.
fn arity(op: OperationType) -> usize {
    match op {
        OperationType::Payment => 4,
        OperationType::Consume => 8,
        OperationType::Deposit | OperationType::Withdraw => 3,
    }
}

pub fn encode_call(call: &OperationCall) -> Bytes {
    let encoded = match call {
        OperationCall::Payment(p) => IConsumeVault::payCall {
            token: p.token,
            to: p.to,
            amount: p.amount,
            seq: p.seq,
        }
        .abi_encode(),
        OperationCall::Consume(p) => IConsumeVault::consumeCall {
            merchantId: p.merchant_id.0,
            token: p.token,
            amount: p.amount,
            voucherId: p.voucher_id,
            pointToUse: p.point_to_use,
            idx: p.idx,
            seq: p.seq,
            recipient: p.recipient,
        }
        .abi_encode(),
        OperationCall::Deposit(p) => IConsumeVault::depositCall {
            merchantId: p.merchant_id.0,
            token: p.token,
            amount: p.amount,
        }
        .abi_encode(),
        OperationCall::Withdraw(p) => IConsumeVault::withdrawCall {
            merchantId: p.merchant_id.0,
            token: p.token,
            amount: p.amount,
        }
        .abi_encode(),
    };
    Bytes::from(encoded)
}

/// Decode `data` as a call of the declared operation `op`.
pub fn decode_call(op: OperationType, data: &[u8]) -> Result<OperationCall, DecodeError> {
    if data.len() < 4 {
        return Err(DecodeError::Truncated(data.len()));
    }
    let expected = selector(op);
    let found = Selector::from_slice(&data[..4]);
    if found != expected {
        return Err(DecodeError::SelectorMismatch {
            operation: op,
            expected,
            found,
        });
    }

    let args = &data[4..];
    let want = 32 * arity(op);
    if args.len() != want {
        return Err(DecodeError::Malformed {
            operation: op,
            reason: format!("expected {want} argument bytes, found {}", args.len()),
        });
    }

    let malformed = |e: alloy_sol_types::Error| DecodeError::Malformed {
        operation: op,
        reason: e.to_string(),
    };

    let call = match op {
        OperationType::Payment => {
            let c = IConsumeVault::payCall::abi_decode_raw(args, true).map_err(malformed)?;
            OperationCall::Payment(PaymentParams {
                token: c.token,
                to: c.to,
                amount: c.amount,
                seq: c.seq,
            })
        }
        OperationType::Consume => {
            let c = IConsumeVault::consumeCall::abi_decode_raw(args, true).map_err(malformed)?;
            OperationCall::Consume(ConsumeParams {
                merchant_id: MerchantId(c.merchantId),
                token: c.token,
                amount: c.amount,
                voucher_id: c.voucherId,
                point_to_use: c.pointToUse,
                idx: c.idx,
                seq: c.seq,
                recipient: c.recipient,
            })
        }
        OperationType::Deposit => {
            let c = IConsumeVault::depositCall::abi_decode_raw(args, true).map_err(malformed)?;
            OperationCall::Deposit(VaultTransferParams {
                merchant_id: MerchantId(c.merchantId),
                token: c.token,
                amount: c.amount,
            })
        }
        OperationType::Withdraw => {
            let c = IConsumeVault::withdrawCall::abi_decode_raw(args, true).map_err(malformed)?;
            OperationCall::Withdraw(VaultTransferParams {
                merchant_id: MerchantId(c.merchantId),
                token: c.token,
                amount: c.amount,
            })
        }
    };
    Ok(call)
}

/// Decode without a declared operation, picking it from the selector.
pub fn decode_any(data: &[u8]) -> Result<OperationCall, DecodeError> {
    if data.len() < 4 {
        return Err(DecodeError::Truncated(data.len()));
    }
    let found = Selector::from_slice(&data[..4]);
    let op = OperationType::ALL
        .into_iter()
        .find(|op| selector(*op) == found)
        .ok_or(DecodeError::UnknownSelector(found))?;
    decode_call(op, data)
}

/// Payment `seq` when the caller leaves it unspecified: the current unix time.
pub fn default_seq(now: u64) -> U256 {
    U256::from(now)
}

/// Build a payment call, defaulting `seq` to `now`.
pub fn payment(token: Address, to: Address, amount: U256, seq: Option<U256>, now: u64) -> OperationCall {
    OperationCall::Payment(PaymentParams {
        token,
        to,
        amount,
        seq: seq.unwrap_or_else(|| default_seq(now)),
    })
}
