use core::{fmt, str::FromStr};

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::{merchant::MerchantId, ser::decimal_u256};

/// Closed set of vault operations a relayer accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Payment,
    Consume,
    Deposit,
    Withdraw,
}

impl OperationType {
    pub const ALL: [OperationType; 4] = [
        OperationType::Payment,
        OperationType::Consume,
        OperationType::Deposit,
        OperationType::Withdraw,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Payment => "payment",
            OperationType::Consume => "consume",
            OperationType::Deposit => "deposit",
            OperationType::Withdraw => "withdraw",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownOperation(pub String);

impl fmt::Display for UnknownOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown operation type `{}`", self.0)
    }
}

impl std::error::Error for UnknownOperation {}

impl FromStr for OperationType {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "payment" | "pay" => Ok(OperationType::Payment),
            "consume" => Ok(OperationType::Consume),
            "deposit" => Ok(OperationType::Deposit),
            "withdraw" => Ok(OperationType::Withdraw),
            _ => Err(UnknownOperation(s.to_string())),
        }
    }
}

/// `pay(token, to, amount, seq)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentParams {
    pub token: Address,
    pub to: Address,
    #[serde(with = "decimal_u256")]
    pub amount: U256,
    /// Caller-chosen sequence value; must be unique per sender.
    #[serde(with = "decimal_u256")]
    pub seq: U256,
}

/// `consume(merchantId, token, amount, voucherId, pointToUse, idx, seq, recipient)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumeParams {
    pub merchant_id: MerchantId,
    pub token: Address,
    #[serde(with = "decimal_u256")]
    pub amount: U256,
    /// Zero when no voucher is applied.
    #[serde(with = "decimal_u256")]
    pub voucher_id: U256,
    #[serde(with = "decimal_u256")]
    pub point_to_use: U256,
    /// Promo tier index; always explicit.
    #[serde(with = "decimal_u256")]
    pub idx: U256,
    #[serde(with = "decimal_u256")]
    pub seq: U256,
    /// Beneficiary of the voucher/point rewards.
    pub recipient: Address,
}

/// `deposit(merchantId, token, amount)` / `withdraw(merchantId, token, amount)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultTransferParams {
    pub merchant_id: MerchantId,
    pub token: Address,
    #[serde(with = "decimal_u256")]
    pub amount: U256,
}

/// A decoded (or to-be-encoded) vault call, tagged by operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "params", rename_all = "lowercase")]
pub enum OperationCall {
    Payment(PaymentParams),
    Consume(ConsumeParams),
    Deposit(VaultTransferParams),
    Withdraw(VaultTransferParams),
}

impl OperationCall {
    pub fn operation_type(&self) -> OperationType {
        match self {
            OperationCall::Payment(_) => OperationType::Payment,
            OperationCall::Consume(_) => OperationType::Consume,
            OperationCall::Deposit(_) => OperationType::Deposit,
            OperationCall::Withdraw(_) => OperationType::Withdraw,
        }
    }

    pub fn token(&self) -> Address {
        match self {
            OperationCall::Payment(p) => p.token,
            OperationCall::Consume(p) => p.token,
            OperationCall::Deposit(p) | OperationCall::Withdraw(p) => p.token,
        }
    }

    pub fn amount(&self) -> U256 {
        match self {
            OperationCall::Payment(p) => p.amount,
            OperationCall::Consume(p) => p.amount,
            OperationCall::Deposit(p) | OperationCall::Withdraw(p) => p.amount,
        }
    }
}
