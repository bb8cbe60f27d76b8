//! Shared types for vault meta-transactions: forward requests, relayed envelopes,
//! operation call records, merchant ids, and ledger snapshots.

pub mod ledger;
pub mod merchant;
pub mod operation;
pub mod request;
pub mod ser;

pub use ledger::{LedgerRoles, PromoTier, TierWindow, Voucher};
pub use merchant::MerchantId;
pub use operation::{
    ConsumeParams, OperationCall, OperationType, PaymentParams, UnknownOperation,
    VaultTransferParams,
};
pub use request::{ForwardRequest, RelayedRequestData};
