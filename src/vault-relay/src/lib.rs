//! Vault meta-transaction engine.
//!
//! Signer side: encode a vault call, pull the forwarder nonce, and sign the
//! `ForwardRequest` typed-data digest. Relayer side: decode a signed envelope,
//! re-derive what the vault would compute, and only then spend gas on it.
//!
//! Every component receives a [`RelayContext`] by reference; none of them keeps
//! state between calls.

pub mod abi;
pub mod calldata;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod envelope;
pub mod errors;
pub mod ledger;
pub mod nonce;
pub mod signer;
pub mod typed_data;
pub mod utils;
pub mod validator;

pub use config::VaultConfig;
pub use context::{Clock, FixedClock, RelayContext, SystemClock};
pub use dispatcher::{DispatchResult, RelayerDispatcher, RequestState};
pub use envelope::{PrepareOptions, RequestEnvelope};
pub use errors::{DecodeError, LedgerError, NonceError, Precondition, RelayError, SignerError};
pub use ledger::{
    FeeRule, InMemoryLedger, LedgerReader, LedgerWriter, RpcLedger, SubmissionStatus,
};
pub use nonce::NonceSource;
pub use signer::{LocalKeySigner, RequestSigner};
pub use typed_data::{TypedDataCodec, Verification};
pub use validator::{EconomicValidator, ValidationResult};

pub use vault_relay_types as types;

#[cfg(test)]
mod test_support;
