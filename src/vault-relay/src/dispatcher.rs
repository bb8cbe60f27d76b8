//! Relayer side: decode a signed envelope, re-validate it, and only then submit.
//!
//! State flow:
//! - `Received -> Decoded -> Validated -> Submitted -> Confirmed | Reverted`
//! - `Received | Decoded -> Rejected` when decoding or validation fails
//! - `Failed` when the ledger cannot be reached before a transaction exists
//!
//! Broadcast and confirmation are bounded separately. Once the ledger has returned a
//! transaction hash the result always carries it, and a receipt that cannot be
//! obtained leaves the request `Submitted`.
//!
//! Nothing is retried here; the caller decides whether to resend.

use alloy_primitives::{B256, U256};
use serde::Serialize;
use tracing::Instrument;
use vault_relay_types::{ForwardRequest, OperationCall, OperationType, RelayedRequestData};

use crate::{
    calldata::decode_call,
    context::RelayContext,
    errors::{DecodeError, LedgerError, Precondition, RelayError},
    ledger::{bounded, LedgerReader, LedgerWriter, SubmissionStatus},
    nonce::NonceSource,
    validator::{EconomicValidator, ValidationResult},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestState {
    Received,
    Decoded,
    Validated,
    /// Broadcast; no receipt within the confirmation window.
    Submitted,
    Confirmed,
    Reverted,
    Rejected,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResult {
    pub success: bool,
    pub state: RequestState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationResult>,
    #[serde(skip)]
    pub failure: Option<RelayError>,
}

impl DispatchResult {
    fn halted(state: RequestState, failure: RelayError, validation: Option<ValidationResult>) -> Self {
        tracing::warn!(?state, error = %failure, "relay halted");
        Self {
            success: false,
            state,
            tx_hash: None,
            error: Some(failure.to_string()),
            validation,
            failure: Some(failure),
        }
    }

    /// Infrastructure failures are `Failed`; everything else is a rejection.
    fn refused(failure: RelayError, validation: Option<ValidationResult>) -> Self {
        let state = match failure {
            RelayError::Ledger(_) | RelayError::NonceUnavailable(_) => RequestState::Failed,
            _ => RequestState::Rejected,
        };
        Self::halted(state, failure, validation)
    }
}

pub struct RelayerDispatcher<'a, L> {
    ctx: &'a RelayContext<L>,
}

impl<'a, L: LedgerReader> RelayerDispatcher<'a, L> {
    pub fn new(ctx: &'a RelayContext<L>) -> Self {
        Self { ctx }
    }

    /// Check the target and decode the call data as the declared operation.
    pub fn decode(&self, op: OperationType, request: &ForwardRequest) -> Result<OperationCall, DecodeError> {
        let vault = self.ctx.config.vault;
        if request.to != vault {
            return Err(DecodeError::UnexpectedTarget {
                expected: vault,
                found: request.to,
            });
        }
        decode_call(op, &request.data)
    }

    /// Envelope checks, then the operation's own preconditions.
    ///
    /// The deadline is checked before the signature, so an expired request is
    /// reported as expired whatever it carries.
    pub async fn validate(
        &self,
        envelope: &RelayedRequestData,
        call: &OperationCall,
    ) -> Result<ValidationResult, RelayError> {
        let ctx = self.ctx;
        let request = &envelope.request;

        let now = ctx.now();
        if request.is_expired(now) {
            return Err(RelayError::DeadlineExpired {
                deadline: request.deadline,
                now,
            });
        }

        let signature = envelope.signature.as_ref().ok_or(RelayError::MissingSignature)?;
        let check = ctx
            .codec()
            .verify(ctx.config.chain_id, request, signature, request.from);
        if !check.valid {
            return Err(RelayError::SignatureInvalid {
                claimed: request.from,
                recovered: check.signer,
            });
        }

        if request.value != U256::ZERO {
            return Err(Precondition::UnexpectedValue(request.value).into());
        }

        let expected = NonceSource::from_context(ctx)
            .get_nonce(request.from, None)
            .await?;
        if request.nonce != expected {
            return Err(RelayError::NonceMismatch {
                account: request.from,
                provided: request.nonce,
                expected,
            });
        }

        Ok(EconomicValidator::new(ctx).validate(request.from, call).await?)
    }
}

impl<'a, L: LedgerReader + LedgerWriter> RelayerDispatcher<'a, L> {
    /// Decode, validate and, if everything passes, submit `envelope`.
    pub async fn dispatch(&self, op: OperationType, envelope: &RelayedRequestData) -> DispatchResult {
        let request = &envelope.request;
        let span = tracing::info_span!(
            "dispatch",
            operation = %op,
            from = %request.from,
            nonce = %request.nonce
        );
        self.run(op, envelope).instrument(span).await
    }

    async fn run(&self, op: OperationType, envelope: &RelayedRequestData) -> DispatchResult {
        let request = &envelope.request;
        tracing::debug!(state = ?RequestState::Received);

        let call = match self.decode(op, request) {
            Ok(call) => call,
            Err(e) => return DispatchResult::refused(e.into(), None),
        };
        tracing::debug!(state = ?RequestState::Decoded);

        let validation = match self.validate(envelope, &call).await {
            Ok(v) if v.success => v,
            Ok(v) => {
                tracing::warn!(state = ?RequestState::Rejected, error = ?v.error, "relay halted");
                return DispatchResult {
                    success: false,
                    state: RequestState::Rejected,
                    tx_hash: None,
                    error: v.error.clone(),
                    failure: v.rejection.clone().map(RelayError::Precondition),
                    validation: Some(v),
                };
            }
            Err(e) => return DispatchResult::refused(e, None),
        };
        tracing::debug!(state = ?RequestState::Validated);

        let Some(signature) = envelope.signature.as_ref() else {
            return DispatchResult::refused(RelayError::MissingSignature, Some(validation));
        };

        let config = &self.ctx.config;
        let ledger = &self.ctx.ledger;
        let tx_hash = match bounded("execute", config.submit_timeout(), ledger.send(request, signature)).await {
            Ok(tx_hash) => tx_hash,
            Err(LedgerError::Reverted { reason, .. }) => {
                return DispatchResult::halted(
                    RequestState::Reverted,
                    RelayError::LedgerRevert { reason },
                    Some(validation),
                )
            }
            Err(e) => return DispatchResult::halted(RequestState::Failed, e.into(), Some(validation)),
        };
        tracing::debug!(%tx_hash, state = ?RequestState::Submitted);

        // From here on the transaction exists; the hash is always reported.
        let (status, unconfirmed) =
            match bounded("receipt", config.confirmation_timeout(), ledger.confirm(tx_hash)).await {
                Ok(status) => (status, None),
                Err(LedgerError::Reverted { reason, .. }) => (SubmissionStatus::Reverted { reason }, None),
                Err(e) => (SubmissionStatus::Pending, Some(e)),
            };

        match status {
            SubmissionStatus::Reverted { reason } => {
                let mut result = DispatchResult::halted(
                    RequestState::Reverted,
                    RelayError::LedgerRevert { reason },
                    Some(validation),
                );
                result.tx_hash = Some(tx_hash);
                result
            }
            SubmissionStatus::Confirmed | SubmissionStatus::Pending => {
                let state = if status == SubmissionStatus::Confirmed {
                    RequestState::Confirmed
                } else {
                    RequestState::Submitted
                };
                match &unconfirmed {
                    Some(e) => tracing::warn!(%tx_hash, ?state, error = %e, "relay submitted, receipt unavailable"),
                    None => tracing::info!(%tx_hash, ?state, "relay submitted"),
                }
                DispatchResult {
                    success: true,
                    state,
                    tx_hash: Some(tx_hash),
                    error: unconfirmed.as_ref().map(ToString::to_string),
                    validation: Some(validation),
                    failure: unconfirmed.map(RelayError::Ledger),
                }
            }
        }
    }
}
