//! Building the canonical relayed-request envelope.
//!
//! `prepare` resolves every field, nonce included, before anything is signed; `sign`
//! then borrows the caller's signer for one digest and attaches the signature.

use std::time::Duration;

use alloy_primitives::{Address, U256};
use vault_relay_types::{ForwardRequest, OperationCall, RelayedRequestData};

use crate::{
    calldata::encode_call,
    context::RelayContext,
    errors::{RelayError, SignerError},
    ledger::LedgerReader,
    nonce::NonceSource,
    signer::RequestSigner,
};

/// Per-request overrides; unset fields fall back to the configuration.
#[derive(Clone, Copy, Debug, Default)]
pub struct PrepareOptions {
    pub gas: Option<U256>,
    /// Absolute unix deadline.
    pub deadline: Option<u64>,
    pub nonce_timeout: Option<Duration>,
}

pub struct RequestEnvelope<'a, L> {
    ctx: &'a RelayContext<L>,
}

impl<'a, L: LedgerReader> RequestEnvelope<'a, L> {
    pub fn new(ctx: &'a RelayContext<L>) -> Self {
        Self { ctx }
    }

    /// Encode `call` and fill an unsigned request from `from` to the vault.
    pub async fn prepare(
        &self,
        from: Address,
        call: &OperationCall,
        options: PrepareOptions,
    ) -> Result<ForwardRequest, RelayError> {
        let config = &self.ctx.config;
        let nonce = NonceSource::from_context(self.ctx)
            .get_nonce(from, options.nonce_timeout)
            .await?;

        let request = ForwardRequest {
            from,
            to: config.vault,
            value: U256::ZERO,
            gas: options.gas.unwrap_or_else(|| U256::from(config.default_gas)),
            nonce,
            deadline: options
                .deadline
                .unwrap_or_else(|| self.ctx.now().saturating_add(config.request_ttl_secs)),
            data: encode_call(call),
        };
        tracing::debug!(
            operation = %call.operation_type(),
            %from,
            %nonce,
            deadline = request.deadline,
            "request prepared"
        );
        Ok(request)
    }

    /// Sign a fully prepared request. `signer` must control `request.from`.
    pub async fn sign(
        &self,
        request: ForwardRequest,
        signer: Option<&dyn RequestSigner>,
    ) -> Result<RelayedRequestData, SignerError> {
        let signer = signer.ok_or(SignerError::Unavailable)?;
        if signer.address() != request.from {
            return Err(SignerError::AddressMismatch {
                signer: signer.address(),
                from: request.from,
            });
        }
        let signature = self
            .ctx
            .codec()
            .sign(&request, self.ctx.config.chain_id, signer)
            .await?;
        Ok(RelayedRequestData::signed(request, signature))
    }

    /// `prepare` then `sign` with the signer's own address as `from`.
    pub async fn build(
        &self,
        call: &OperationCall,
        options: PrepareOptions,
        signer: &dyn RequestSigner,
    ) -> Result<RelayedRequestData, RelayError> {
        let request = self.prepare(signer.address(), call, options).await?;
        Ok(self.sign(request, Some(signer)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        context::FixedClock,
        errors::NonceError,
        ledger::InMemoryLedger,
        signer::LocalKeySigner,
        test_support::{config, consume_params, hardhat_signer, CHAIN_ID, NOW, VAULT},
    };

    fn context() -> RelayContext<InMemoryLedger> {
        RelayContext::new(config(), InMemoryLedger::new()).with_clock(FixedClock(NOW))
    }

    #[tokio::test]
    async fn prepare_fills_defaults() {
        let ctx = context();
        let signer = hardhat_signer();
        ctx.ledger.set_nonce(signer.address(), U256::from(7u64));
        let call = OperationCall::Consume(consume_params(100, 0));

        let request = RequestEnvelope::new(&ctx)
            .prepare(signer.address(), &call, PrepareOptions::default())
            .await
            .unwrap();

        assert_eq!(request.to, VAULT);
        assert_eq!(request.value, U256::ZERO);
        assert_eq!(request.gas, U256::from(500_000u64));
        assert_eq!(request.nonce, U256::from(7u64));
        assert_eq!(request.deadline, NOW + 3_600);
        assert_eq!(request.data, encode_call(&call));
    }

    #[tokio::test]
    async fn signed_envelope_verifies() {
        let ctx = context();
        let signer = hardhat_signer();
        let call = OperationCall::Consume(consume_params(100, 0));
        let options = PrepareOptions {
            gas: Some(U256::from(90_000u64)),
            deadline: Some(NOW + 60),
            nonce_timeout: None,
        };

        let envelope = RequestEnvelope::new(&ctx).build(&call, options, &signer).await.unwrap();
        let signature = envelope.signature.clone().unwrap();
        assert_eq!(signature.len(), 65);
        assert!(signature[64] == 27 || signature[64] == 28);
        assert_eq!(envelope.request.gas, U256::from(90_000u64));

        let check = ctx
            .codec()
            .verify(CHAIN_ID, &envelope.request, &signature, signer.address());
        assert!(check.valid);
    }

    #[tokio::test]
    async fn signing_requires_matching_credential() {
        let ctx = context();
        let signer = hardhat_signer();
        let other = LocalKeySigner::from_hex(
            "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d",
        )
        .unwrap();
        let envelope = RequestEnvelope::new(&ctx);
        let request = envelope
            .prepare(
                signer.address(),
                &OperationCall::Consume(consume_params(100, 0)),
                PrepareOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(
            envelope.sign(request.clone(), None).await.unwrap_err(),
            SignerError::Unavailable
        );
        assert_eq!(
            envelope.sign(request.clone(), Some(&other)).await.unwrap_err(),
            SignerError::AddressMismatch {
                signer: other.address(),
                from: signer.address(),
            }
        );
    }

    #[tokio::test]
    async fn unavailable_nonce_stops_before_signing() {
        let ctx = context();
        ctx.ledger.set_offline(true);
        let signer = hardhat_signer();

        let err = RequestEnvelope::new(&ctx)
            .build(
                &OperationCall::Consume(consume_params(100, 0)),
                PrepareOptions::default(),
                &signer,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RelayError::NonceUnavailable(NonceError::Unavailable { .. })
        ));
    }
}
