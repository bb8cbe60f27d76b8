//! JSON-RPC ledger backed by an `ethers` HTTP provider.
//!
//! Reads are `eth_call`s encoded with the `sol!` bindings in [`crate::abi`]. Submission
//! goes through a relayer wallet: `execute` is simulated first so forwarder-level
//! failures surface with their revert reason before any gas is spent.
//!
//! The forwarder reports a failed inner call through its return value instead of
//! reverting, so a mined receipt with status 1 is not enough to call a request
//! confirmed; see [`mined_status`].

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{decode_revert_reason, SolCall};
use async_trait::async_trait;
use ethers::{
    middleware::SignerMiddleware,
    providers::{Http, JsonRpcError, Middleware, MiddlewareError, PendingTransaction, Provider},
    signers::{LocalWallet, Signer},
    types::{
        transaction::eip2718::TypedTransaction, TransactionReceipt, TransactionRequest, H160, H256,
        U64,
    },
};
use vault_relay_types::{ForwardRequest, LedgerRoles, MerchantId, PromoTier, Voucher};

use super::{LedgerReader, LedgerWriter, SubmissionStatus};
use crate::{
    abi::{self, IConsumeVault, IFeeRuleProvider, ITrustedForwarder, IERC20},
    config::VaultConfig,
    errors::LedgerError,
};

type Relayer = SignerMiddleware<Provider<Http>, LocalWallet>;

pub struct RpcLedger {
    provider: Provider<Http>,
    relayer: Option<Relayer>,
    chain_id: u64,
    vault: Address,
    forwarder: Address,
}

impl RpcLedger {
    /// Read-only connection; call [`RpcLedger::with_relayer`] before submitting.
    pub fn connect(config: &VaultConfig) -> Result<Self, LedgerError> {
        let provider =
            Provider::<Http>::try_from(config.rpc_url.as_str()).map_err(|e| LedgerError::Transport {
                call: "connect",
                reason: e.to_string(),
            })?;
        Ok(Self {
            provider,
            relayer: None,
            chain_id: config.chain_id,
            vault: config.vault,
            forwarder: config.forwarder,
        })
    }

    /// Attach the gas-paying relayer wallet.
    pub fn with_relayer(mut self, wallet: LocalWallet) -> Self {
        let wallet = wallet.with_chain_id(self.chain_id);
        self.relayer = Some(SignerMiddleware::new(self.provider.clone(), wallet));
        self
    }

    pub fn relayer_address(&self) -> Option<Address> {
        self.relayer
            .as_ref()
            .map(|r| Address::from_slice(r.address().as_bytes()))
    }

    async fn call<C: SolCall>(
        &self,
        name: &'static str,
        target: Address,
        call: C,
    ) -> Result<C::Return, LedgerError> {
        let tx: TypedTransaction = TransactionRequest::new()
            .to(h160(target))
            .data(call.abi_encode())
            .into();
        let out = self
            .provider
            .call(&tx, None)
            .await
            .map_err(|e| rpc_error(name, e))?;
        C::abi_decode_returns(&out, true).map_err(|_| LedgerError::MalformedReturn { call: name })
    }
}

fn h160(address: Address) -> H160 {
    H160::from_slice(address.as_slice())
}

fn rpc_error<E: MiddlewareError>(call: &'static str, err: E) -> LedgerError {
    classify(call, err.as_error_response(), err.to_string())
}

/// Reverts carry their decoded reason, or the node's message when it has no data.
/// Everything else is transport.
fn classify(call: &'static str, response: Option<&JsonRpcError>, fallback: String) -> LedgerError {
    if let Some(response) = response {
        if let Some(reason) = revert_reason(response) {
            return LedgerError::Reverted { call, reason };
        }
        if response.message.contains("revert") {
            return LedgerError::Reverted {
                call,
                reason: response.message.clone(),
            };
        }
    }
    LedgerError::Transport {
        call,
        reason: fallback,
    }
}

fn revert_reason(response: &JsonRpcError) -> Option<String> {
    let data = response.data.as_ref()?.as_str()?;
    let raw = hex::decode(data.trim_start_matches("0x")).ok()?;
    decode_revert_reason(&raw)
}

fn inner_failure(data: &[u8]) -> String {
    decode_revert_reason(data).unwrap_or_else(|| "inner call failed".to_string())
}

/// Decode a simulated `execute` return; `(false, data)` is a revert of the inner call.
fn simulated_outcome(returned: &[u8]) -> Result<(), LedgerError> {
    let outcome = ITrustedForwarder::executeCall::abi_decode_returns(returned, true)
        .map_err(|_| LedgerError::MalformedReturn { call: "execute" })?;
    if outcome._0 {
        Ok(())
    } else {
        Err(LedgerError::Reverted {
            call: "execute",
            reason: inner_failure(&outcome._1),
        })
    }
}

/// Map a mined `execute` receipt to the outcome of the forwarded call.
///
/// Every vault operation moves tokens, so a call that took effect leaves logs from
/// contracts other than the forwarder. A failed inner call is rolled back together
/// with its logs while the outer transaction still succeeds.
fn mined_status(receipt: &TransactionReceipt, forwarder: Address) -> SubmissionStatus {
    if matches!(receipt.status, Some(status) if status != U64::from(1u64)) {
        return SubmissionStatus::Reverted {
            reason: "execute reverted on-chain".into(),
        };
    }
    let forwarder = h160(forwarder);
    if receipt.logs.iter().any(|log| log.address != forwarder) {
        SubmissionStatus::Confirmed
    } else {
        SubmissionStatus::Reverted {
            reason: "inner call failed after broadcast".into(),
        }
    }
}

#[async_trait]
impl LedgerReader for RpcLedger {
    async fn nonce_of(&self, account: Address) -> Result<U256, LedgerError> {
        let ret = self
            .call(
                "getNonce",
                self.forwarder,
                ITrustedForwarder::getNonceCall { from: account },
            )
            .await?;
        Ok(ret._0)
    }

    async fn promo_tier(&self, merchant: MerchantId, idx: U256) -> Result<PromoTier, LedgerError> {
        let ret = self
            .call(
                "getPromoTier",
                self.vault,
                IConsumeVault::getPromoTierCall {
                    merchantId: merchant.0,
                    idx,
                },
            )
            .await?;
        Ok(ret._0.into())
    }

    async fn voucher(&self, id: U256) -> Result<Voucher, LedgerError> {
        let ret = self
            .call(
                "getVoucher",
                self.vault,
                IConsumeVault::getVoucherCall { voucherId: id },
            )
            .await?;
        Ok(ret._0.into())
    }

    async fn is_seq_used(&self, sender: Address, seq: U256) -> Result<bool, LedgerError> {
        let ret = self
            .call(
                "isSeqUsed",
                self.vault,
                IConsumeVault::isSeqUsedCall { sender, seq },
            )
            .await?;
        Ok(ret._0)
    }

    async fn is_token_whitelisted(&self, token: Address) -> Result<bool, LedgerError> {
        let ret = self
            .call(
                "isTokenWhitelisted",
                self.vault,
                IConsumeVault::isTokenWhitelistedCall { token },
            )
            .await?;
        Ok(ret._0)
    }

    async fn merchant_recipient(&self, merchant: MerchantId) -> Result<Address, LedgerError> {
        let ret = self
            .call(
                "merchantRecipient",
                self.vault,
                IConsumeVault::merchantRecipientCall {
                    merchantId: merchant.0,
                },
            )
            .await?;
        Ok(ret._0)
    }

    async fn point_balance(&self, merchant: MerchantId, account: Address) -> Result<U256, LedgerError> {
        let ret = self
            .call(
                "pointBalance",
                self.vault,
                IConsumeVault::pointBalanceCall {
                    merchantId: merchant.0,
                    account,
                },
            )
            .await?;
        Ok(ret._0)
    }

    async fn discount_base(&self) -> Result<U256, LedgerError> {
        let ret = self
            .call("DISCOUNT_BASE", self.vault, IConsumeVault::DISCOUNT_BASECall {})
            .await?;
        Ok(ret._0)
    }

    async fn fee_for(
        &self,
        merchant: MerchantId,
        token: Address,
        amount: U256,
    ) -> Result<U256, LedgerError> {
        // The provider address is owner-settable, so it is re-read every time.
        let provider = self
            .call(
                "getFeeRuleProvider",
                self.vault,
                IConsumeVault::getFeeRuleProviderCall {},
            )
            .await?
            ._0;
        let ret = self
            .call(
                "calculateFee",
                provider,
                IFeeRuleProvider::calculateFeeCall {
                    merchantId: merchant.0,
                    token,
                    amount,
                },
            )
            .await?;
        Ok(ret._0)
    }

    async fn roles(&self) -> Result<LedgerRoles, LedgerError> {
        let owner = self
            .call("getOwner", self.vault, IConsumeVault::getOwnerCall {})
            .await?
            ._0;
        let fee_receiver = self
            .call("getFeeReceiver", self.vault, IConsumeVault::getFeeReceiverCall {})
            .await?
            ._0;
        let fee_rule_provider = self
            .call(
                "getFeeRuleProvider",
                self.vault,
                IConsumeVault::getFeeRuleProviderCall {},
            )
            .await?
            ._0;
        let trusted_forwarder = self
            .call(
                "getTrustedForwarder",
                self.vault,
                IConsumeVault::getTrustedForwarderCall {},
            )
            .await?
            ._0;
        Ok(LedgerRoles {
            owner,
            fee_receiver,
            fee_rule_provider,
            trusted_forwarder,
        })
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, LedgerError> {
        let ret = self
            .call("balanceOf", token, IERC20::balanceOfCall { owner })
            .await?;
        Ok(ret._0)
    }

    async fn token_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, LedgerError> {
        let ret = self
            .call("allowance", token, IERC20::allowanceCall { owner, spender })
            .await?;
        Ok(ret._0)
    }
}

#[async_trait]
impl LedgerWriter for RpcLedger {
    async fn send(&self, request: &ForwardRequest, signature: &Bytes) -> Result<B256, LedgerError> {
        let relayer = self.relayer.as_ref().ok_or(LedgerError::NotConfigured)?;

        let call = ITrustedForwarder::executeCall {
            req: abi::ForwardRequest::from(request),
            signature: signature.clone(),
        };
        let tx: TypedTransaction = TransactionRequest::new()
            .from(relayer.address())
            .to(h160(self.forwarder))
            .data(call.abi_encode())
            .into();

        let simulated = relayer
            .call(&tx, None)
            .await
            .map_err(|e| rpc_error("execute", e))?;
        simulated_outcome(&simulated)?;

        let pending = relayer
            .send_transaction(tx, None)
            .await
            .map_err(|e| rpc_error("execute", e))?;
        let tx_hash = B256::from(pending.tx_hash().0);
        tracing::info!(%tx_hash, from = %request.from, nonce = %request.nonce, "execute sent");
        Ok(tx_hash)
    }

    async fn confirm(&self, tx_hash: B256) -> Result<SubmissionStatus, LedgerError> {
        let receipt = PendingTransaction::new(H256::from(tx_hash.0), &self.provider)
            .await
            .map_err(|e| LedgerError::Transport {
                call: "receipt",
                reason: e.to_string(),
            })?;
        match receipt {
            Some(receipt) => Ok(mined_status(&receipt, self.forwarder)),
            None => {
                tracing::warn!(%tx_hash, "transaction dropped from the mempool");
                Ok(SubmissionStatus::Pending)
            }
        }
    }
}
