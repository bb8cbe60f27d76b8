use std::{
    fs,
    path::{Path, PathBuf},
};

use alloy_primitives::U256;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ethers::signers::LocalWallet;
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use vault_relay::{
    LocalKeySigner, PrepareOptions, RelayContext, RelayerDispatcher, RequestEnvelope, RpcLedger,
    VaultConfig,
};
use vault_relay_types::{MerchantId, OperationCall, OperationType, RelayedRequestData};

/// Sign, check and relay consume-vault meta-transactions.
///
/// Deployment settings come from `vault-relay.toml` (or `--config`), overridden by
/// `VAULT_RELAY_*` environment variables; a `.env` file is loaded first.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Configuration file (TOML, JSON or YAML).
    #[arg(long, global = true, env = "VAULT_RELAY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the 32-byte merchant id for a name or a `0x`-prefixed id.
    MerchantId { input: String },

    /// Prepare a vault call, fetch the signer's nonce and sign it.
    ///
    /// The call file holds `{"operation": "...", "params": {...}}`.
    Sign {
        #[arg(long)]
        call: PathBuf,

        /// Private key of the request signer (hex, 0x...).
        #[arg(long, env = "SIGNER_KEY", hide_env_values = true)]
        signer_key: String,

        #[arg(long)]
        gas: Option<u64>,

        /// Absolute unix deadline; defaults to now + `request_ttl_secs`.
        #[arg(long)]
        deadline: Option<u64>,

        /// Write the envelope here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Recover the signer of an envelope and compare it with `from`.
    Verify {
        #[arg(long)]
        envelope: PathBuf,
    },

    /// Decode and validate an envelope against the live ledger without submitting.
    Validate {
        #[arg(long)]
        operation: OperationType,

        #[arg(long)]
        envelope: PathBuf,
    },

    /// Decode, validate and submit an envelope through the forwarder.
    Relay {
        #[arg(long)]
        operation: OperationType,

        #[arg(long)]
        envelope: PathBuf,

        /// Private key of the gas-paying relayer (hex, 0x...).
        #[arg(long, env = "RELAYER_KEY", hide_env_values = true)]
        relayer_key: String,
    },

    /// Read the vault's roles and check it trusts the configured forwarder.
    Preflight,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    run(Cli::parse()).await
}

/// Load the configuration and open a read-only ledger connection.
fn connect(path: Option<&Path>) -> Result<(VaultConfig, RpcLedger)> {
    let config = VaultConfig::load(path).context("failed to load configuration")?;
    tracing::info!(chain_id = config.chain_id, vault = %config.vault, rpc = %config.rpc_url, "configuration loaded");
    let ledger = RpcLedger::connect(&config).context("failed to connect to the RPC endpoint")?;
    Ok((config, ledger))
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::MerchantId { input } => {
            println!("{}", MerchantId::parse(&input));
            Ok(())
        }
        Command::Sign {
            call,
            signer_key,
            gas,
            deadline,
            out,
        } => {
            let (config, ledger) = connect(config_path.as_deref())?;
            let ctx = RelayContext::new(config, ledger);
            let call: OperationCall = read_json(&call)?;
            let signer = LocalKeySigner::from_hex(&signer_key).context("invalid signer key")?;
            let options = PrepareOptions {
                gas: gas.map(U256::from),
                deadline,
                nonce_timeout: None,
            };
            let envelope = RequestEnvelope::new(&ctx)
                .build(&call, options, &signer)
                .await
                .context("failed to build signed request")?;

            let json = serde_json::to_string_pretty(&envelope)?;
            match out {
                Some(path) => {
                    fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Signed `{}` request written to {}", call.operation_type(), path.display());
                }
                None => println!("{json}"),
            }
            Ok(())
        }
        Command::Verify { envelope } => {
            let (config, ledger) = connect(config_path.as_deref())?;
            let ctx = RelayContext::new(config, ledger);
            let envelope: RelayedRequestData = read_json(&envelope)?;
            let Some(signature) = envelope.signature.as_ref() else {
                bail!("envelope carries no signature");
            };
            let check = ctx.codec().verify(
                ctx.config.chain_id,
                &envelope.request,
                signature,
                envelope.request.from,
            );
            print_json(&check)?;
            if !check.valid {
                bail!("signature does not recover to {}", envelope.request.from);
            }
            Ok(())
        }
        Command::Validate { operation, envelope } => {
            let (config, ledger) = connect(config_path.as_deref())?;
            let ctx = RelayContext::new(config, ledger);
            let envelope: RelayedRequestData = read_json(&envelope)?;
            let dispatcher = RelayerDispatcher::new(&ctx);
            let call = dispatcher.decode(operation, &envelope.request)?;
            let validation = dispatcher.validate(&envelope, &call).await?;
            print_json(&serde_json::json!({ "call": call, "validation": validation }))?;
            if !validation.success {
                bail!("request would be rejected");
            }
            Ok(())
        }
        Command::Relay {
            operation,
            envelope,
            relayer_key,
        } => {
            let wallet: LocalWallet = relayer_key
                .trim()
                .trim_start_matches("0x")
                .parse()
                .context("invalid relayer key")?;
            let (config, ledger) = connect(config_path.as_deref())?;
            let ctx = RelayContext::new(config, ledger.with_relayer(wallet));
            let envelope: RelayedRequestData = read_json(&envelope)?;
            let result = RelayerDispatcher::new(&ctx).dispatch(operation, &envelope).await;
            print_json(&result)?;
            if !result.success {
                bail!("relay ended in state {:?}", result.state);
            }
            Ok(())
        }
        Command::Preflight => {
            let (config, ledger) = connect(config_path.as_deref())?;
            let ctx = RelayContext::new(config, ledger);
            let roles = ctx.preflight().await?;
            print_json(&roles)?;
            Ok(())
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
