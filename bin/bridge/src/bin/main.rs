//! Command line front end of the signing bridge.
//!
//! - `address`: log in and print the account address
//! - `send-transaction`: sign and broadcast a transaction from the account
//! - `rpc`: issue a single JSON-RPC call through the bridge
//! - `serve`: answer newline-delimited JSON-RPC on stdin/stdout

use account::Account;
use alloy_primitives::{Address, Bytes, TxKind, U256};
use alloy_rpc_types_eth::{TransactionInput, TransactionRequest};
use bridge::{config::Config, metrics::install_prometheus_exporter, serve, Connector};
use clap::{Parser, Subcommand};
use serde_json::Value;
use session::PemIdentityProvider;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::info;

#[derive(Parser)]
#[command(name = "bridge")]
#[command(about = "Ethereum JSON-RPC bridge for an Internet Computer signer canister")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// PEM identity file, overrides `session.identity_provider`
    #[arg(short, long, env = "BRIDGE_IDENTITY")]
    identity: Option<String>,

    /// Expose Prometheus metrics on this port
    #[arg(long)]
    metrics_port: Option<u16>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the account address
    Address,

    /// Sign and broadcast a transaction
    SendTransaction {
        #[arg(long)]
        to: Address,

        /// Amount in wei
        #[arg(long, default_value = "0")]
        value: U256,

        /// Calldata as hex
        #[arg(long)]
        data: Option<Bytes>,

        #[arg(long)]
        nonce: Option<u64>,

        /// Gas limit
        #[arg(long)]
        gas: Option<u64>,
    },

    /// Issue a single JSON-RPC call
    Rpc {
        method: String,

        /// Parameters as a JSON array
        #[arg(default_value = "[]")]
        params: String,
    },

    /// Serve newline-delimited JSON-RPC on stdin/stdout
    Serve,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // stdout is reserved for JSON-RPC responses and command output.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_file(&cli.config)?;
    if let Some(identity) = cli.identity {
        config.session.identity_provider = identity;
    }

    if let Some(port) = cli.metrics_port {
        install_prometheus_exporter(port)?;
        info!(port, "Metrics exporter listening");
    }

    let network = config.network_config();

    info!("Loaded config:");
    info!("  Network: {:?}", config.network);
    info!("  Chain ID: {}", network.ethereum.chain_id);
    info!("  RPC URL: {}", config.rpc_url);
    info!("  Replica: {}", network.internet_computer.url);
    info!("  Signer canister: {}", config.signer.canister_id);
    info!("  Message signing: {:?}", config.message_signing);

    let upstream = client::create_upstream(&config.rpc_url).await?;
    let signer = client::create_canister_connector(
        &network.internet_computer.url,
        &config.signer.canister_id,
        network.internet_computer.fetch_root_key,
    )?;
    let connector = Connector::new(
        upstream,
        Arc::new(signer),
        Arc::new(PemIdentityProvider::new()),
        config.settings(),
    );
    let _events = connector.spawn_event_logger();

    let activation = connector.activate().await?;

    match cli.command {
        Command::Address => {
            for account in &activation.accounts {
                println!("{account}");
            }
        }
        Command::SendTransaction {
            to,
            value,
            data,
            nonce,
            gas,
        } => {
            let request = TransactionRequest {
                to: Some(TxKind::Call(to)),
                value: Some(value),
                input: TransactionInput::new(data.unwrap_or_default()),
                nonce,
                gas,
                ..Default::default()
            };

            let submitted = connector.account().send_transaction(request).await?;
            info!(hash = %submitted.hash, nonce = submitted.nonce, "Transaction submitted");
            println!("{}", submitted.hash);
        }
        Command::Rpc { method, params } => {
            let params: Vec<Value> = serde_json::from_str(&params)?;
            let result = connector.send(&method, params).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Serve => {
            info!("Serving JSON-RPC on stdin");

            let reader = BufReader::new(tokio::io::stdin());
            tokio::select! {
                result = serve(&connector, reader, tokio::io::stdout()) => result?,
                _ = tokio::signal::ctrl_c() => info!("Interrupted"),
            }
        }
    }

    connector.deactivate().await?;
    Ok(())
}
