use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use devnet_node::config::{derive_accounts, DEFAULT_CHAIN_ID, DEFAULT_NETWORK_ID};
use devnet_node::{ChainConfig, DevChain};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wallet::units::{format_ether, parse_ether};

#[derive(Parser, Debug)]
#[command(name = "devnet-node", about = "Ephemeral automining JSON-RPC dev chain")]
struct Cli {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    #[arg(long, short, default_value_t = 8545)]
    port: u16,
    #[arg(long, default_value_t = DEFAULT_NETWORK_ID)]
    network_id: u64,
    #[arg(long, default_value_t = DEFAULT_CHAIN_ID)]
    chain_id: u64,
    #[arg(long, default_value_t = 10)]
    accounts: usize,
    /// Starting balance per account in ether; decimals allowed.
    #[arg(long, default_value = "100")]
    balance_ether: String,
    #[arg(long, env = "DEVNET_ACCOUNT_SEED", default_value = "devnet")]
    seed: String,
    #[arg(long)]
    locked: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let cli = Cli::parse();
    let api_addr: SocketAddr = format!("{}:{}", cli.host, cli.port)
        .parse()
        .context("invalid listen address")?;
    let mut config = ChainConfig::default().with_api_addr(api_addr);
    config.network_id = cli.network_id;
    config.chain_id = cli.chain_id;
    config.locked = cli.locked;
    let balance = parse_ether(&cli.balance_ether).context("invalid --balance-ether")?;
    config.accounts = derive_accounts(&cli.seed, cli.accounts, balance);
    config.account_seed = cli.seed;

    println!("Available Accounts");
    println!("==================");
    for (index, (address, balance)) in config.seeded_accounts().iter().enumerate() {
        println!("({index}) {address} ({} ETH)", format_ether(*balance));
    }

    let handle = DevChain::start(config).context("failed to start dev chain")?;
    println!();
    println!("Listening on {}", handle.endpoint());
    signal::ctrl_c()
        .await
        .context("failed to install signal handler")?;
    info!("shutting down");
    handle.stop().await;
    Ok(())
}
