use anyhow::{anyhow, Context, Result};
use clap::Parser;
use devnet_harness::config::{
    DEVNET_PORT, EXPECTED_NETWORK_ID, SEEDED_ACCOUNT_COUNT, STARTING_BALANCE_ETHER,
    TRANSFER_GAS_LIMIT,
};
use devnet_harness::{BalanceCheck, HarnessConfig, ProtocolSettings, VerificationProtocol};
use primitive_types::U256;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "devnet-harness",
    about = "Fund a fresh wallet on an ephemeral dev chain and send value back through a signing provider"
)]
struct Cli {
    /// Port for the ephemeral chain; 0 picks a free one.
    #[arg(long, default_value_t = DEVNET_PORT)]
    port: u16,
    /// Network id the chain is started with.
    #[arg(long, default_value_t = EXPECTED_NETWORK_ID)]
    network_id: u64,
    /// Network id the run insists on seeing.
    #[arg(long, default_value_t = EXPECTED_NETWORK_ID)]
    expected_network_id: u64,
    #[arg(long, default_value_t = SEEDED_ACCOUNT_COUNT)]
    accounts: usize,
    #[arg(long, default_value_t = STARTING_BALANCE_ETHER)]
    balance_ether: u64,
    /// Funding amount in wei (defaults to 1 ether).
    #[arg(long)]
    fund_wei: Option<String>,
    #[arg(long, default_value = "1")]
    return_wei: String,
    #[arg(long, default_value_t = TRANSFER_GAS_LIMIT)]
    gas_limit: u64,
    /// Reconcile final balances to the wei using receipt gas data.
    #[arg(long)]
    exact_balances: bool,
    #[arg(long)]
    quiet: bool,
}

fn parse_wei(text: &str, flag: &str) -> Result<U256> {
    U256::from_dec_str(text.trim())
        .map_err(|err| anyhow!("{flag} must be a decimal wei amount: {err:?}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let cli = Cli::parse();

    let mut protocol = ProtocolSettings {
        expected_network_id: cli.expected_network_id,
        return_wei: parse_wei(&cli.return_wei, "--return-wei")?,
        gas_limit: cli.gas_limit,
        console: !cli.quiet,
        ..ProtocolSettings::default()
    };
    if let Some(fund) = cli.fund_wei.as_deref() {
        protocol.fund_wei = parse_wei(fund, "--fund-wei")?;
    }
    if cli.exact_balances {
        protocol.balance_check = BalanceCheck::Exact;
    }
    let config = HarnessConfig {
        port: cli.port,
        network_id: cli.network_id,
        accounts: cli.accounts,
        balance_ether: cli.balance_ether,
        protocol,
    };

    let report = VerificationProtocol::new(config.protocol_settings())
        .run(config.chain_config())
        .await
        .context("verification run failed")?;
    info!(
        identity = %report.identity,
        fund = ?report.fund_receipt.transaction_hash,
        returned = ?report.return_receipt.transaction_hash,
        "verification complete"
    );
    Ok(())
}
