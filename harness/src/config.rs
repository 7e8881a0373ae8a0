use std::net::SocketAddr;
use std::time::Duration;

use devnet_node::ChainConfig;
use primitive_types::U256;
use wallet::rpc::DEFAULT_POLL_INTERVAL;
use wallet::transaction::TRANSFER_GAS;
use wallet::units::ether;

pub const DEVNET_PORT: u16 = 8545;
pub const EXPECTED_NETWORK_ID: u64 = 999;
pub const SEEDED_ACCOUNT_COUNT: usize = 3;
pub const STARTING_BALANCE_ETHER: u64 = 15;
pub const FUND_ETHER: u64 = 1;
pub const RETURN_WEI: u64 = 1;
pub const TRANSFER_GAS_LIMIT: u64 = TRANSFER_GAS;

/// How strictly the final balances are checked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BalanceCheck {
    /// Only require that value visibly moved.
    #[default]
    Directional,
    /// Also reconcile every wei against receipt gas accounting.
    Exact,
}

#[derive(Clone, Debug)]
pub struct ProtocolSettings {
    pub expected_network_id: u64,
    pub fund_wei: U256,
    pub return_wei: U256,
    pub gas_limit: u64,
    pub balance_check: BalanceCheck,
    /// Print the human-readable progress report to stdout.
    pub console: bool,
    pub poll_interval: Duration,
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            expected_network_id: EXPECTED_NETWORK_ID,
            fund_wei: ether(FUND_ETHER),
            return_wei: U256::from(RETURN_WEI),
            gas_limit: TRANSFER_GAS_LIMIT,
            balance_check: BalanceCheck::default(),
            console: true,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl ProtocolSettings {
    pub fn quiet() -> Self {
        Self {
            console: false,
            ..Self::default()
        }
    }

    pub fn with_balance_check(mut self, balance_check: BalanceCheck) -> Self {
        self.balance_check = balance_check;
        self
    }
}

#[derive(Clone, Debug)]
pub struct HarnessConfig {
    pub port: u16,
    pub network_id: u64,
    pub accounts: usize,
    pub balance_ether: u64,
    pub protocol: ProtocolSettings,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            port: DEVNET_PORT,
            network_id: EXPECTED_NETWORK_ID,
            accounts: SEEDED_ACCOUNT_COUNT,
            balance_ether: STARTING_BALANCE_ETHER,
            protocol: ProtocolSettings::default(),
        }
    }
}

impl HarnessConfig {
    pub fn chain_config(&self) -> ChainConfig {
        ChainConfig::devnet(self.accounts, self.balance_ether)
            .with_api_addr(SocketAddr::from(([127, 0, 0, 1], self.port)))
            .with_network_id(self.network_id)
    }

    pub fn protocol_settings(&self) -> ProtocolSettings {
        self.protocol.clone()
    }
}
