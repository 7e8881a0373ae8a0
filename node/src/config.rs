use std::net::SocketAddr;

use crypto::deterministic::expand_to_length;
use crypto::secp256k1::Secp256k1SecretKey;
use crypto::traits::SigningKey;
use primitive_types::U256;
use url::Url;
use wallet::units::{ether, gwei};
use wallet::Address;

use crate::error::{NodeError, NodeResult};

/// Network and chain identifiers of public networks. A dev chain must never
/// answer with one of these.
pub const PUBLIC_NETWORK_IDS: [u64; 17] = [
    1, 2, 3, 4, 5, 10, 42, 56, 61, 100, 137, 250, 8453, 17000, 42161, 43114, 11155111,
];

pub const DEFAULT_NETWORK_ID: u64 = 999;
pub const DEFAULT_CHAIN_ID: u64 = 1337;
pub const DEFAULT_BLOCK_GAS_LIMIT: u64 = 6_721_975;
pub const DEFAULT_ACCOUNT_SEED: &str = "devnet";

#[derive(Clone, Debug)]
pub struct GenesisAccount {
    pub secret: Secp256k1SecretKey,
    pub balance: U256,
}

impl GenesisAccount {
    pub fn address(&self) -> Address {
        Address::from_public_key(&self.secret.public_key())
    }
}

#[derive(Clone, Debug)]
pub struct ChainConfig {
    pub api_addr: SocketAddr,
    pub network_id: u64,
    pub chain_id: u64,
    pub accounts: Vec<GenesisAccount>,
    /// Refuse `eth_sendTransaction` for custodied accounts.
    pub locked: bool,
    pub gas_price: U256,
    pub block_gas_limit: u64,
    pub account_seed: String,
}

impl ChainConfig {
    /// `total` custodied accounts holding `balance_ether` each.
    pub fn devnet(total: usize, balance_ether: u64) -> Self {
        let mut config = Self::default();
        config.accounts = derive_accounts(&config.account_seed, total, ether(balance_ether));
        config
    }

    pub fn with_api_addr(mut self, api_addr: SocketAddr) -> Self {
        self.api_addr = api_addr;
        self
    }

    pub fn with_network_id(mut self, network_id: u64) -> Self {
        self.network_id = network_id;
        self
    }

    pub fn seeded_accounts(&self) -> Vec<(Address, U256)> {
        self.accounts
            .iter()
            .map(|account| (account.address(), account.balance))
            .collect()
    }

    pub fn endpoint(&self) -> NodeResult<Url> {
        endpoint_for(self.api_addr)
    }

    pub fn validate(&self) -> NodeResult<()> {
        for id in [self.network_id, self.chain_id] {
            if PUBLIC_NETWORK_IDS.contains(&id) {
                return Err(NodeError::ForbiddenNetworkId(id));
            }
        }
        if self.block_gas_limit < wallet::transaction::TRANSFER_GAS {
            return Err(NodeError::InvalidConfig(format!(
                "block gas limit {} is below a plain transfer",
                self.block_gas_limit
            )));
        }
        let mut addresses: Vec<Address> = self.accounts.iter().map(|a| a.address()).collect();
        addresses.sort();
        addresses.dedup();
        if addresses.len() != self.accounts.len() {
            return Err(NodeError::InvalidConfig("duplicate genesis account".into()));
        }
        Ok(())
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            api_addr: SocketAddr::from(([127, 0, 0, 1], 8545)),
            network_id: DEFAULT_NETWORK_ID,
            chain_id: DEFAULT_CHAIN_ID,
            accounts: Vec::new(),
            locked: false,
            gas_price: gwei(20),
            block_gas_limit: DEFAULT_BLOCK_GAS_LIMIT,
            account_seed: DEFAULT_ACCOUNT_SEED.to_string(),
        }
    }
}

pub fn endpoint_for(addr: SocketAddr) -> NodeResult<Url> {
    Url::parse(&format!("http://{addr}/"))
        .map_err(|err| NodeError::InvalidConfig(format!("endpoint for {addr}: {err}")))
}

/// Same seed and index always yield the same key.
pub fn derive_accounts(seed: &str, total: usize, balance: U256) -> Vec<GenesisAccount> {
    (0..total as u64)
        .map(|index| {
            let material = expand_to_length(
                b"devnet-genesis-account",
                &[seed.as_bytes(), &index.to_be_bytes()[..]].concat(),
                32,
            );
            GenesisAccount {
                secret: Secp256k1SecretKey::generate_deterministic(&material),
                balance,
            }
        })
        .collect()
}
