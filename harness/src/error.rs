use devnet_node::NodeError;
use primitive_types::H256;
use thiserror::Error;
use wallet::WalletError;

use crate::protocol::ProtocolState;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("chain reports network id {actual}, expected {expected}")]
    NetworkMismatch { expected: u64, actual: u64 },
    #[error("chain exposes no pre-funded accounts")]
    NoNodeAccounts,
    #[error("primary account {account} has no balance to fund with")]
    InsufficientFunds { account: String },
    #[error("{step:?} transaction {transaction_hash:?} failed on chain")]
    TransactionFailed {
        step: ProtocolState,
        transaction_hash: H256,
    },
    #[error("receipt attributed to {actual}, expected {expected}")]
    Misattributed { expected: String, actual: String },
    #[error("{account} balance at {checkpoint} is {actual} wei, expected {expected} wei")]
    BalanceMismatch {
        checkpoint: &'static str,
        account: String,
        expected: String,
        actual: String,
    },
    #[error("{step:?} receipt lacks {field}; exact balance check needs it")]
    MissingGasData {
        step: ProtocolState,
        field: &'static str,
    },
    #[error("no transfer visible in final balances: {0}")]
    NoVisibleTransfer(String),
    #[error("sendAsync accounts {accounts:?} do not include {identity}")]
    ProbeMissingIdentity {
        identity: String,
        accounts: Vec<String>,
    },
    #[error("sendAsync callback was dropped without being invoked")]
    ProbeDropped,
    #[error("rpc error: {0}")]
    Wallet(#[from] WalletError),
    #[error("chain error: {0}")]
    Chain(#[from] NodeError),
}
