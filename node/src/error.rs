use std::net::SocketAddr;

use crypto::CryptoError;
use thiserror::Error;
use wallet::error::WalletError;
use wallet::jsonrpc::{RpcErrorObject, INVALID_PARAMS, METHOD_NOT_FOUND, SERVER_ERROR};

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("address {0} is already in use")]
    PortInUse(SocketAddr),
    #[error("network id {0} belongs to a public network")]
    ForbiddenNetworkId(u64),
    #[error("invalid chain config: {0}")]
    InvalidConfig(String),
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("sender doesn't have enough funds to send tx. The upfront cost is: {required} and the sender's account only has: {available}")]
    InsufficientFunds { required: String, available: String },
    #[error("nonce mismatch: expected {expected}, got {actual}")]
    NonceMismatch { expected: u64, actual: u64 },
    #[error("sender account not recognized: {0}")]
    UnknownAccount(String),
    #[error("signer account is locked: {0}")]
    AccountLocked(String),
    #[error("invalid params: {0}")]
    InvalidParams(String),
    #[error("method {0} not found")]
    MethodNotFound(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("wallet error: {0}")]
    Wallet(#[from] WalletError),
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

pub type NodeResult<T> = Result<T, NodeError>;

impl NodeError {
    /// JSON-RPC error code reported to clients.
    pub fn rpc_code(&self) -> i64 {
        match self {
            Self::MethodNotFound(_) => METHOD_NOT_FOUND,
            Self::InvalidParams(_) | Self::Json(_) => INVALID_PARAMS,
            Self::Wallet(err) => RpcErrorObject::from(err).code,
            _ => SERVER_ERROR,
        }
    }

    pub fn to_rpc_error(&self) -> RpcErrorObject {
        match self {
            Self::Wallet(err) => RpcErrorObject::from(err),
            other => RpcErrorObject::new(other.rpc_code(), other.to_string()),
        }
    }
}
