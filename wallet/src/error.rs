use thiserror::Error;

use crypto::CryptoError;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("cryptography error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("refusing to sign for {requested}: this provider only signs for {expected}")]
    MisroutedRequest { expected: String, requested: String },

    #[error("no provider stage handled method {0}")]
    Unhandled(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}

impl From<reqwest::Error> for WalletError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<rlp::DecoderError> for WalletError {
    fn from(err: rlp::DecoderError) -> Self {
        Self::Serialization(format!("rlp: {err}"))
    }
}
