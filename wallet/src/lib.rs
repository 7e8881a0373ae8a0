pub mod address;
pub mod error;
pub mod jsonrpc;
pub mod keys;
pub mod provider;
pub mod quantity;
pub mod rpc;
pub mod subproviders;
pub mod transaction;
pub mod units;

pub use address::Address;
pub use error::WalletError;
pub use jsonrpc::{RpcRequest, RpcResponse};
pub use keys::SigningIdentity;
pub use provider::{Next, ProviderEngine, RequestHandler, SigningProvider};
pub use rpc::{BlockTag, DirectRpcClient, EthClient, HttpTransport, JsonRpcTransport};
pub use transaction::{
    LegacyTransaction, SignedTransaction, TransactionRequest, TransferReceipt, TransferRequest,
};
pub use units::{ether, format_ether, gwei, parse_ether};

pub use primitive_types::{H256, U256};
