use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use primitive_types::{H256, U256};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use crate::address::Address;
use crate::error::WalletError;
use crate::jsonrpc::{RpcEnvelope, RpcRequest};
use crate::quantity::{encode_bytes, encode_u64, parse_u64};
use crate::transaction::{TransferReceipt, TransferRequest};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Anything that can answer a JSON-RPC call: an HTTP endpoint or a provider pipeline.
#[async_trait]
pub trait JsonRpcTransport: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, WalletError>;
}

#[async_trait]
impl<T: JsonRpcTransport + ?Sized> JsonRpcTransport for Arc<T> {
    async fn request(&self, method: &str, params: Value) -> Result<Value, WalletError> {
        (**self).request(method, params).await
    }
}

/// JSON-RPC over HTTP POST.
#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
    next_id: AtomicU64,
}

impl HttpTransport {
    pub fn new(endpoint: Url) -> Result<Self, WalletError> {
        let client = Client::builder()
            .build()
            .map_err(|err| WalletError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            endpoint,
            next_id: AtomicU64::new(1),
        })
    }
}

#[async_trait]
impl JsonRpcTransport for HttpTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value, WalletError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(%method, id, endpoint = %self.endpoint, "json-rpc request");
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&RpcRequest::new(id, method, params))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(WalletError::Transport(format!(
                "{method} returned http status {status}"
            )));
        }
        let envelope: RpcEnvelope = response
            .json()
            .await
            .map_err(|err| WalletError::Transport(format!("malformed response: {err}")))?;
        envelope.into_result()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockTag {
    Earliest,
    Latest,
    Pending,
    Number(u64),
}

impl BlockTag {
    pub fn to_value(self) -> Value {
        match self {
            Self::Earliest => json!("earliest"),
            Self::Latest => json!("latest"),
            Self::Pending => json!("pending"),
            Self::Number(number) => json!(encode_u64(number)),
        }
    }

    /// Missing tags default to `latest`, matching common node behavior.
    pub fn from_value(value: &Value) -> Result<Self, WalletError> {
        match value {
            Value::Null => Ok(Self::Latest),
            Value::String(text) => match text.as_str() {
                "earliest" => Ok(Self::Earliest),
                "latest" | "safe" | "finalized" => Ok(Self::Latest),
                "pending" => Ok(Self::Pending),
                other => parse_u64(other).map(Self::Number),
            },
            _ => Err(WalletError::InvalidArgument("block tag must be a string")),
        }
    }
}

/// Typed Ethereum RPC surface over any transport.
#[derive(Debug)]
pub struct EthClient<T> {
    transport: T,
    poll_interval: Duration,
}

/// Talks straight to the chain endpoint; used for node-custodied accounts.
pub type DirectRpcClient = EthClient<HttpTransport>;

impl DirectRpcClient {
    pub fn connect(endpoint: Url) -> Result<Self, WalletError> {
        Ok(Self::new(HttpTransport::new(endpoint)?))
    }
}

impl<T: JsonRpcTransport> EthClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn call<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<R, WalletError> {
        let value = self.transport.request(method, params).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn call_quantity(&self, method: &str, params: Value) -> Result<u64, WalletError> {
        let text: String = self.call(method, params).await?;
        parse_u64(&text)
    }

    /// `net_version`. Nodes report it as a decimal string.
    pub async fn network_id(&self) -> Result<u64, WalletError> {
        let value: Value = self.call("net_version", json!([])).await?;
        match value {
            Value::String(text) if text.starts_with("0x") => parse_u64(&text),
            Value::String(text) => text
                .parse()
                .map_err(|_| WalletError::Serialization(format!("invalid network id {text}"))),
            Value::Number(number) => number
                .as_u64()
                .ok_or_else(|| WalletError::Serialization(format!("invalid network id {number}"))),
            other => Err(WalletError::Serialization(format!(
                "invalid network id {other}"
            ))),
        }
    }

    pub async fn chain_id(&self) -> Result<u64, WalletError> {
        self.call_quantity("eth_chainId", json!([])).await
    }

    pub async fn client_version(&self) -> Result<String, WalletError> {
        self.call("web3_clientVersion", json!([])).await
    }

    pub async fn accounts(&self) -> Result<Vec<Address>, WalletError> {
        self.call("eth_accounts", json!([])).await
    }

    pub async fn block_number(&self) -> Result<u64, WalletError> {
        self.call_quantity("eth_blockNumber", json!([])).await
    }

    pub async fn gas_price(&self) -> Result<U256, WalletError> {
        self.call("eth_gasPrice", json!([])).await
    }

    pub async fn balance(&self, address: Address) -> Result<U256, WalletError> {
        self.call("eth_getBalance", json!([address, "latest"])).await
    }

    pub async fn transaction_count(
        &self,
        address: Address,
        tag: BlockTag,
    ) -> Result<u64, WalletError> {
        self.call_quantity(
            "eth_getTransactionCount",
            json!([address, tag.to_value()]),
        )
        .await
    }

    /// Sends the transfer and waits until it is mined.
    pub async fn send_transaction(
        &self,
        request: &TransferRequest,
    ) -> Result<TransferReceipt, WalletError> {
        let hash: H256 = self
            .call("eth_sendTransaction", json!([request.to_wire()]))
            .await?;
        debug!(?hash, from = %request.from(), to = %request.to(), "transaction submitted");
        self.wait_for_receipt(hash).await
    }

    pub async fn send_raw_transaction(&self, raw: &[u8]) -> Result<H256, WalletError> {
        self.call("eth_sendRawTransaction", json!([encode_bytes(raw)]))
            .await
    }

    pub async fn transaction_receipt(
        &self,
        hash: H256,
    ) -> Result<Option<TransferReceipt>, WalletError> {
        self.call("eth_getTransactionReceipt", json!([hash])).await
    }

    /// Polls until a receipt appears. There is no deadline.
    pub async fn wait_for_receipt(&self, hash: H256) -> Result<TransferReceipt, WalletError> {
        loop {
            if let Some(receipt) = self.transaction_receipt(hash).await? {
                return Ok(receipt);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
