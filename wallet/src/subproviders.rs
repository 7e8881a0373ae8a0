//! Stages used by [`ProviderEngine::zero_client`](crate::provider::ProviderEngine::zero_client).

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use primitive_types::U256;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::address::Address;
use crate::error::WalletError;
use crate::jsonrpc::RpcRequest;
use crate::keys::SigningIdentity;
use crate::provider::{Next, ProviderEngine, RequestHandler};
use crate::quantity::{encode_bytes, encode_u64, parse_bytes, parse_u64};
use crate::rpc::{BlockTag, JsonRpcTransport};
use crate::transaction::{SignedTransaction, TransactionRequest};

/// Answers a handful of node-independent methods with static values.
pub struct FixtureSubprovider {
    fixtures: HashMap<&'static str, Value>,
}

impl FixtureSubprovider {
    pub fn new(fixtures: HashMap<&'static str, Value>) -> Self {
        Self { fixtures }
    }
}

impl Default for FixtureSubprovider {
    fn default() -> Self {
        let fixtures = HashMap::from([
            (
                "web3_clientVersion",
                json!(concat!("ProviderEngine/v", env!("CARGO_PKG_VERSION"), "/rust")),
            ),
            ("net_listening", json!(true)),
            ("eth_hashrate", json!("0x00")),
            ("eth_mining", json!(false)),
            ("eth_syncing", json!(false)),
        ]);
        Self::new(fixtures)
    }
}

#[async_trait]
impl RequestHandler for FixtureSubprovider {
    fn name(&self) -> &'static str {
        "fixture"
    }

    async fn handle(&self, request: RpcRequest, next: Next<'_>) -> Result<Value, WalletError> {
        match self.fixtures.get(request.method.as_str()) {
            Some(value) => Ok(value.clone()),
            None => next.run(request).await,
        }
    }
}

const SANITIZED_METHODS: [&str; 4] = [
    "eth_sendTransaction",
    "eth_signTransaction",
    "eth_estimateGas",
    "eth_call",
];

const TRANSACTION_KEYS: [&str; 9] = [
    "from", "to", "value", "data", "input", "gas", "gasPrice", "nonce", "chainId",
];

/// Drops unknown keys from transaction objects and lowercases hex strings.
pub struct SanitizerSubprovider;

fn sanitize_value(value: &Value) -> Value {
    match value {
        Value::String(text) if text.starts_with("0x") || text.starts_with("0X") => {
            Value::String(text.to_ascii_lowercase())
        }
        other => other.clone(),
    }
}

fn sanitize_object(object: &Map<String, Value>) -> Value {
    let cleaned: Map<String, Value> = object
        .iter()
        .filter(|(key, _)| TRANSACTION_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), sanitize_value(value)))
        .collect();
    Value::Object(cleaned)
}

#[async_trait]
impl RequestHandler for SanitizerSubprovider {
    fn name(&self) -> &'static str {
        "sanitizer"
    }

    async fn handle(&self, mut request: RpcRequest, next: Next<'_>) -> Result<Value, WalletError> {
        if SANITIZED_METHODS.contains(&request.method.as_str()) {
            if let Some(params) = request.params.as_array_mut() {
                for param in params.iter_mut() {
                    *param = match &*param {
                        Value::Object(object) => sanitize_object(object),
                        other => sanitize_value(other),
                    };
                }
            }
        }
        next.run(request).await
    }
}

/// Serves pending nonces for senders whose raw transactions it has seen accepted.
#[derive(Default)]
pub struct NonceTrackerSubprovider {
    pending: Mutex<HashMap<Address, u64>>,
}

impl NonceTrackerSubprovider {
    pub fn cached(&self, address: &Address) -> Option<u64> {
        self.pending.lock().get(address).copied()
    }
}

#[async_trait]
impl RequestHandler for NonceTrackerSubprovider {
    fn name(&self) -> &'static str {
        "nonce-tracker"
    }

    async fn handle(&self, request: RpcRequest, next: Next<'_>) -> Result<Value, WalletError> {
        match request.method.as_str() {
            "eth_getTransactionCount" => {
                if BlockTag::from_value(request.param(1))? == BlockTag::Pending {
                    let address: Address = serde_json::from_value(request.param(0).clone())?;
                    if let Some(nonce) = self.cached(&address) {
                        return Ok(json!(encode_u64(nonce)));
                    }
                }
                next.run(request).await
            }
            "eth_sendRawTransaction" => {
                let sent = request
                    .param(0)
                    .as_str()
                    .and_then(|raw| parse_bytes(raw).ok())
                    .and_then(|raw| SignedTransaction::decode(&raw).ok());
                let outcome = next.run(request).await;
                if let Some(sent) = sent {
                    if let Ok(sender) = sent.recover_sender() {
                        let mut pending = self.pending.lock();
                        if outcome.is_ok() {
                            pending.insert(sender, sent.transaction.nonce + 1);
                        } else {
                            pending.remove(&sender);
                        }
                    }
                }
                outcome
            }
            _ => next.run(request).await,
        }
    }
}

/// Holds the signing identity. Transactions and messages from that identity
/// are signed here; requests naming any other sender are refused.
pub struct WalletSubprovider {
    identity: SigningIdentity,
}

impl WalletSubprovider {
    pub fn new(identity: SigningIdentity) -> Self {
        Self { identity }
    }

    fn ensure_identity(&self, requested: &Address) -> Result<(), WalletError> {
        if *requested != self.identity.address() {
            return Err(WalletError::MisroutedRequest {
                expected: self.identity.address().to_checksum(),
                requested: requested.to_checksum(),
            });
        }
        Ok(())
    }

    fn parse_address(value: &Value) -> Result<Address, WalletError> {
        match value.as_str() {
            Some(text) => Address::parse(text),
            None => Err(WalletError::InvalidArgument("expected an address")),
        }
    }

    fn parse_transaction(&self, request: &RpcRequest) -> Result<TransactionRequest, WalletError> {
        let object = request.param(0);
        let from = object
            .get("from")
            .ok_or(WalletError::InvalidArgument("transaction missing from"))?;
        self.ensure_identity(&Self::parse_address(from)?)?;
        Ok(serde_json::from_value(object.clone())?)
    }

    async fn fill_and_sign(
        &self,
        mut tx: TransactionRequest,
        engine: &ProviderEngine,
    ) -> Result<SignedTransaction, WalletError> {
        if tx.nonce.is_none() {
            let count = engine
                .request(
                    "eth_getTransactionCount",
                    json!([tx.from, BlockTag::Pending.to_value()]),
                )
                .await?;
            tx.nonce = Some(quantity(&count)?);
        }
        if tx.gas_price.is_none() {
            let price: U256 = serde_json::from_value(engine.request("eth_gasPrice", json!([])).await?)?;
            tx.gas_price = Some(price);
        }
        if tx.gas.is_none() {
            let estimate = engine.request("eth_estimateGas", json!([tx])).await?;
            tx.gas = Some(quantity(&estimate)?);
        }
        let chain_id = match tx.chain_id {
            Some(chain_id) => chain_id,
            None => quantity(&engine.request("eth_chainId", json!([])).await?)?,
        };
        let signed = self.identity.sign_transaction(tx.to_legacy(Some(chain_id))?)?;
        debug!(
            from = %self.identity.address(),
            nonce = signed.transaction.nonce,
            chain_id,
            "signed transaction locally"
        );
        Ok(signed)
    }

    fn message_signature(&self, address: &Value, message: &Value) -> Result<Value, WalletError> {
        self.ensure_identity(&Self::parse_address(address)?)?;
        let text = message
            .as_str()
            .ok_or(WalletError::InvalidArgument("message must be a string"))?;
        let bytes = if text.starts_with("0x") {
            parse_bytes(text)?
        } else {
            text.as_bytes().to_vec()
        };
        Ok(json!(encode_bytes(&self.identity.sign_message(&bytes)?)))
    }
}

fn quantity(value: &Value) -> Result<u64, WalletError> {
    value
        .as_str()
        .ok_or_else(|| WalletError::Serialization(format!("expected quantity, found {value}")))
        .and_then(parse_u64)
}

#[async_trait]
impl RequestHandler for WalletSubprovider {
    fn name(&self) -> &'static str {
        "wallet"
    }

    async fn handle(&self, request: RpcRequest, next: Next<'_>) -> Result<Value, WalletError> {
        match request.method.as_str() {
            "eth_accounts" | "eth_requestAccounts" => Ok(json!([self.identity.address()])),
            "eth_coinbase" => Ok(json!(self.identity.address())),
            "eth_sendTransaction" => {
                let tx = self.parse_transaction(&request)?;
                let signed = self.fill_and_sign(tx, next.engine()).await?;
                info!(
                    from = %self.identity.address(),
                    hash = ?signed.hash(),
                    "broadcasting locally signed transaction"
                );
                next.engine()
                    .request(
                        "eth_sendRawTransaction",
                        json!([encode_bytes(&signed.encode())]),
                    )
                    .await
            }
            "eth_signTransaction" => {
                let tx = self.parse_transaction(&request)?;
                let signed = self.fill_and_sign(tx, next.engine()).await?;
                Ok(json!(encode_bytes(&signed.encode())))
            }
            "personal_sign" => self.message_signature(request.param(1), request.param(0)),
            "eth_sign" => self.message_signature(request.param(0), request.param(1)),
            _ => next.run(request).await,
        }
    }
}

/// Terminal stage: forwards every request to the chain endpoint.
pub struct FetchSubprovider<T> {
    transport: T,
}

impl<T: JsonRpcTransport> FetchSubprovider<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl<T: JsonRpcTransport> RequestHandler for FetchSubprovider<T> {
    fn name(&self) -> &'static str {
        "fetch"
    }

    async fn handle(&self, request: RpcRequest, _next: Next<'_>) -> Result<Value, WalletError> {
        self.transport.request(&request.method, request.params).await
    }
}
