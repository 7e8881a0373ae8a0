use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use primitive_types::H256;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};
use wallet::jsonrpc::{RpcEnvelope, RpcErrorObject, RpcRequest, INVALID_REQUEST, PARSE_ERROR};
use wallet::quantity::{encode_u64, parse_bytes};
use wallet::rpc::BlockTag;
use wallet::transaction::TransactionRequest;
use wallet::Address;

use crate::error::{NodeError, NodeResult};
use crate::state::ChainState;
use crate::telemetry::{Telemetry, TelemetrySnapshot};

pub const CLIENT_VERSION: &str = concat!("DevnetNode/v", env!("CARGO_PKG_VERSION"), "/rust");

#[derive(Clone)]
pub struct ApiState {
    chain: Arc<ChainState>,
    telemetry: Arc<Telemetry>,
}

impl ApiState {
    pub fn new(chain: Arc<ChainState>, telemetry: Arc<Telemetry>) -> Self {
        Self { chain, telemetry }
    }
}

pub fn chain_router(state: ApiState) -> Router {
    Router::new()
        .route("/", post(json_rpc))
        .route("/metrics", get(metrics))
        .with_state(state)
}

async fn metrics(State(state): State<ApiState>) -> Json<TelemetrySnapshot> {
    Json(state.telemetry.snapshot())
}

/// Accepts a single request object or a batch array. Parse failures are
/// reported in-band with a `null` id.
async fn json_rpc(State(state): State<ApiState>, body: Bytes) -> Json<Value> {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => {
            state.telemetry.record_rejection();
            let error = RpcErrorObject::new(PARSE_ERROR, format!("parse error: {err}"));
            return Json(envelope_value(RpcEnvelope::failure(Value::Null, error)));
        }
    };
    match payload {
        Value::Array(batch) if batch.is_empty() => Json(envelope_value(RpcEnvelope::failure(
            Value::Null,
            RpcErrorObject::new(INVALID_REQUEST, "empty batch"),
        ))),
        Value::Array(batch) => {
            let responses: Vec<Value> = batch
                .into_iter()
                .map(|entry| envelope_value(handle_entry(&state, entry)))
                .collect();
            Json(Value::Array(responses))
        }
        single => Json(envelope_value(handle_entry(&state, single))),
    }
}

fn envelope_value(envelope: RpcEnvelope) -> Value {
    serde_json::to_value(envelope).unwrap_or(Value::Null)
}

fn handle_entry(state: &ApiState, entry: Value) -> RpcEnvelope {
    let request: RpcRequest = match serde_json::from_value(entry) {
        Ok(request) => request,
        Err(err) => {
            state.telemetry.record_rejection();
            return RpcEnvelope::failure(
                Value::Null,
                RpcErrorObject::new(INVALID_REQUEST, format!("invalid request: {err}")),
            );
        }
    };
    state.telemetry.record_request(&request.method);
    match dispatch(&state.chain, &request) {
        Ok(result) => RpcEnvelope::success(request.id, result),
        Err(err) => {
            state.telemetry.record_rejection();
            warn!(method = %request.method, %err, "json-rpc request rejected");
            RpcEnvelope::failure(request.id, err.to_rpc_error())
        }
    }
}

fn param<T: DeserializeOwned>(request: &RpcRequest, index: usize) -> NodeResult<T> {
    serde_json::from_value(request.param(index).clone()).map_err(|err| {
        NodeError::InvalidParams(format!("{} param {index}: {err}", request.method))
    })
}

fn block_tag(request: &RpcRequest, index: usize) -> NodeResult<BlockTag> {
    BlockTag::from_value(request.param(index))
        .map_err(|err| NodeError::InvalidParams(err.to_string()))
}

fn dispatch(chain: &ChainState, request: &RpcRequest) -> NodeResult<Value> {
    debug!(method = %request.method, "json-rpc call");
    let result = match request.method.as_str() {
        "web3_clientVersion" => json!(CLIENT_VERSION),
        "net_version" => json!(chain.network_id().to_string()),
        "net_listening" => json!(true),
        "eth_chainId" => json!(encode_u64(chain.chain_id())),
        "eth_accounts" => json!(chain.accounts()),
        "eth_blockNumber" => json!(encode_u64(chain.block_number())),
        "eth_gasPrice" => json!(chain.gas_price()),
        "eth_getBalance" => {
            let address: Address = param(request, 0)?;
            block_tag(request, 1)?;
            json!(chain.balance(&address))
        }
        "eth_getTransactionCount" => {
            let address: Address = param(request, 0)?;
            block_tag(request, 1)?;
            json!(encode_u64(chain.nonce(&address)))
        }
        "eth_estimateGas" => {
            let data = request
                .param(0)
                .get("data")
                .or_else(|| request.param(0).get("input"))
                .and_then(Value::as_str)
                .map(parse_bytes)
                .transpose()?
                .unwrap_or_default();
            let mut estimate = TransactionRequest::from_sender(Address::default());
            estimate.data = Some(data);
            json!(encode_u64(chain.estimate_gas(&estimate)))
        }
        "eth_sendTransaction" => {
            let tx: TransactionRequest = param(request, 0)?;
            json!(chain.send_transaction(tx)?)
        }
        "eth_sendRawTransaction" => {
            let raw: String = param(request, 0)?;
            json!(chain.send_raw_transaction(&parse_bytes(&raw)?)?)
        }
        "eth_getTransactionReceipt" => {
            let hash: H256 = param(request, 0)?;
            json!(chain.receipt(&hash))
        }
        "eth_getTransactionByHash" => {
            let hash: H256 = param(request, 0)?;
            json!(chain.transaction(&hash))
        }
        other => return Err(NodeError::MethodNotFound(other.to_string())),
    };
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChainConfig;

    fn chain() -> ChainState {
        ChainState::new(&ChainConfig::devnet(2, 15), Arc::new(Telemetry::new()))
    }

    fn call(chain: &ChainState, method: &str, params: Value) -> NodeResult<Value> {
        dispatch(chain, &RpcRequest::new(1, method, params))
    }

    #[test]
    fn reports_identity_of_the_chain() {
        let chain = chain();
        assert_eq!(call(&chain, "net_version", json!([])).unwrap(), json!("999"));
        assert_eq!(call(&chain, "eth_chainId", json!([])).unwrap(), json!("0x539"));
        let accounts = call(&chain, "eth_accounts", json!([])).unwrap();
        assert_eq!(accounts.as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn unknown_method_maps_to_method_not_found() {
        let err = call(&chain(), "eth_newFilter", json!([])).unwrap_err();
        assert_eq!(err.to_rpc_error().code, -32601);
    }

    #[test]
    fn malformed_params_map_to_invalid_params() {
        let err = call(&chain(), "eth_getBalance", json!(["not-an-address"])).unwrap_err();
        assert_eq!(err.to_rpc_error().code, -32602);
    }

    #[test]
    fn missing_receipt_is_null() {
        let hash = format!("0x{}", "00".repeat(32));
        assert_eq!(
            call(&chain(), "eth_getTransactionReceipt", json!([hash])).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn estimate_counts_calldata() {
        let chain = chain();
        assert_eq!(
            call(&chain, "eth_estimateGas", json!([{}])).unwrap(),
            json!("0x5208")
        );
        assert_eq!(
            call(&chain, "eth_estimateGas", json!([{"data": "0x0001"}])).unwrap(),
            json!(encode_u64(21_000 + 4 + 16))
        );
    }
}
