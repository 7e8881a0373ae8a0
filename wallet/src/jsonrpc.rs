//! JSON-RPC 2.0 envelopes shared by the clients, the provider pipeline and the dev chain.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WalletError;

pub const JSONRPC_VERSION: &str = "2.0";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const SERVER_ERROR: i64 = -32000;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default = "empty_params")]
    pub params: Value,
}

fn default_version() -> String {
    JSONRPC_VERSION.to_string()
}

fn empty_params() -> Value {
    Value::Array(Vec::new())
}

impl RpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: default_version(),
            id: Value::from(id),
            method: method.into(),
            params,
        }
    }

    /// Positional parameter at `index`, `Null` when absent.
    pub fn param(&self, index: usize) -> &Value {
        self.params.get(index).unwrap_or(&Value::Null)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcErrorObject {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

impl From<&WalletError> for RpcErrorObject {
    fn from(err: &WalletError) -> Self {
        match err {
            WalletError::Rpc { code, message } => Self::new(*code, message.clone()),
            WalletError::Unhandled(_) => Self::new(METHOD_NOT_FOUND, err.to_string()),
            WalletError::InvalidAddress(_)
            | WalletError::InvalidArgument(_)
            | WalletError::Serialization(_) => Self::new(INVALID_PARAMS, err.to_string()),
            _ => Self::new(SERVER_ERROR, err.to_string()),
        }
    }
}

/// Raw wire envelope: exactly one of `result` or `error` is expected.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcEnvelope {
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
}

impl RpcEnvelope {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: default_version(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, error: RpcErrorObject) -> Self {
        Self {
            jsonrpc: default_version(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Splits the envelope into the call outcome. A `null` result is a valid
    /// answer (for example a receipt that is not yet available).
    pub fn into_result(self) -> Result<Value, WalletError> {
        match (self.result, self.error) {
            (_, Some(error)) => Err(WalletError::Rpc {
                code: error.code,
                message: error.message,
            }),
            (Some(result), None) => Ok(result),
            (None, None) => Ok(Value::Null),
        }
    }
}

/// Successful response delivered by the provider pipeline.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    pub result: Value,
}

impl RpcResponse {
    pub fn new(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: default_version(),
            id,
            result,
        }
    }
}
