//! Signing provider pipeline.
//!
//! A [`ProviderEngine`] owns an ordered list of [`RequestHandler`] stages. A
//! request enters at the first stage; each stage either answers it or hands it
//! on through [`Next`]. Stages may also issue fresh sub-requests that re-enter
//! the pipeline from the top (the wallet stage asks for nonces and gas prices
//! that way), so caching stages see every call.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::error::WalletError;
use crate::jsonrpc::{RpcRequest, RpcResponse};
use crate::keys::SigningIdentity;
use crate::rpc::{EthClient, HttpTransport, JsonRpcTransport};
use crate::subproviders::{
    FetchSubprovider, FixtureSubprovider, NonceTrackerSubprovider, SanitizerSubprovider,
    WalletSubprovider,
};

#[async_trait]
pub trait RequestHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, request: RpcRequest, next: Next<'_>) -> Result<Value, WalletError>;
}

/// The remainder of the pipeline below the current stage.
pub struct Next<'a> {
    engine: &'a ProviderEngine,
    remaining: &'a [Arc<dyn RequestHandler>],
}

impl<'a> Next<'a> {
    pub async fn run(self, request: RpcRequest) -> Result<Value, WalletError> {
        match self.remaining.split_first() {
            Some((stage, rest)) => {
                let next = Next {
                    engine: self.engine,
                    remaining: rest,
                };
                stage.handle(request, next).await
            }
            None => Err(WalletError::Unhandled(request.method)),
        }
    }

    pub fn engine(&self) -> &'a ProviderEngine {
        self.engine
    }
}

pub struct ProviderEngine {
    stages: Vec<Arc<dyn RequestHandler>>,
    next_id: AtomicU64,
}

/// Same RPC surface as the direct client, with signing done locally.
pub type SigningProvider = EthClient<Arc<ProviderEngine>>;

impl ProviderEngine {
    pub fn new(stages: Vec<Arc<dyn RequestHandler>>) -> Self {
        Self {
            stages,
            next_id: AtomicU64::new(1),
        }
    }

    /// Fixture, sanitizer, nonce cache, wallet signer, then HTTP fetch to `endpoint`.
    pub fn zero_client(endpoint: Url, identity: SigningIdentity) -> Result<Self, WalletError> {
        let fetch = FetchSubprovider::new(HttpTransport::new(endpoint)?);
        Ok(Self::new(vec![
            Arc::new(FixtureSubprovider::default()),
            Arc::new(SanitizerSubprovider),
            Arc::new(NonceTrackerSubprovider::default()),
            Arc::new(WalletSubprovider::new(identity)),
            Arc::new(fetch),
        ]))
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    pub fn into_client(self) -> SigningProvider {
        EthClient::new(Arc::new(self))
    }

    /// Runs a request through every stage and returns the bare result.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, WalletError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.dispatch(RpcRequest::new(id, method, params)).await
    }

    async fn dispatch(&self, request: RpcRequest) -> Result<Value, WalletError> {
        debug!(method = %request.method, "provider request");
        Next {
            engine: self,
            remaining: &self.stages,
        }
        .run(request)
        .await
    }

    /// Awaitable form of [`ProviderEngine::send_async`].
    pub async fn handle_request(&self, request: RpcRequest) -> Result<RpcResponse, WalletError> {
        let id = request.id.clone();
        let result = self.dispatch(request).await?;
        Ok(RpcResponse::new(id, result))
    }

    /// Callback-style entry point. The callback runs exactly once, on a
    /// runtime task, with either the response or the error.
    pub fn send_async<F>(self: &Arc<Self>, request: RpcRequest, callback: F)
    where
        F: FnOnce(Result<RpcResponse, WalletError>) + Send + 'static,
    {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = engine.handle_request(request).await;
            if let Err(err) = &outcome {
                warn!(%err, "send_async request failed");
            }
            callback(outcome);
        });
    }
}

#[async_trait]
impl JsonRpcTransport for ProviderEngine {
    async fn request(&self, method: &str, params: Value) -> Result<Value, WalletError> {
        ProviderEngine::request(self, method, params).await
    }
}

impl std::fmt::Debug for ProviderEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderEngine")
            .field("stages", &self.stage_names())
            .finish()
    }
}
