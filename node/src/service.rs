use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use url::Url;

use crate::api::{chain_router, ApiState};
use crate::config::{endpoint_for, ChainConfig};
use crate::error::{NodeError, NodeResult};
use crate::state::ChainState;
use crate::telemetry::{Telemetry, TelemetrySnapshot};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub struct DevChain;

impl DevChain {
    /// Binds the API socket and starts serving. Fails immediately when the
    /// address is taken. Must be called inside a tokio runtime.
    pub fn start(config: ChainConfig) -> NodeResult<ChainHandle> {
        config.validate()?;
        let listener = StdTcpListener::bind(config.api_addr).map_err(|err| {
            if err.kind() == ErrorKind::AddrInUse {
                NodeError::PortInUse(config.api_addr)
            } else {
                NodeError::Io(err)
            }
        })?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        let listener = tokio::net::TcpListener::from_std(listener)?;

        let telemetry = Arc::new(Telemetry::new());
        let chain = Arc::new(ChainState::new(&config, telemetry.clone()));
        let router = chain_router(ApiState::new(chain.clone(), telemetry.clone()));
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(err) = served {
                warn!(%err, "dev chain api stopped with error");
            }
        });
        info!(
            addr = %local_addr,
            network_id = config.network_id,
            chain_id = config.chain_id,
            accounts = config.accounts.len(),
            "dev chain online"
        );
        Ok(ChainHandle {
            local_addr,
            endpoint: endpoint_for(local_addr)?,
            chain,
            telemetry,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }
}

/// A running dev chain. Stopping releases the listening socket.
pub struct ChainHandle {
    local_addr: SocketAddr,
    endpoint: Url,
    chain: Arc<ChainState>,
    telemetry: Arc<Telemetry>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ChainHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn chain(&self) -> &Arc<ChainState> {
        &self.chain
    }

    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.telemetry.snapshot()
    }

    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await {
                Ok(Ok(())) => info!(addr = %self.local_addr, "dev chain stopped"),
                Ok(Err(err)) => warn!(?err, "dev chain task did not shut down cleanly"),
                Err(_) => {
                    warn!(addr = %self.local_addr, "dev chain shutdown timed out; aborting");
                    task.abort();
                    let _ = task.await;
                }
            }
        }
    }
}

impl Drop for ChainHandle {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}
