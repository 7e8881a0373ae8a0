//! Signing Provider Pipeline Tests
//!
//! The wallet stage must refuse any request naming a foreign sender before
//! the request reaches the network, the callback entry point must fire exactly
//! once, and read-only calls must agree with the direct client.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use devnet_harness::probe_accounts;
use devnet_node::{ChainConfig, ChainHandle, DevChain};
use proptest::prelude::*;
use serde_json::{json, Value};
use tokio::sync::oneshot;
use wallet::subproviders::{NonceTrackerSubprovider, SanitizerSubprovider, WalletSubprovider};
use wallet::{
    Address, DirectRpcClient, EthClient, Next, ProviderEngine, RequestHandler, RpcRequest,
    SigningIdentity, WalletError,
};

/// Terminal stage that counts everything that would have hit the network.
#[derive(Default)]
struct CountingTerminal {
    calls: AtomicUsize,
}

#[async_trait]
impl RequestHandler for CountingTerminal {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn handle(&self, _request: RpcRequest, _next: Next<'_>) -> Result<Value, WalletError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!("0x0"))
    }
}

fn offline_engine(identity: SigningIdentity, terminal: Arc<CountingTerminal>) -> ProviderEngine {
    ProviderEngine::new(vec![
        Arc::new(SanitizerSubprovider),
        Arc::new(NonceTrackerSubprovider::default()),
        Arc::new(WalletSubprovider::new(identity)),
        terminal,
    ])
}

fn start_chain() -> ChainHandle {
    DevChain::start(
        ChainConfig::devnet(3, 15).with_api_addr(SocketAddr::from(([127, 0, 0, 1], 0))),
    )
    .expect("chain starts")
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn foreign_sender_never_reaches_the_network(
        seed in proptest::collection::vec(any::<u8>(), 1..32),
        foreign in any::<[u8; 20]>(),
        value in 1u64..u64::MAX,
    ) {
        let identity = SigningIdentity::from_seed(&seed);
        let foreign = Address::from_bytes(foreign);
        prop_assume!(foreign != identity.address());

        let terminal = Arc::new(CountingTerminal::default());
        let engine = offline_engine(identity, terminal.clone());
        let outcome = runtime().block_on(engine.request(
            "eth_sendTransaction",
            json!([{ "from": foreign, "to": foreign, "value": format!("{value:#x}") }]),
        ));

        let refused = matches!(outcome, Err(WalletError::MisroutedRequest { .. }));
        prop_assert!(refused);
        prop_assert_eq!(terminal.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn foreign_message_signer_is_refused(
        seed in proptest::collection::vec(any::<u8>(), 1..32),
        foreign in any::<[u8; 20]>(),
    ) {
        let identity = SigningIdentity::from_seed(&seed);
        let foreign = Address::from_bytes(foreign);
        prop_assume!(foreign != identity.address());

        let terminal = Arc::new(CountingTerminal::default());
        let engine = offline_engine(identity, terminal.clone());
        let rt = runtime();
        let personal = rt.block_on(engine.request("personal_sign", json!(["0x68656c6c6f", foreign])));
        let eth_sign = rt.block_on(engine.request("eth_sign", json!([foreign, "0x68656c6c6f"])));

        let refused = matches!(personal, Err(WalletError::MisroutedRequest { .. }))
            && matches!(eth_sign, Err(WalletError::MisroutedRequest { .. }));
        prop_assert!(refused);
        prop_assert_eq!(terminal.calls.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn send_async_fires_once_with_the_identity() {
    let handle = start_chain();
    let identity = SigningIdentity::generate();
    let expected = identity.address();
    let engine = Arc::new(
        ProviderEngine::zero_client(handle.endpoint().clone(), identity).expect("engine"),
    );

    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = oneshot::channel();
    let counter = calls.clone();
    engine.send_async(RpcRequest::new(7, "eth_accounts", json!([])), move |outcome| {
        counter.fetch_add(1, Ordering::SeqCst);
        let _ = tx.send(outcome);
    });

    let response = rx.await.expect("callback invoked").expect("accounts");
    assert_eq!(response.id, json!(7));
    assert_eq!(response.result, json!([expected]));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    handle.stop().await;
}

#[tokio::test]
async fn probe_is_idempotent_and_local() {
    let handle = start_chain();
    let identity = SigningIdentity::generate();
    let expected = identity.address();
    let engine = Arc::new(
        ProviderEngine::zero_client(handle.endpoint().clone(), identity).expect("engine"),
    );

    let first = probe_accounts(&engine).await.expect("first probe");
    let second = probe_accounts(&engine).await.expect("second probe");
    assert_eq!(first, vec![expected]);
    assert_eq!(first, second);
    assert_eq!(handle.telemetry().method_count("eth_accounts"), 0);
    handle.stop().await;
}

#[tokio::test]
async fn read_only_calls_match_the_direct_client() {
    let handle = start_chain();
    let direct = DirectRpcClient::connect(handle.endpoint().clone()).expect("client");
    let signing = ProviderEngine::zero_client(handle.endpoint().clone(), SigningIdentity::generate())
        .expect("engine")
        .into_client();

    assert_eq!(
        direct.network_id().await.expect("direct"),
        signing.network_id().await.expect("signing")
    );
    assert_eq!(
        direct.chain_id().await.expect("direct"),
        signing.chain_id().await.expect("signing")
    );
    let primary = direct.accounts().await.expect("accounts")[0];
    assert_eq!(
        direct.balance(primary).await.expect("direct"),
        signing.balance(primary).await.expect("signing")
    );
    handle.stop().await;
}

#[tokio::test]
async fn fixture_answers_client_version_locally() {
    let handle = start_chain();
    let signing: wallet::SigningProvider = EthClient::new(Arc::new(
        ProviderEngine::zero_client(handle.endpoint().clone(), SigningIdentity::generate())
            .expect("engine"),
    ));
    let version = signing.client_version().await.expect("version");
    assert!(version.starts_with("ProviderEngine/"));
    assert_eq!(handle.telemetry().method_count("web3_clientVersion"), 0);
    handle.stop().await;
}

#[tokio::test]
async fn unfunded_identity_cannot_send() {
    let handle = start_chain();
    let identity = SigningIdentity::generate();
    let from = identity.address();
    let signing = ProviderEngine::zero_client(handle.endpoint().clone(), identity)
        .expect("engine")
        .into_client();
    let primary = signing_target(&handle).await;

    let err = signing
        .send_transaction(&wallet::TransferRequest::new(
            from,
            primary,
            wallet::U256::one(),
            21_000,
        ))
        .await
        .expect_err("no funds");
    assert!(matches!(err, WalletError::Rpc { .. }));
    assert_eq!(handle.telemetry().mined_transactions, 0);
    handle.stop().await;
}

async fn signing_target(handle: &ChainHandle) -> Address {
    DirectRpcClient::connect(handle.endpoint().clone())
        .expect("client")
        .accounts()
        .await
        .expect("accounts")[0]
}
