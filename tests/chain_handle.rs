//! Dev Chain Lifecycle Tests
//!
//! Start, stop and restart the chain over real sockets and talk to it both
//! through the typed client and with hand-written JSON-RPC bodies.

use std::net::{SocketAddr, TcpListener};

use devnet_node::{ChainConfig, DevChain, NodeError, TelemetrySnapshot};
use serde_json::{json, Value};
use wallet::units::ether;
use wallet::DirectRpcClient;

fn loopback(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

async fn post_raw(endpoint: &url::Url, body: &'static str) -> Value {
    reqwest::Client::new()
        .post(endpoint.clone())
        .header("content-type", "application/json")
        .body(body)
        .send()
        .await
        .expect("request sent")
        .json()
        .await
        .expect("json body")
}

#[tokio::test]
async fn occupied_port_fails_fast() {
    let blocker = TcpListener::bind(loopback(0)).expect("bind blocker");
    let taken = blocker.local_addr().expect("addr");
    let err = match DevChain::start(ChainConfig::devnet(1, 1).with_api_addr(taken)) {
        Ok(_) => panic!("start must fail while the port is held"),
        Err(err) => err,
    };
    assert!(matches!(err, NodeError::PortInUse(addr) if addr == taken));
}

#[tokio::test]
async fn stop_releases_the_port() {
    let first = DevChain::start(ChainConfig::devnet(1, 1).with_api_addr(loopback(0)))
        .expect("first start");
    let addr = first.local_addr();
    first.stop().await;

    let second = DevChain::start(ChainConfig::devnet(1, 1).with_api_addr(addr))
        .expect("restart on the same port");
    assert_eq!(second.local_addr(), addr);
    second.stop().await;
}

#[tokio::test]
async fn seeded_accounts_are_funded() {
    let config = ChainConfig::devnet(3, 15).with_api_addr(loopback(0));
    let seeded = config.seeded_accounts();
    let handle = DevChain::start(config).expect("start");
    let client = DirectRpcClient::connect(handle.endpoint().clone()).expect("client");

    let accounts = client.accounts().await.expect("accounts");
    assert_eq!(accounts.len(), 3);
    for (address, balance) in seeded {
        assert!(accounts.contains(&address));
        assert_eq!(balance, ether(15));
        assert_eq!(client.balance(address).await.expect("balance"), ether(15));
    }
    assert_eq!(client.network_id().await.expect("net_version"), 999);
    assert_eq!(client.chain_id().await.expect("chain id"), 1337);
    assert_eq!(client.block_number().await.expect("block number"), 0);
    handle.stop().await;
}

#[tokio::test]
async fn metrics_endpoint_reports_traffic() {
    let handle = DevChain::start(ChainConfig::devnet(1, 1).with_api_addr(loopback(0)))
        .expect("start");
    let client = DirectRpcClient::connect(handle.endpoint().clone()).expect("client");
    client.network_id().await.expect("net_version");
    client.accounts().await.expect("accounts");

    let metrics = handle.endpoint().join("metrics").expect("metrics url");
    let snapshot: TelemetrySnapshot = reqwest::get(metrics)
        .await
        .expect("metrics request")
        .json()
        .await
        .expect("metrics json");
    assert_eq!(snapshot.method_count("net_version"), 1);
    assert_eq!(snapshot.method_count("eth_accounts"), 1);
    assert_eq!(snapshot.total_requests, 2);
    assert_eq!(snapshot.mined_blocks, 0);
    handle.stop().await;
}

#[tokio::test]
async fn batches_and_malformed_bodies() {
    let handle = DevChain::start(ChainConfig::devnet(1, 1).with_api_addr(loopback(0)))
        .expect("start");

    let batch = post_raw(
        handle.endpoint(),
        r#"[{"jsonrpc":"2.0","id":1,"method":"net_version","params":[]},
            {"jsonrpc":"2.0","id":2,"method":"eth_chainId","params":[]},
            {"jsonrpc":"2.0","id":3,"method":"eth_newFilter","params":[]}]"#,
    )
    .await;
    let entries = batch.as_array().expect("batch response");
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0]["result"], json!("999"));
    assert_eq!(entries[1]["result"], json!("0x539"));
    assert_eq!(entries[2]["error"]["code"], json!(-32601));
    assert_eq!(entries[2]["id"], json!(3));

    let garbled = post_raw(handle.endpoint(), "{not json").await;
    assert_eq!(garbled["error"]["code"], json!(-32700));
    assert_eq!(garbled["id"], Value::Null);

    let empty = post_raw(handle.endpoint(), "[]").await;
    assert_eq!(empty["error"]["code"], json!(-32600));

    assert!(handle.telemetry().rejected_requests >= 2);
    handle.stop().await;
}
