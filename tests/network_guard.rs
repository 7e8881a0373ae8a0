//! Network Guard Tests
//!
//! A chain answering with an unexpected network id must stop the run at
//! ChainUp: nothing is funded, signed or mined.

use std::net::SocketAddr;

use devnet_harness::{HarnessError, ProtocolSettings, VerificationProtocol};
use devnet_node::{ChainConfig, DevChain, NodeError};
use wallet::DirectRpcClient;

fn chain_with_network(network_id: u64) -> ChainConfig {
    ChainConfig::devnet(3, 15)
        .with_api_addr(SocketAddr::from(([127, 0, 0, 1], 0)))
        .with_network_id(network_id)
}

#[tokio::test]
async fn configured_network_id_is_reported_verbatim() {
    let handle = DevChain::start(chain_with_network(4242)).expect("chain starts");
    let client = DirectRpcClient::connect(handle.endpoint().clone()).expect("client");
    assert_eq!(client.network_id().await.expect("net_version"), 4242);
    handle.stop().await;
}

#[tokio::test]
async fn mismatch_aborts_before_funding() {
    let handle = DevChain::start(chain_with_network(1000)).expect("chain starts");
    let err = VerificationProtocol::new(ProtocolSettings::quiet())
        .verify(handle.endpoint())
        .await
        .expect_err("mismatch must abort");
    assert!(matches!(
        err,
        HarnessError::NetworkMismatch {
            expected: 999,
            actual: 1000
        }
    ));

    let telemetry = handle.telemetry();
    assert_eq!(telemetry.method_count("net_version"), 1);
    assert_eq!(telemetry.method_count("eth_accounts"), 0);
    assert_eq!(telemetry.method_count("eth_sendTransaction"), 0);
    assert_eq!(telemetry.method_count("eth_sendRawTransaction"), 0);
    assert_eq!(telemetry.mined_transactions, 0);
    handle.stop().await;
}

#[tokio::test]
async fn run_releases_chain_after_mismatch() {
    let protocol = VerificationProtocol::new(ProtocolSettings {
        expected_network_id: 31337,
        ..ProtocolSettings::quiet()
    });
    let err = protocol
        .run(chain_with_network(1000))
        .await
        .expect_err("mismatch must abort");
    assert!(matches!(err, HarnessError::NetworkMismatch { .. }));
}

#[tokio::test]
async fn public_network_ids_never_start() {
    let err = VerificationProtocol::new(ProtocolSettings::quiet())
        .run(chain_with_network(1))
        .await
        .expect_err("public id refused");
    assert!(matches!(
        err,
        HarnessError::Chain(NodeError::ForbiddenNetworkId(1))
    ));
}
