//! Verification Protocol Runs
//!
//! Full runs against an in-process dev chain on an ephemeral port: both
//! transfers are mined, balances reconcile, the return transfer is attributed
//! to the fresh identity and the sendAsync probe sees it.

use std::collections::BTreeSet;
use std::net::SocketAddr;

use devnet_harness::{BalanceCheck, ProtocolSettings, ProtocolState, VerificationProtocol};
use devnet_node::{ChainConfig, DevChain};
use serde_json::Value;
use wallet::units::ether;
use wallet::{TransferReceipt, U256};

fn ephemeral_chain() -> ChainConfig {
    ChainConfig::devnet(3, 15).with_api_addr(SocketAddr::from(([127, 0, 0, 1], 0)))
}

fn exact() -> VerificationProtocol {
    VerificationProtocol::new(ProtocolSettings::quiet().with_balance_check(BalanceCheck::Exact))
}

fn receipt_keys(receipt: &TransferReceipt) -> BTreeSet<String> {
    match serde_json::to_value(receipt).expect("receipt json") {
        Value::Object(map) => map
            .into_iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, _)| key)
            .collect(),
        other => panic!("receipt is not an object: {other}"),
    }
}

#[tokio::test]
async fn reference_run_funds_one_ether_and_returns_one_wei() {
    let report = exact().run(ephemeral_chain()).await.expect("run succeeds");

    assert_eq!(report.visited, ProtocolState::ORDER.to_vec());
    assert!(report.fund_receipt.status);
    assert!(report.return_receipt.status);

    assert_eq!(report.initial[0].value_wei, ether(15));
    assert_eq!(report.initial[1].value_wei, U256::zero());
    assert_eq!(report.funded.value_wei, ether(1));

    let return_gas = report.return_receipt.gas_cost().expect("gas data");
    assert_eq!(
        report.final_balances[1].value_wei,
        ether(1) - U256::one() - return_gas
    );
    let fund_gas = report.fund_receipt.gas_cost().expect("gas data");
    assert_eq!(
        report.final_balances[0].value_wei,
        ether(15) - ether(1) - fund_gas + U256::one()
    );

    assert_eq!(report.fund_receipt.from, Some(report.primary));
    assert_eq!(report.return_receipt.from, Some(report.identity));
    assert!(report.probe_accounts.contains(&report.identity));
}

#[tokio::test]
async fn both_paths_yield_receipts_of_the_same_shape() {
    let report = exact().run(ephemeral_chain()).await.expect("run succeeds");
    assert_eq!(
        receipt_keys(&report.fund_receipt),
        receipt_keys(&report.return_receipt)
    );
}

#[tokio::test]
async fn directional_mode_passes_by_default() {
    let report = VerificationProtocol::new(ProtocolSettings::quiet())
        .run(ephemeral_chain())
        .await
        .expect("run succeeds");
    assert_eq!(report.visited.last(), Some(&ProtocolState::Done));
}

#[tokio::test]
async fn runs_are_independent() {
    let protocol = exact();
    let first = protocol.run(ephemeral_chain()).await.expect("first run");
    let second = protocol.run(ephemeral_chain()).await.expect("second run");
    assert_ne!(first.identity, second.identity);
    assert_eq!(first.primary, second.primary);
    assert_eq!(second.initial[0].value_wei, ether(15));
}

#[tokio::test]
async fn repeated_verification_against_one_chain() {
    let handle = DevChain::start(ephemeral_chain()).expect("chain starts");
    let protocol = exact();
    let first = protocol.verify(handle.endpoint()).await.expect("first run");
    let second = protocol.verify(handle.endpoint()).await.expect("second run");
    assert_ne!(first.identity, second.identity);
    assert_eq!(
        second.initial[0].value_wei,
        first.final_balances[0].value_wei
    );
    assert_eq!(handle.telemetry().mined_transactions, 4);
    handle.stop().await;
}
