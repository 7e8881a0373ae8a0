//! Transaction-lifecycle verification.
//!
//! The protocol walks a fixed sequence of states. Each state only starts once
//! the previous one has fully succeeded, and any failure ends the run: there
//! are no retries and no state is entered twice.
//!
//! Two RPC paths are exercised against the same endpoint. The direct client
//! moves funds out of a node-custodied account; the signing provider moves
//! funds back out of a freshly generated identity whose key never leaves this
//! process.

use std::sync::Arc;

use devnet_node::{ChainConfig, DevChain};
use primitive_types::U256;
use serde_json::json;
use tokio::sync::oneshot;
use tracing::{debug, info};
use url::Url;
use wallet::{
    Address, DirectRpcClient, EthClient, ProviderEngine, RpcRequest, SigningIdentity,
    SigningProvider, TransferReceipt, TransferRequest, WalletError,
};

use crate::config::{BalanceCheck, ProtocolSettings};
use crate::error::HarnessError;
use crate::report::{BalanceSnapshot, Console, RunReport};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProtocolState {
    ChainUp,
    IdentityReady,
    InitialSnapshot,
    Fund,
    ReturnTransfer,
    FinalSnapshot,
    AsyncProbe,
    Done,
}

impl ProtocolState {
    pub const ORDER: [ProtocolState; 8] = [
        ProtocolState::ChainUp,
        ProtocolState::IdentityReady,
        ProtocolState::InitialSnapshot,
        ProtocolState::Fund,
        ProtocolState::ReturnTransfer,
        ProtocolState::FinalSnapshot,
        ProtocolState::AsyncProbe,
        ProtocolState::Done,
    ];
}

const PRIMARY_LABEL: &str = "primary";
const IDENTITY_LABEL: &str = "new wallet";

#[derive(Clone, Debug, Default)]
pub struct VerificationProtocol {
    settings: ProtocolSettings,
}

/// Visited-state log that refuses to go backwards.
struct Progress {
    visited: Vec<ProtocolState>,
}

impl Progress {
    fn enter(&mut self, state: ProtocolState) {
        debug_assert!(self.visited.last().map_or(true, |last| *last < state));
        info!(?state, "entering protocol state");
        self.visited.push(state);
    }
}

impl VerificationProtocol {
    pub fn new(settings: ProtocolSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ProtocolSettings {
        &self.settings
    }

    /// Starts a chain from `chain`, verifies it and stops it again, whatever the outcome.
    pub async fn run(&self, chain: ChainConfig) -> Result<RunReport, HarnessError> {
        let handle = DevChain::start(chain)?;
        let outcome = self.verify(handle.endpoint()).await;
        handle.stop().await;
        outcome
    }

    /// Runs every state against an already running endpoint.
    pub async fn verify(&self, endpoint: &Url) -> Result<RunReport, HarnessError> {
        let settings = &self.settings;
        let console = Console::new(settings.console);
        let mut progress = Progress {
            visited: Vec::with_capacity(ProtocolState::ORDER.len()),
        };

        progress.enter(ProtocolState::ChainUp);
        let direct = DirectRpcClient::connect(endpoint.clone())?
            .with_poll_interval(settings.poll_interval);
        let network_id = direct.network_id().await?;
        if network_id != settings.expected_network_id {
            return Err(HarnessError::NetworkMismatch {
                expected: settings.expected_network_id,
                actual: network_id,
            });
        }

        progress.enter(ProtocolState::IdentityReady);
        let identity = SigningIdentity::generate();
        let identity_address = identity.address();
        let engine = Arc::new(ProviderEngine::zero_client(endpoint.clone(), identity)?);
        let signing: SigningProvider =
            EthClient::new(engine.clone()).with_poll_interval(settings.poll_interval);
        debug!(identity = %identity_address, stages = ?engine.stage_names(), "signing provider ready");

        progress.enter(ProtocolState::InitialSnapshot);
        let primary = *direct
            .accounts()
            .await?
            .first()
            .ok_or(HarnessError::NoNodeAccounts)?;
        let initial = vec![
            BalanceSnapshot::new(PRIMARY_LABEL, primary, direct.balance(primary).await?),
            BalanceSnapshot::new(
                IDENTITY_LABEL,
                identity_address,
                direct.balance(identity_address).await?,
            ),
        ];
        console.balances("Initial Balances", &initial);
        if initial[0].value_wei.is_zero() {
            return Err(HarnessError::InsufficientFunds {
                account: primary.to_checksum(),
            });
        }

        progress.enter(ProtocolState::Fund);
        console.line(format!("Funding our new wallet at {identity_address}"));
        let fund_receipt = direct
            .send_transaction(&TransferRequest::new(
                primary,
                identity_address,
                settings.fund_wei,
                settings.gas_limit,
            ))
            .await?;
        ensure_success(ProtocolState::Fund, &fund_receipt)?;
        let funded = BalanceSnapshot::new(
            IDENTITY_LABEL,
            identity_address,
            direct.balance(identity_address).await?,
        );
        let expected_funded = initial[1].value_wei + settings.fund_wei;
        if funded.value_wei != expected_funded {
            return Err(mismatch(
                "post-fund",
                identity_address,
                expected_funded,
                funded.value_wei,
            ));
        }

        progress.enter(ProtocolState::ReturnTransfer);
        console.line("Sending funds from our new wallet...");
        let return_receipt = signing
            .send_transaction(&TransferRequest::new(
                identity_address,
                primary,
                settings.return_wei,
                settings.gas_limit,
            ))
            .await?;
        ensure_success(ProtocolState::ReturnTransfer, &return_receipt)?;
        if let Some(from) = return_receipt.from {
            if from != identity_address {
                return Err(HarnessError::Misattributed {
                    expected: identity_address.to_checksum(),
                    actual: from.to_checksum(),
                });
            }
        }

        progress.enter(ProtocolState::FinalSnapshot);
        let final_balances = vec![
            BalanceSnapshot::new(PRIMARY_LABEL, primary, direct.balance(primary).await?),
            BalanceSnapshot::new(
                IDENTITY_LABEL,
                identity_address,
                direct.balance(identity_address).await?,
            ),
        ];
        console.balances("Final Balances", &final_balances);
        match settings.balance_check {
            BalanceCheck::Directional => check_directional(
                settings,
                &initial[0],
                &funded,
                &final_balances,
            )?,
            BalanceCheck::Exact => check_exact(
                settings,
                &initial[0],
                &funded,
                &final_balances,
                &fund_receipt,
                &return_receipt,
            )?,
        }

        progress.enter(ProtocolState::AsyncProbe);
        console.line("Trying sendAsync...");
        let probe_accounts = probe_accounts(&engine).await?;
        for account in &probe_accounts {
            console.line(format!("wallet account: {account}"));
        }
        if !probe_accounts.contains(&identity_address) {
            return Err(HarnessError::ProbeMissingIdentity {
                identity: identity_address.to_checksum(),
                accounts: probe_accounts.iter().map(Address::to_checksum).collect(),
            });
        }

        progress.enter(ProtocolState::Done);
        console.line("complete");
        Ok(RunReport {
            visited: progress.visited,
            identity: identity_address,
            primary,
            initial,
            funded,
            final_balances,
            fund_receipt,
            return_receipt,
            probe_accounts,
        })
    }
}

/// Asks the provider pipeline for its accounts through the callback entry
/// point and waits for the single callback.
pub async fn probe_accounts(engine: &Arc<ProviderEngine>) -> Result<Vec<Address>, HarnessError> {
    let (tx, rx) = oneshot::channel();
    engine.send_async(
        RpcRequest::new(1, "eth_accounts", json!([])),
        move |outcome| {
            let _ = tx.send(outcome);
        },
    );
    let response = rx.await.map_err(|_| HarnessError::ProbeDropped)??;
    let accounts = serde_json::from_value(response.result).map_err(WalletError::from)?;
    Ok(accounts)
}

fn ensure_success(step: ProtocolState, receipt: &TransferReceipt) -> Result<(), HarnessError> {
    if receipt.status {
        return Ok(());
    }
    Err(HarnessError::TransactionFailed {
        step,
        transaction_hash: receipt.transaction_hash,
    })
}

fn mismatch(
    checkpoint: &'static str,
    account: Address,
    expected: U256,
    actual: U256,
) -> HarnessError {
    HarnessError::BalanceMismatch {
        checkpoint,
        account: account.to_checksum(),
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}

fn check_directional(
    settings: &ProtocolSettings,
    primary_initial: &BalanceSnapshot,
    funded: &BalanceSnapshot,
    final_balances: &[BalanceSnapshot],
) -> Result<(), HarnessError> {
    let (primary_final, identity_final) = (&final_balances[0], &final_balances[1]);
    let spent = funded.value_wei.checked_sub(identity_final.value_wei);
    if spent.map_or(true, |spent| spent < settings.return_wei) {
        return Err(HarnessError::NoVisibleTransfer(format!(
            "new wallet went from {} to {} wei",
            funded.value_wei, identity_final.value_wei
        )));
    }
    if primary_final.value_wei == primary_initial.value_wei {
        return Err(HarnessError::NoVisibleTransfer(format!(
            "primary balance unchanged at {} wei",
            primary_final.value_wei
        )));
    }
    Ok(())
}

/// Fee a receipt says its sender paid. Exact checks cannot guess a zero here.
fn gas_paid(step: ProtocolState, receipt: &TransferReceipt) -> Result<U256, HarnessError> {
    match (receipt.gas_used, receipt.effective_gas_price) {
        (Some(used), Some(price)) => Ok(U256::from(used) * price),
        (None, _) => Err(HarnessError::MissingGasData {
            step,
            field: "gasUsed",
        }),
        (Some(_), None) => Err(HarnessError::MissingGasData {
            step,
            field: "effectiveGasPrice",
        }),
    }
}

fn check_exact(
    settings: &ProtocolSettings,
    primary_initial: &BalanceSnapshot,
    funded: &BalanceSnapshot,
    final_balances: &[BalanceSnapshot],
    fund_receipt: &TransferReceipt,
    return_receipt: &TransferReceipt,
) -> Result<(), HarnessError> {
    let (primary_final, identity_final) = (&final_balances[0], &final_balances[1]);
    let fund_gas = gas_paid(ProtocolState::Fund, fund_receipt)?;
    let return_gas = gas_paid(ProtocolState::ReturnTransfer, return_receipt)?;

    let expected_identity = funded
        .value_wei
        .checked_sub(settings.return_wei + return_gas)
        .unwrap_or_default();
    if identity_final.value_wei != expected_identity {
        return Err(mismatch(
            "final",
            identity_final.address,
            expected_identity,
            identity_final.value_wei,
        ));
    }
    let expected_primary = (primary_initial.value_wei + settings.return_wei)
        .checked_sub(settings.fund_wei + fund_gas)
        .unwrap_or_default();
    if primary_final.value_wei != expected_primary {
        return Err(mismatch(
            "final",
            primary_final.address,
            expected_primary,
            primary_final.value_wei,
        ));
    }
    Ok(())
}
