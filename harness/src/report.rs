use primitive_types::U256;
use wallet::units::format_ether;
use wallet::{Address, TransferReceipt};

use crate::protocol::ProtocolState;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BalanceSnapshot {
    pub label: &'static str,
    pub address: Address,
    pub value_wei: U256,
}

impl BalanceSnapshot {
    pub fn new(label: &'static str, address: Address, value_wei: U256) -> Self {
        Self {
            label,
            address,
            value_wei,
        }
    }
}

/// Renders a titled balance block in ether.
pub fn balance_block(title: &str, snapshots: &[BalanceSnapshot]) -> String {
    let mut out = format!("{title}\n{}\n", "=".repeat(title.len()));
    for snapshot in snapshots {
        out.push_str(&format!(
            "{}: {} ETH ({})\n",
            snapshot.label,
            format_ether(snapshot.value_wei),
            snapshot.address
        ));
    }
    out
}

/// Writes progress lines to stdout when enabled.
#[derive(Clone, Copy, Debug)]
pub struct Console {
    enabled: bool,
}

impl Console {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn line(&self, text: impl AsRef<str>) {
        if self.enabled {
            println!("{}", text.as_ref());
        }
    }

    pub fn balances(&self, title: &str, snapshots: &[BalanceSnapshot]) {
        if self.enabled {
            print!("{}", balance_block(title, snapshots));
        }
    }
}

/// Everything observed during one successful run.
#[derive(Clone, Debug)]
pub struct RunReport {
    pub visited: Vec<ProtocolState>,
    pub identity: Address,
    pub primary: Address,
    pub initial: Vec<BalanceSnapshot>,
    pub funded: BalanceSnapshot,
    pub final_balances: Vec<BalanceSnapshot>,
    pub fund_receipt: TransferReceipt,
    pub return_receipt: TransferReceipt,
    pub probe_accounts: Vec<Address>,
}
