use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[derive(Debug)]
pub struct Telemetry {
    start: Instant,
    requests: AtomicU64,
    rejected: AtomicU64,
    blocks: AtomicU64,
    transactions: AtomicU64,
    methods: RwLock<BTreeMap<String, u64>>,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl Telemetry {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            requests: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            blocks: AtomicU64::new(0),
            transactions: AtomicU64::new(0),
            methods: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn record_request(&self, method: &str) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        *self.methods.write().entry(method.to_string()).or_default() += 1;
    }

    pub fn record_rejection(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_block(&self, transactions: usize) {
        self.blocks.fetch_add(1, Ordering::Relaxed);
        self.transactions
            .fetch_add(transactions as u64, Ordering::Relaxed);
    }

    pub fn method_count(&self, method: &str) -> u64 {
        self.methods.read().get(method).copied().unwrap_or(0)
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            uptime_secs: self.start.elapsed().as_secs(),
            total_requests: self.requests.load(Ordering::Relaxed),
            rejected_requests: self.rejected.load(Ordering::Relaxed),
            mined_blocks: self.blocks.load(Ordering::Relaxed),
            mined_transactions: self.transactions.load(Ordering::Relaxed),
            methods: self.methods.read().clone(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub uptime_secs: u64,
    pub total_requests: u64,
    pub rejected_requests: u64,
    pub mined_blocks: u64,
    pub mined_transactions: u64,
    pub methods: BTreeMap<String, u64>,
}

impl TelemetrySnapshot {
    pub fn method_count(&self, method: &str) -> u64 {
        self.methods.get(method).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_requests_per_method() {
        let telemetry = Telemetry::new();
        telemetry.record_request("net_version");
        telemetry.record_request("net_version");
        telemetry.record_request("eth_accounts");
        telemetry.record_block(1);
        let snapshot = telemetry.snapshot();
        assert_eq!(snapshot.total_requests, 3);
        assert_eq!(snapshot.method_count("net_version"), 2);
        assert_eq!(snapshot.method_count("eth_sendTransaction"), 0);
        assert_eq!(snapshot.mined_blocks, 1);
        assert_eq!(snapshot.mined_transactions, 1);
    }
}
