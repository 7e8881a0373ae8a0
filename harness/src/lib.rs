pub mod config;
pub mod error;
pub mod protocol;
pub mod report;

pub use config::{BalanceCheck, HarnessConfig, ProtocolSettings};
pub use error::HarnessError;
pub use protocol::{probe_accounts, ProtocolState, VerificationProtocol};
pub use report::{BalanceSnapshot, RunReport};
