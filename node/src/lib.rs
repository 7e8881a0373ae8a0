pub mod api;
pub mod config;
pub mod error;
pub mod state;
pub mod telemetry;

mod service;

pub use config::{ChainConfig, GenesisAccount};
pub use error::{NodeError, NodeResult};
pub use service::{ChainHandle, DevChain};
pub use telemetry::TelemetrySnapshot;
