pub mod deterministic;
pub mod error;
pub mod hashes;
pub mod secp256k1;
pub mod traits;

pub use error::CryptoError;
