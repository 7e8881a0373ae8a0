use std::fmt;

use crypto::hashes::personal_message_hash;
use crypto::secp256k1::{Secp256k1SecretKey, SIGNATURE_LEN};
use crypto::traits::SigningKey;

use crate::address::Address;
use crate::error::WalletError;
use crate::transaction::{LegacyTransaction, SignedTransaction};

/// An address together with the only capability able to sign for it.
///
/// Generated fresh for every run and never persisted. The secret key zeroizes
/// itself on drop and never appears in `Debug` output.
#[derive(Clone)]
pub struct SigningIdentity {
    address: Address,
    secret: Secp256k1SecretKey,
}

impl SigningIdentity {
    pub fn generate() -> Self {
        Self::from_secret(Secp256k1SecretKey::generate())
    }

    pub fn from_secret(secret: Secp256k1SecretKey) -> Self {
        let address = Address::from_public_key(&secret.public_key());
        Self { address, secret }
    }

    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, WalletError> {
        Ok(Self::from_secret(Secp256k1SecretKey::from_bytes(bytes)?))
    }

    /// Deterministic identity for reproducible fixtures.
    pub fn from_seed(seed: &[u8]) -> Self {
        Self::from_secret(Secp256k1SecretKey::generate_deterministic(seed))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn sign_transaction(
        &self,
        transaction: LegacyTransaction,
    ) -> Result<SignedTransaction, WalletError> {
        transaction.sign(&self.secret)
    }

    /// EIP-191 `personal_sign` signature with `v` in 27/28 form.
    pub fn sign_message(&self, message: &[u8]) -> Result<[u8; SIGNATURE_LEN], WalletError> {
        let signature = self.secret.sign_prehash(&personal_message_hash(message))?;
        let mut out = signature.to_bytes();
        out[SIGNATURE_LEN - 1] += 27;
        Ok(out)
    }
}

impl fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
