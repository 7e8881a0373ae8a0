//! secp256k1 recoverable ECDSA
//!
//! Thin wrapper around the `k256` crate exposing exactly what account-based
//! transaction signing needs: prehash signing with a recovery id, public key
//! recovery, and the keccak-derived 20-byte account identifier.

use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;

use crate::deterministic::expand_to_length;
use crate::error::CryptoError;
use crate::hashes::keccak256;
use crate::traits::{
    RecoverableSignature as RecoverableTrait, Signature as SigTrait,
    SigningKey as SigningKeyTrait, VerifyKey,
};

pub const SECRET_KEY_LEN: usize = 32;
pub const UNCOMPRESSED_PUBLIC_KEY_LEN: usize = 65;
pub const SIGNATURE_LEN: usize = 65;
pub const ACCOUNT_ID_LEN: usize = 20;

/// 65-byte `r || s || recovery_id` signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Secp256k1Signature {
    bytes: [u8; SIGNATURE_LEN],
}

impl Secp256k1Signature {
    pub fn from_parts(r: [u8; 32], s: [u8; 32], recovery_id: u8) -> Result<Self, CryptoError> {
        if recovery_id > 1 {
            return Err(CryptoError::InvalidRecoveryId(recovery_id));
        }
        let mut bytes = [0u8; SIGNATURE_LEN];
        bytes[..32].copy_from_slice(&r);
        bytes[32..64].copy_from_slice(&s);
        bytes[64] = recovery_id;
        Ok(Self { bytes })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != SIGNATURE_LEN {
            return Err(CryptoError::InvalidLength {
                expected: SIGNATURE_LEN,
                actual: bytes.len(),
            });
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Self::from_parts(r, s, bytes[64])
    }

    pub fn r(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.bytes[..32]);
        out
    }

    pub fn s(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.bytes[32..64]);
        out
    }

    pub fn recovery_id(&self) -> u8 {
        self.bytes[64]
    }

    pub fn to_bytes(&self) -> [u8; SIGNATURE_LEN] {
        self.bytes
    }

    fn to_inner(&self) -> Result<(EcdsaSignature, RecoveryId), CryptoError> {
        let signature = EcdsaSignature::from_slice(&self.bytes[..64])
            .map_err(|_| CryptoError::InvalidSignature)?;
        let recovery_id = RecoveryId::from_byte(self.recovery_id())
            .ok_or(CryptoError::InvalidRecoveryId(self.recovery_id()))?;
        Ok((signature, recovery_id))
    }
}

impl core::fmt::Debug for Secp256k1Signature {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Secp256k1Signature(0x{})", hex::encode(self.bytes))
    }
}

impl SigTrait for Secp256k1Signature {
    fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl RecoverableTrait for Secp256k1Signature {
    type VerifyKey = Secp256k1PublicKey;

    fn recover(&self, prehash: &[u8; 32]) -> Result<Secp256k1PublicKey, CryptoError> {
        let (signature, recovery_id) = self.to_inner()?;
        let inner = VerifyingKey::recover_from_prehash(prehash, &signature, recovery_id)
            .map_err(|_| CryptoError::RecoveryFailed)?;
        Ok(Secp256k1PublicKey { inner })
    }
}

/// secp256k1 public key (verification key)
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Secp256k1PublicKey {
    inner: VerifyingKey,
}

impl Secp256k1PublicKey {
    pub fn to_uncompressed(&self) -> [u8; UNCOMPRESSED_PUBLIC_KEY_LEN] {
        let point = self.inner.to_encoded_point(false);
        let mut out = [0u8; UNCOMPRESSED_PUBLIC_KEY_LEN];
        out.copy_from_slice(point.as_bytes());
        out
    }

    /// Low 20 bytes of keccak-256 over the uncompressed point without its tag byte.
    pub fn account_id(&self) -> [u8; ACCOUNT_ID_LEN] {
        let uncompressed = self.to_uncompressed();
        let digest = keccak256(&uncompressed[1..]);
        let mut out = [0u8; ACCOUNT_ID_LEN];
        out.copy_from_slice(&digest[32 - ACCOUNT_ID_LEN..]);
        out
    }

    pub fn verify_prehash(
        &self,
        prehash: &[u8; 32],
        signature: &Secp256k1Signature,
    ) -> Result<(), CryptoError> {
        let (sig, _) = signature.to_inner()?;
        self.inner
            .verify_prehash(prehash, &sig)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}

impl core::fmt::Debug for Secp256k1PublicKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "Secp256k1PublicKey(0x{})",
            hex::encode(self.to_uncompressed())
        )
    }
}

impl VerifyKey for Secp256k1PublicKey {
    type Signature = Secp256k1Signature;

    fn verify(&self, message: &[u8], signature: &Self::Signature) -> Result<(), CryptoError> {
        self.verify_prehash(&keccak256(message), signature)
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.to_uncompressed().to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let inner = VerifyingKey::from_sec1_bytes(bytes).map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self { inner })
    }
}

/// secp256k1 secret key (signing key).
#[derive(Clone)]
pub struct Secp256k1SecretKey {
    inner: SigningKey,
}

impl Secp256k1SecretKey {
    pub fn generate() -> Self {
        Self {
            inner: SigningKey::random(&mut OsRng),
        }
    }

    pub fn to_array(&self) -> [u8; SECRET_KEY_LEN] {
        self.inner.to_bytes().into()
    }

    pub fn public_key(&self) -> Secp256k1PublicKey {
        Secp256k1PublicKey {
            inner: *self.inner.verifying_key(),
        }
    }

    pub fn sign_prehash(&self, prehash: &[u8; 32]) -> Result<Secp256k1Signature, CryptoError> {
        let (signature, recovery_id) = self
            .inner
            .sign_prehash_recoverable(prehash)
            .map_err(|err| CryptoError::SigningFailed(err.to_string()))?;
        let bytes = signature.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);
        Secp256k1Signature::from_parts(r, s, recovery_id.to_byte())
    }
}

impl core::fmt::Debug for Secp256k1SecretKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Secp256k1SecretKey").finish_non_exhaustive()
    }
}

impl PartialEq for Secp256k1SecretKey {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl Eq for Secp256k1SecretKey {}

impl SigningKeyTrait for Secp256k1SecretKey {
    type VerifyKey = Secp256k1PublicKey;
    type Signature = Secp256k1Signature;

    fn generate_deterministic(seed: &[u8]) -> Self {
        // a scalar outside [1, n) is astronomically rare; retry with a new counter
        let mut counter = 0u32;
        loop {
            let mut material = seed.to_vec();
            material.extend_from_slice(&counter.to_be_bytes());
            let bytes = expand_to_length(b"secp256k1-keygen", &material, SECRET_KEY_LEN);
            if let Ok(inner) = SigningKey::from_slice(&bytes) {
                return Self { inner };
            }
            counter += 1;
        }
    }

    fn sign(&self, message: &[u8]) -> Result<Self::Signature, CryptoError> {
        self.sign_prehash(&keccak256(message))
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.to_array().to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != SECRET_KEY_LEN {
            return Err(CryptoError::InvalidLength {
                expected: SECRET_KEY_LEN,
                actual: bytes.len(),
            });
        }
        let inner = SigningKey::from_slice(bytes).map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self { inner })
    }

    fn verify_key(&self) -> Self::VerifyKey {
        self.public_key()
    }
}
