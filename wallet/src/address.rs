use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crypto::hashes::keccak256;
use crypto::secp256k1::{Secp256k1PublicKey, ACCOUNT_ID_LEN};

use crate::error::WalletError;

/// 20-byte account address. Displays in EIP-55 mixed-case checksum form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; ACCOUNT_ID_LEN]);

impl Address {
    pub const fn from_bytes(bytes: [u8; ACCOUNT_ID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, WalletError> {
        if bytes.len() != ACCOUNT_ID_LEN {
            return Err(WalletError::InvalidAddress(format!(
                "expected {ACCOUNT_ID_LEN} bytes, found {}",
                bytes.len()
            )));
        }
        let mut out = [0u8; ACCOUNT_ID_LEN];
        out.copy_from_slice(bytes);
        Ok(Self(out))
    }

    pub fn from_public_key(key: &Secp256k1PublicKey) -> Self {
        Self(key.account_id())
    }

    pub fn as_bytes(&self) -> &[u8; ACCOUNT_ID_LEN] {
        &self.0
    }

    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let digest = keccak256(lower.as_bytes());
        let mut out = String::with_capacity(2 + lower.len());
        out.push_str("0x");
        for (idx, ch) in lower.chars().enumerate() {
            let nibble = if idx % 2 == 0 {
                digest[idx / 2] >> 4
            } else {
                digest[idx / 2] & 0x0f
            };
            if ch.is_ascii_alphabetic() && nibble >= 8 {
                out.push(ch.to_ascii_uppercase());
            } else {
                out.push(ch);
            }
        }
        out
    }

    /// Parses `0x`-prefixed hex. All-lower and all-upper input is accepted as is;
    /// mixed case must carry a valid checksum.
    pub fn parse(text: &str) -> Result<Self, WalletError> {
        let body = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
            .ok_or_else(|| WalletError::InvalidAddress(format!("missing 0x prefix: {text}")))?;
        if body.len() != ACCOUNT_ID_LEN * 2 {
            return Err(WalletError::InvalidAddress(format!(
                "expected 40 hex digits, found {}",
                body.len()
            )));
        }
        let bytes =
            hex::decode(body).map_err(|err| WalletError::InvalidAddress(err.to_string()))?;
        let address = Self::from_slice(&bytes)?;
        let has_lower = body.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = body.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper && address.to_checksum()[2..] != *body {
            return Err(WalletError::InvalidAddress(format!("bad checksum: {text}")));
        }
        Ok(address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_checksum())
    }
}

impl FromStr for Address {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_checksum())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHECKSUMMED: [&str; 4] = [
        "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
        "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
        "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
        "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
    ];

    #[test]
    fn checksum_vectors() {
        for expected in CHECKSUMMED {
            let lower = expected.to_lowercase();
            let address = Address::parse(&lower).unwrap();
            assert_eq!(address.to_checksum(), expected);
            assert_eq!(Address::parse(expected).unwrap(), address);
        }
    }

    #[test]
    fn mixed_case_with_bad_checksum_is_rejected() {
        let tampered = "0x5AAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
        assert!(matches!(
            Address::parse(tampered),
            Err(WalletError::InvalidAddress(_))
        ));
    }

    #[test]
    fn wrong_length_and_prefix_are_rejected() {
        assert!(Address::parse("5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").is_err());
        assert!(Address::parse("0x5aaeb6053f3e94c9b9a09f33669435e7ef1bea").is_err());
    }

    #[test]
    fn serde_uses_checksum_form() {
        let address = Address::parse(CHECKSUMMED[1]).unwrap();
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, format!("\"{}\"", CHECKSUMMED[1]));
        let back: Address = serde_json::from_str(&json.to_lowercase()).unwrap();
        assert_eq!(back, address);
    }
}
