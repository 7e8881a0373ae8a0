//! Hex quantity and data encodings used by the JSON-RPC wire format.

use crate::error::WalletError;

pub fn encode_u64(value: u64) -> String {
    format!("{value:#x}")
}

pub fn parse_u64(text: &str) -> Result<u64, WalletError> {
    let body = text
        .strip_prefix("0x")
        .ok_or_else(|| WalletError::Serialization(format!("quantity without 0x: {text}")))?;
    if body.is_empty() {
        return Err(WalletError::Serialization("empty quantity".into()));
    }
    u64::from_str_radix(body, 16).map_err(|err| WalletError::Serialization(err.to_string()))
}

pub fn encode_bytes(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

pub fn parse_bytes(text: &str) -> Result<Vec<u8>, WalletError> {
    let body = text
        .strip_prefix("0x")
        .ok_or_else(|| WalletError::Serialization(format!("data without 0x: {text}")))?;
    hex::decode(body).map_err(|err| WalletError::Serialization(err.to_string()))
}

/// Accepts `"0x1f"` or a plain JSON number.
pub mod u64_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wire {
        Text(String),
        Number(u64),
    }

    pub fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::encode_u64(*value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Wire::deserialize(deserializer)? {
            Wire::Text(text) => super::parse_u64(&text).map_err(serde::de::Error::custom),
            Wire::Number(value) => Ok(value),
        }
    }
}

pub mod option_u64_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(value) => super::u64_hex::serialize(value, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Wrapper(#[serde(with = "super::u64_hex")] u64);

        let wrapped: Option<Wrapper> = Option::deserialize(deserializer)?;
        Ok(wrapped.map(|Wrapper(value)| value))
    }
}

pub mod option_bytes_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(bytes) => serializer.serialize_str(&super::encode_bytes(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text: Option<String> = Option::deserialize(deserializer)?;
        text.map(|text| super::parse_bytes(&text).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// Receipt status: `"0x1"`/`"0x0"` on the wire, booleans from older nodes.
pub mod status {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wire {
        Flag(bool),
        Text(String),
    }

    pub fn serialize<S>(value: &bool, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(if *value { "0x1" } else { "0x0" })
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Wire::deserialize(deserializer)? {
            Wire::Flag(flag) => Ok(flag),
            Wire::Text(text) => match super::parse_u64(&text).map_err(serde::de::Error::custom)? {
                0 => Ok(false),
                1 => Ok(true),
                other => Err(serde::de::Error::custom(format!(
                    "unexpected receipt status {other}"
                ))),
            },
        }
    }
}
