use sha3::{Digest, Keccak256};

pub const KECCAK_EMPTY: [u8; 32] = [
    0xc5, 0xd2, 0x46, 0x01, 0x86, 0xf7, 0x23, 0x3c, 0x92, 0x7e, 0x7d, 0xb2, 0xdc, 0xc7, 0x03, 0xc0,
    0xe5, 0x00, 0xb6, 0x53, 0xca, 0x82, 0x27, 0x3b, 0x7b, 0xfa, 0xd8, 0x04, 0x5d, 0x85, 0xa4, 0x70,
];

const PERSONAL_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

pub fn keccak256_concat(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Digest signed by `personal_sign`: the message is prefixed with its decimal length.
pub fn personal_message_hash(message: &[u8]) -> [u8; 32] {
    let prefix = format!("{PERSONAL_MESSAGE_PREFIX}{}", message.len());
    keccak256_concat(&[prefix.as_bytes(), message])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keccak_of_empty_input() {
        assert_eq!(keccak256(&[]), KECCAK_EMPTY);
    }

    #[test]
    fn concat_matches_single_buffer() {
        let joined = keccak256(b"hello world");
        assert_eq!(keccak256_concat(&[b"hello", b" ", b"world"]), joined);
    }

    #[test]
    fn personal_hash_is_prefixed() {
        let expected = keccak256(b"\x19Ethereum Signed Message:\n5hello");
        assert_eq!(personal_message_hash(b"hello"), expected);
    }
}
