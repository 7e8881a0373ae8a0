use std::cmp::min;

use crate::hashes::keccak256_concat;

/// Expand the provided input into a deterministic byte vector of the requested length.
pub fn expand_to_length(domain: &[u8], input: &[u8], length: usize) -> Vec<u8> {
    let mut counter = 0u32;
    let mut output = Vec::with_capacity(length);
    while output.len() < length {
        let digest = keccak256_concat(&[domain, &counter.to_be_bytes(), input]);
        let take = min(length - output.len(), digest.len());
        output.extend_from_slice(&digest[..take]);
        counter = counter.checked_add(1).expect("counter overflow");
    }
    output
}
