use ario_gateway_primitives::HASH_SIZE;
use sha2::{Digest, Sha256};

pub fn hash_sha256(message: &[u8]) -> [u8; HASH_SIZE] {
    let mut hasher = Sha256::new();
    hasher.update(message);
    hasher.finalize().into()
}

/// SHA-256 of the concatenation of the SHA-256 hashes of each message, the
/// combining step used at every level of an Arweave Merkle tree.
pub fn hash_all_sha256(messages: &[&[u8]]) -> [u8; HASH_SIZE] {
    let mut concatenated = Vec::with_capacity(messages.len() * HASH_SIZE);
    for m in messages {
        concatenated.extend_from_slice(&hash_sha256(m));
    }
    hash_sha256(&concatenated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_all_differs_from_plain_concatenation_hash() {
        let a = hash_all_sha256(&[b"left", b"right"]);
        let b = hash_sha256(&[b"left".as_slice(), b"right".as_slice()].concat());
        assert_ne!(a, b);
    }
}
