//! Merkle path validation for `data_path` (chunk against a transaction's
//! `data_root`, spec §4.1.3) and `tx_path` (transaction against a block's
//! `tx_root`, spec §4.1.4). Both use the same proof encoding: a sequence of
//! branch nodes from root to leaf followed by one leaf node.
//!
//! A branch node is `left_id(32) || right_id(32) || notepad(24) || offset(8,
//! big-endian)`; a leaf node is `data_hash(32) || notepad(24) || offset(8,
//! big-endian)`. The notepad exists so both node kinds hash to a fixed
//! 32-byte "note" slot regardless of offset magnitude.

use ario_gateway_primitives::HASH_SIZE;

use crate::error::MerkleError;
use crate::hashing::{hash_all_sha256, hash_sha256};

const NOTE_SIZE: usize = 32;
const LEAF_SIZE: usize = HASH_SIZE + NOTE_SIZE;
const BRANCH_SIZE: usize = HASH_SIZE * 2 + NOTE_SIZE;

pub struct PathValidation {
    pub leaf_hash: [u8; HASH_SIZE],
    pub left_bound: u64,
    pub right_bound: u64,
}

pub(crate) fn to_note(offset: u64) -> [u8; NOTE_SIZE] {
    let mut note = [0_u8; NOTE_SIZE];
    note[NOTE_SIZE - 8..].copy_from_slice(&offset.to_be_bytes());
    note
}

fn read_offset(note_and_offset: &[u8]) -> u64 {
    let mut buf = [0_u8; 8];
    buf.copy_from_slice(&note_and_offset[note_and_offset.len() - 8..]);
    u64::from_be_bytes(buf)
}

/// Validates a proof buffer against `root_hash`, returning the leaf's
/// `data_hash` and the `[left_bound, right_bound)` byte range it covers,
/// relative to the root. Used for both `data_path` (root = `data_root`) and
/// `tx_path` (root = `tx_root`) since the encoding is identical.
pub fn validate_path(
    root_hash: [u8; HASH_SIZE],
    path: &[u8],
    target_offset: u64,
) -> Result<PathValidation, MerkleError> {
    if path.len() < LEAF_SIZE {
        return Err(MerkleError::ProofTooShort(path.len()));
    }
    let (branches, leaf) = path.split_at(path.len() - LEAF_SIZE);
    if branches.len() % BRANCH_SIZE != 0 {
        return Err(MerkleError::ProofTooShort(path.len()));
    }

    let mut left_bound: u64 = 0;
    let mut expected_hash = root_hash;

    for (depth, raw) in branches.chunks_exact(BRANCH_SIZE).enumerate() {
        let left_id: [u8; HASH_SIZE] = raw[..HASH_SIZE].try_into().expect("32 bytes");
        let right_id: [u8; HASH_SIZE] =
            raw[HASH_SIZE..HASH_SIZE * 2].try_into().expect("32 bytes");
        let offset = read_offset(&raw[HASH_SIZE * 2..]);

        let path_hash = hash_all_sha256(&[&left_id, &right_id, &to_note(offset)]);
        if path_hash != expected_hash {
            return Err(MerkleError::BranchHashMismatch { depth });
        }

        let goes_right = target_offset > offset;
        if goes_right {
            left_bound = offset;
            expected_hash = right_id;
        } else {
            expected_hash = left_id;
        }
    }

    let data_hash: [u8; HASH_SIZE] = leaf[..HASH_SIZE].try_into().expect("32 bytes");
    let right_bound = read_offset(&leaf[HASH_SIZE..]);
    let leaf_hash = hash_all_sha256(&[&data_hash, &to_note(right_bound)]);
    if leaf_hash != expected_hash {
        return Err(MerkleError::LeafHashMismatch);
    }

    Ok(PathValidation {
        leaf_hash: data_hash,
        left_bound,
        right_bound,
    })
}

/// Validates that `chunk_hash` is the leaf referenced by `path` at
/// `target_offset`, used once a chunk's own `SHA-256(chunk) == chunk.hash`
/// check (spec §8 invariant 1) has already passed.
pub fn validate_chunk_against_path(
    root_hash: [u8; HASH_SIZE],
    path: &[u8],
    target_offset: u64,
    chunk_hash: [u8; HASH_SIZE],
) -> Result<PathValidation, MerkleError> {
    let result = validate_path(root_hash, path, target_offset)?;
    if result.leaf_hash != chunk_hash {
        return Err(MerkleError::LeafDataMismatch);
    }
    Ok(result)
}
