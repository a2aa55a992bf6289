//! Builds a Merkle data root from raw payload bytes (spec §4.6 "Background
//! verification worker"), the inverse of [`crate::path::validate_path`]:
//! rather than proving one chunk against a trusted root, it rebuilds the
//! whole tree and returns the root that a correct producer would have
//! published as `data_root`.
//!
//! Chunking follows Arweave's rule of thumb: chunks are `MAX_CHUNK_SIZE`
//! bytes except the tail, which is folded into the second-to-last chunk
//! rather than left under `MIN_CHUNK_SIZE`. Node encoding matches
//! `path.rs`: a leaf's id is `hash(data_hash || note(end_offset))`, a
//! branch's id is `hash(left_id || right_id || note(left.end_offset))`,
//! and an odd node at any level is carried up unchanged.

use ario_gateway_primitives::HASH_SIZE;

use crate::hashing::{hash_all_sha256, hash_sha256};
use crate::path::to_note;

pub const MAX_CHUNK_SIZE: usize = 256 * 1024;
pub const MIN_CHUNK_SIZE: usize = 32 * 1024;

struct Node {
    id: [u8; HASH_SIZE],
    end_offset: u64,
}

fn chunk_bounds(len: usize) -> Vec<(usize, usize)> {
    let mut bounds = Vec::new();
    let mut cursor = 0_usize;
    let mut rest = len;

    while rest >= MAX_CHUNK_SIZE {
        let mut chunk_size = MAX_CHUNK_SIZE;
        let remainder_after = rest - MAX_CHUNK_SIZE;
        if remainder_after > 0 && remainder_after < MIN_CHUNK_SIZE {
            chunk_size = rest.div_ceil(2);
        }
        bounds.push((cursor, cursor + chunk_size));
        cursor += chunk_size;
        rest -= chunk_size;
    }
    bounds.push((cursor, cursor + rest));
    bounds
}

/// Computes the Merkle data root a compliant producer would publish for
/// `data`, for comparison against the trusted `data_root` from the chain.
#[must_use]
pub fn compute_data_root(data: &[u8]) -> [u8; HASH_SIZE] {
    let leaves: Vec<Node> = chunk_bounds(data.len())
        .into_iter()
        .map(|(start, end)| {
            let data_hash = hash_sha256(&data[start..end]);
            let end_offset = end as u64;
            let id = hash_all_sha256(&[&data_hash, &to_note(end_offset)]);
            Node { id, end_offset }
        })
        .collect();

    build_root(leaves)
}

fn build_root(nodes: Vec<Node>) -> [u8; HASH_SIZE] {
    let mut level = nodes;
    loop {
        if level.len() <= 1 {
            return level
                .into_iter()
                .next()
                .expect("chunk_bounds always yields at least one chunk")
                .id;
        }

        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        let mut iter = level.into_iter();
        while let Some(left) = iter.next() {
            match iter.next() {
                Some(right) => {
                    let id = hash_all_sha256(&[&left.id, &right.id, &to_note(left.end_offset)]);
                    next.push(Node { id, end_offset: right.end_offset });
                }
                None => next.push(left),
            }
        }
        level = next;
    }
}
