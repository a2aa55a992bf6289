/// Key for the chunk byte store: `"d:" || absolute_offset_be(8)`.
pub fn data_key(absolute_offset: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(2 + 8);
    key.extend_from_slice(b"d:");
    key.extend_from_slice(&absolute_offset.to_be_bytes());
    key
}

/// Key for the metadata index keyed by `(data_root, relative_offset)`:
/// `"m:" || data_root(32) || relative_offset_be(8)`.
pub fn metadata_by_relative_key(data_root: &[u8; 32], relative_offset: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(2 + 32 + 8);
    key.extend_from_slice(b"m:");
    key.extend_from_slice(data_root);
    key.extend_from_slice(&relative_offset.to_be_bytes());
    key
}

/// Key for the secondary metadata index keyed by absolute weave offset:
/// `"a:" || absolute_offset_be(8)`.
pub fn metadata_by_absolute_key(absolute_offset: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(2 + 8);
    key.extend_from_slice(b"a:");
    key.extend_from_slice(&absolute_offset.to_be_bytes());
    key
}
