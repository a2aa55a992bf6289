use thiserror::Error;

#[derive(Debug, Error)]
pub enum MerkleError {
    #[error("bundle header truncated: need at least {need} bytes, have {have}")]
    BundleHeaderTruncated { need: usize, have: usize },

    #[error("bundle item count overflowed a usize")]
    ItemCountOverflow,

    #[error("32-byte size field at {field} has non-zero padding above the low 8 bytes")]
    NonZeroSizePadding { field: &'static str },

    #[error("data item header truncated at field {field}: need {need} bytes, have {have}")]
    DataItemHeaderTruncated {
        field: &'static str,
        need: usize,
        have: usize,
    },

    #[error("unknown signature type {0}")]
    UnknownSignatureType(u16),

    #[error("tag section declared {declared} bytes but avro decoding consumed {consumed}")]
    TagSectionLengthMismatch { declared: u64, consumed: u64 },

    #[error("malformed avro tag encoding: {0}")]
    MalformedTags(String),

    #[error("proof buffer shorter than one leaf node ({0} bytes)")]
    ProofTooShort(usize),

    #[error("branch proof hash mismatch at depth {depth}")]
    BranchHashMismatch { depth: usize },

    #[error("leaf proof hash mismatch")]
    LeafHashMismatch,

    #[error("leaf data_hash does not match the supplied chunk hash")]
    LeafDataMismatch,
}
