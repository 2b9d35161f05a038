//! Bundle codec error types.

use thiserror::Error;

/// Errors from loading or editing a bundle.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum BundleError {
    /// The buffer ended before the bundle was complete.
    #[error("bundle is truncated")]
    Truncated,

    /// The buffer is not an indefinite-length CBOR array.
    #[error("bundle framing is not an indefinite-length array")]
    BadFraming,

    /// The primary block declared a version other than 7.
    #[error("unsupported bundle protocol version: {found}")]
    UnsupportedVersion {
        /// The declared version.
        found: u64,
    },

    /// An EID used a scheme other than `ipn`.
    #[error("unsupported EID scheme in {field}")]
    UnsupportedEidScheme {
        /// The field holding the foreign EID.
        field: &'static str,
    },

    /// A block field had the wrong CBOR shape.
    #[error("malformed {field}")]
    BadShape {
        /// The field that failed to decode.
        field: &'static str,
    },

    /// Fragmented bundles are not processed by this node.
    #[error("fragmented bundles are not supported")]
    FragmentUnsupported,

    /// An unknown CRC type code.
    #[error("unsupported CRC type: {value}")]
    UnsupportedCrcType {
        /// The declared CRC type code.
        value: u64,
    },

    /// A block's CRC did not match its content.
    #[error("CRC mismatch in block {block_number}")]
    CrcMismatch {
        /// The failing block's number (0 for the primary block).
        block_number: u64,
    },

    /// Two canonical blocks declared the same block number.
    #[error("duplicate block number: {number}")]
    DuplicateBlockNumber {
        /// The repeated number.
        number: u64,
    },

    /// The payload block must carry block number 1.
    #[error("payload block has number {found}, expected 1")]
    BadPayloadNumber {
        /// The declared number.
        found: u64,
    },

    /// A block referenced by number does not exist (or was removed).
    #[error("no such block: {number}")]
    NoSuchBlock {
        /// The missing block number.
        number: u64,
    },
}
