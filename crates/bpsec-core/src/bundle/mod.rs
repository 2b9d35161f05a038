//! Editable view over a serialized BPv7 bundle.
//!
//! The processors need to load a bundle into something they can inspect and
//! mutate: enumerate canonical blocks by type, encrypt block data in place,
//! insert freshly built security blocks, mark blocks removed, and render
//! the result back to contiguous bytes. [`BundleView`] provides exactly
//! that surface over the RFC 9171 wire format: an indefinite-length CBOR
//! array holding the primary block followed by the canonical blocks.
//!
//! Each canonical block carries an `is_encrypted` flag maintained by the
//! view: set at load time for every target of a decodable BCB, set by the
//! outgoing processor after encryption, and cleared by the acceptor after
//! decryption.

mod canonical;
mod crc;
mod error;
mod primary;
mod view;

pub use canonical::{CanonicalBlock, PAYLOAD_BLOCK_TYPE};
pub use crc::CrcType;
pub use error::BundleError;
pub use primary::{CreationTimestamp, PrimaryBlock};
pub use view::BundleView;
