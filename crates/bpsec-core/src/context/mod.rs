//! Security contexts: cryptographic primitives and their parameters.
//!
//! Two context families are implemented, matching RFC 9173: BCB-AES-GCM for
//! confidentiality and BIB-HMAC-SHA2 for integrity. The processors hand the
//! primitives a key resolved from the [`KeyStore`], an AAD assembled from
//! the policy's [`ScopeFlags`], and the target block bytes; everything else
//! (IVs, tags, digests) travels inside the security blocks.
//!
//! Authentication failures are reported as [`CryptoError::AuthFail`] with
//! no further detail: a wrong key, a flipped ciphertext bit, and a
//! mismatched AAD must stay indistinguishable to the peer.

pub mod aes;
mod error;
mod keys;
pub mod mac;
mod params;
mod scope;

pub use error::CryptoError;
pub use keys::{KeyStore, KeyStoreError};
pub use params::{AesVariant, SecurityContextParams, ShaVariant};
pub use scope::ScopeFlags;

/// RFC 9173 security context identifier for BIB-HMAC-SHA2.
pub const BIB_HMAC_SHA2_ID: u64 = 1;

/// RFC 9173 security context identifier for BCB-AES-GCM.
pub const BCB_AES_GCM_ID: u64 = 2;
