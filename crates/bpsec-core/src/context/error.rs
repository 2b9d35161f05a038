//! Cryptographic error types.

use thiserror::Error;

/// Errors from the security-context primitives.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum CryptoError {
    /// Tag or MAC verification failed. Carries no further detail.
    #[error("authentication failed")]
    AuthFail,

    /// The key length does not match the configured variant.
    #[error("key is {actual} bytes, variant requires {expected}")]
    KeyLength {
        /// Required key length in bytes.
        expected: usize,
        /// Actual key length in bytes.
        actual: usize,
    },

    /// The IV length is not supported by the AEAD layer.
    #[error("unsupported IV length: {len} bytes")]
    UnsupportedIvLength {
        /// The offending IV length.
        len: usize,
    },

    /// A required context parameter was absent from policy or block.
    #[error("missing security context parameter: {name}")]
    MissingParameter {
        /// The parameter's config name.
        name: &'static str,
    },

    /// A parameter was present but carried an unusable value.
    #[error("invalid security context parameter: {name}")]
    BadParameter {
        /// The parameter's config name.
        name: &'static str,
    },

    /// The security block named a context this node does not implement.
    #[error("unsupported security context id: {id}")]
    UnsupportedContext {
        /// The wire context identifier.
        id: u64,
    },
}

impl CryptoError {
    /// True for the misconfiguration class (everything except a plain
    /// authentication failure), which routes to the `sopMisconfigured*`
    /// events on the incoming path.
    #[must_use]
    pub fn is_misconfiguration(&self) -> bool {
        !matches!(self, Self::AuthFail)
    }
}
