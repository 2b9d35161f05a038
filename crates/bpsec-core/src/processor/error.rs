//! Processor error types.

use thiserror::Error;

use crate::bundle::BundleError;
use crate::context::CryptoError;

/// Errors surfaced by bundle processing.
///
/// On the incoming path every per-operation anomaly is consumed by the
/// failure-event state machine; [`ProcessError::Drop`] is the only variant
/// a receiver sees. The structural and cryptographic variants occur on the
/// outgoing path, where the node is producing new security blocks and a
/// failure is a local configuration problem rather than a peer's.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProcessError {
    /// The bundle must not be forwarded.
    #[error("bundle must not be forwarded")]
    Drop,

    /// The bundle could not be edited (outgoing path).
    #[error(transparent)]
    Bundle(#[from] BundleError),

    /// A security operation could not be produced (outgoing path).
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}
