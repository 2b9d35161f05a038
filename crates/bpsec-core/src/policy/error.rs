//! Policy-creation error types.

use thiserror::Error;

use crate::eid::PatternError;

/// Errors that can occur when creating a policy.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum PolicyError {
    /// One of the three endpoint patterns failed to parse.
    #[error(transparent)]
    BadSyntax(#[from] PatternError),

    /// The reserved role tag cannot be used for a policy.
    #[error("reserved role tag is not a valid policy role")]
    ReservedRole,
}
