//! Bundle processors: apply, verify, and accept security operations.
//!
//! The outgoing processor acts in the `Source` role, inserting BIB/BCB
//! blocks per the resolved policy. The incoming processor walks every
//! security block in a received bundle, resolves a policy per operation
//! (`Acceptor` first, then `Verifier`), and runs the failure-event state
//! machine for every recognized anomaly. Both reuse a caller-owned
//! [`ProcessingContext`] for scratch buffers and per-role search caches.

mod context;
mod error;
mod incoming;
mod outgoing;

pub use context::{PendingReport, ProcessingContext};
pub use error::ProcessError;

pub(crate) use incoming::process_received;
pub(crate) use outgoing::process_outgoing;
