//! Reusable per-caller processing state.

use crate::eid::Eid;
use crate::policy::PolicySearchCache;

/// An administrative report scheduled by a `reportReasonCode` action.
///
/// Transporting the report is the embedding node's concern; the processor
/// only records what was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReport {
    /// The configured reason code.
    pub reason_code: u64,
    /// The source of the affected bundle.
    pub bundle_source: Eid,
    /// The block number of the affected security target.
    pub security_target: u64,
}

/// Scratch state owned by one processing caller.
///
/// Holds the per-role search caches for the repeated-query hot path and
/// the byte buffers the crypto pipeline assembles into, so that per-bundle
/// processing does not reallocate. Not shared across threads.
#[derive(Debug, Default)]
pub struct ProcessingContext {
    pub(crate) source_cache: PolicySearchCache,
    pub(crate) acceptor_cache: PolicySearchCache,
    pub(crate) verifier_cache: PolicySearchCache,

    pub(crate) aad: Vec<u8>,
    pub(crate) ippt: Vec<u8>,
    pub(crate) iv: Vec<u8>,
    pub(crate) scratch: Vec<u8>,

    pending_reports: Vec<PendingReport>,
    storage_requested: bool,
}

impl ProcessingContext {
    /// Creates an empty processing context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True when a `requestBundleStorage` action fired since the last
    /// [`Self::take_storage_request`].
    #[must_use]
    pub fn storage_requested(&self) -> bool {
        self.storage_requested
    }

    /// Clears and returns the storage-request flag.
    pub fn take_storage_request(&mut self) -> bool {
        std::mem::take(&mut self.storage_requested)
    }

    /// Drains the reports scheduled by `reportReasonCode` actions.
    pub fn take_pending_reports(&mut self) -> Vec<PendingReport> {
        std::mem::take(&mut self.pending_reports)
    }

    pub(crate) fn schedule_report(&mut self, report: PendingReport) {
        self.pending_reports.push(report);
    }

    pub(crate) fn request_storage(&mut self) {
        self.storage_requested = true;
    }
}
