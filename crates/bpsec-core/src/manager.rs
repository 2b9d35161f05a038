//! The policy manager: the single owner of policies, event sets, and keys.

use std::path::Path;

use crate::bundle::BundleView;
use crate::config::{BpSecConfig, ConfigError};
use crate::context::KeyStore;
use crate::eid::Eid;
use crate::events::{EventSetId, FailureEventSet};
use crate::policy::{
    Policy, PolicyError, PolicyId, PolicySearchCache, PolicyStore, SecurityRole,
};
use crate::processor::{self, ProcessError, ProcessingContext};

/// The security-policy decision and enforcement core of one BPv7 node.
///
/// A manager is populated once by [`PolicyManager::load_from_config`] and
/// immutable thereafter; bundle processing only reads it. One manager
/// serves one thread; run independent instances for parallelism.
#[derive(Debug)]
pub struct PolicyManager {
    store: PolicyStore,
    event_sets: Vec<FailureEventSet>,
    key_store: KeyStore,
}

impl Default for PolicyManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyManager {
    /// Creates an empty manager.
    ///
    /// Slot 0 of the event-set table is an unnamed empty set, the fallback
    /// for policies created outside config load; every event resolves to no
    /// actions under it.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: PolicyStore::new(),
            event_sets: vec![FailureEventSet::default()],
            key_store: KeyStore::new(),
        }
    }

    /// Populates the manager from a parsed configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] (and leaves the manager unusable for
    /// processing) when any pattern, parameter, key file, or event-set
    /// reference is invalid.
    pub fn load_from_config(&mut self, config: &BpSecConfig) -> Result<(), ConfigError> {
        crate::config::load(self, config)
    }

    /// The policy store.
    #[must_use]
    pub fn store(&self) -> &PolicyStore {
        &self.store
    }

    /// Creates or fetches the policy for `(patterns, role)`; see
    /// [`PolicyStore::create_or_get`].
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] for malformed patterns or the reserved role.
    pub fn create_or_get_policy(
        &mut self,
        security_source: &str,
        bundle_source: &str,
        bundle_final_dest: &str,
        role: SecurityRole,
    ) -> Result<(PolicyId, bool), PolicyError> {
        self.store
            .create_or_get(security_source, bundle_source, bundle_final_dest, role)
    }

    /// Resolves a concrete query to the most specific policy.
    #[must_use]
    pub fn find_policy(
        &self,
        security_source: Eid,
        bundle_source: Eid,
        bundle_final_dest: Eid,
        role: SecurityRole,
    ) -> Option<PolicyId> {
        self.store
            .find(security_source, bundle_source, bundle_final_dest, role)
    }

    /// [`Self::find_policy`] through a caller-owned single-slot cache.
    #[must_use]
    pub fn find_policy_with_cache(
        &self,
        security_source: Eid,
        bundle_source: Eid,
        bundle_final_dest: Eid,
        role: SecurityRole,
        cache: &mut PolicySearchCache,
    ) -> Option<PolicyId> {
        self.store.find_with_cache(
            security_source,
            bundle_source,
            bundle_final_dest,
            role,
            cache,
        )
    }

    /// The event set behind a handle, falling back to the empty set for
    /// stale handles.
    #[must_use]
    pub fn event_set(&self, id: EventSetId) -> &FailureEventSet {
        self.event_sets.get(id.0).unwrap_or(&self.event_sets[0])
    }

    /// Looks an event set up by its configured name.
    #[must_use]
    pub fn event_set_by_name(&self, name: &str) -> Option<EventSetId> {
        self.event_sets
            .iter()
            .position(|s| !s.name.is_empty() && s.name == name)
            .map(EventSetId)
    }

    /// Applies the matching `Source` policy to an outgoing bundle; returns
    /// whether the bundle was modified.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError`] when a matched policy cannot be applied
    /// (local key or parameter problems).
    pub fn process_outgoing_bundle(
        &self,
        view: &mut BundleView,
        ctx: &mut ProcessingContext,
        this_node: Eid,
    ) -> Result<bool, ProcessError> {
        processor::process_outgoing(self, view, ctx, this_node)
    }

    /// Accepts and verifies the security operations of a received bundle.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Drop`] when the bundle must not be
    /// forwarded; every other anomaly is consumed by the configured
    /// failure-event actions.
    pub fn process_received_bundle(
        &self,
        view: &mut BundleView,
        ctx: &mut ProcessingContext,
    ) -> Result<(), ProcessError> {
        processor::process_received(self, view, ctx)
    }

    /// The key bytes backing a policy's `keyFile` parameter.
    pub(crate) fn key_for(&self, policy: &Policy) -> Option<&[u8]> {
        policy
            .params
            .key_file
            .as_deref()
            .and_then(|path| self.key_store.get(path))
    }

    /// Raw key bytes for a loaded key file path.
    pub(crate) fn key_bytes(&self, path: &Path) -> Option<&[u8]> {
        self.key_store.get(path)
    }

    pub(crate) fn store_mut(&mut self) -> &mut PolicyStore {
        &mut self.store
    }

    pub(crate) fn push_event_set(&mut self, set: FailureEventSet) -> EventSetId {
        self.event_sets.push(set);
        EventSetId(self.event_sets.len() - 1)
    }

    pub(crate) fn load_key(&mut self, path: &Path) -> Result<(), crate::context::KeyStoreError> {
        self.key_store.load(path)
    }
}
