//! Security-operation failure events and their configured reactions.
//!
//! Every recognized security-operation outcome on the incoming path maps to
//! an event, and each policy references a named [`FailureEventSet`] that
//! binds events to an ordered list of [`EventAction`]s. The incoming
//! processor executes the full list in order; the ordered-list execution is
//! the contract, not the representation.

use serde::Deserialize;

use crate::policy::SecurityRole;

/// A recognized security-operation outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SecurityOperationEvent {
    /// A required operation was absent at a security acceptor.
    SopMissingAtAcceptor,
    /// A required operation was absent at a security verifier.
    SopMissingAtVerifier,
    /// Authentication failed (bad tag or MAC) at a security acceptor.
    SopCorruptedAtAcceptor,
    /// Authentication failed (bad tag or MAC) at a security verifier.
    SopCorruptedAtVerifier,
    /// Key or context parameters were unusable at a security acceptor.
    SopMisconfiguredAtAcceptor,
    /// Key or context parameters were unusable at a security verifier.
    SopMisconfiguredAtVerifier,
}

impl SecurityOperationEvent {
    /// Selects the role-appropriate "missing" event.
    #[must_use]
    pub fn missing_at(role: SecurityRole) -> Self {
        match role {
            SecurityRole::Verifier => Self::SopMissingAtVerifier,
            _ => Self::SopMissingAtAcceptor,
        }
    }

    /// Selects the role-appropriate "corrupted" event.
    #[must_use]
    pub fn corrupted_at(role: SecurityRole) -> Self {
        match role {
            SecurityRole::Verifier => Self::SopCorruptedAtVerifier,
            _ => Self::SopCorruptedAtAcceptor,
        }
    }

    /// Selects the role-appropriate "misconfigured" event.
    #[must_use]
    pub fn misconfigured_at(role: SecurityRole) -> Self {
        match role {
            SecurityRole::Verifier => Self::SopMisconfiguredAtVerifier,
            _ => Self::SopMisconfiguredAtAcceptor,
        }
    }
}

/// A configured reaction to a failed (or anomalous) security operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    /// Drop the failed operation from its security block; drop the block if
    /// it was the last operation.
    RemoveSecurityOperation,
    /// Drop the target block protected by the failed operation.
    RemoveSecurityOperationTargetBlock,
    /// Drop every operation protecting the same target, across all security
    /// blocks in the bundle.
    RemoveAllSecurityTargetOperations,
    /// Do not forward the bundle.
    FailBundleForwarding,
    /// Hand the bundle to the external persistence interface.
    RequestBundleStorage,
    /// Schedule an administrative status report with the given reason code.
    ReportReasonCode(u64),
    /// Replace the target block's block-processing-control-flags.
    OverrideTargetBpcf(u64),
    /// Replace the security block's block-processing-control-flags.
    OverrideSecurityBlockBpcf(u64),
}

/// A named mapping from events to ordered action lists.
#[derive(Debug, Clone, Default)]
pub struct FailureEventSet {
    /// The set's configured name, referenced by policy rules.
    pub name: String,
    /// Free-form operator description.
    pub description: String,
    bindings: Vec<(SecurityOperationEvent, Vec<EventAction>)>,
}

impl FailureEventSet {
    /// Creates an empty event set with the given name and description.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            bindings: Vec::new(),
        }
    }

    /// Binds an event to its ordered action list, replacing any previous
    /// binding for the same event.
    pub fn bind(&mut self, event: SecurityOperationEvent, actions: Vec<EventAction>) {
        if let Some(entry) = self.bindings.iter_mut().find(|(e, _)| *e == event) {
            entry.1 = actions;
        } else {
            self.bindings.push((event, actions));
        }
    }

    /// Returns the ordered actions configured for an event, empty when the
    /// event has no binding (an unbound event is a no-op reaction).
    #[must_use]
    pub fn actions_for(&self, event: SecurityOperationEvent) -> &[EventAction] {
        self.bindings
            .iter()
            .find(|(e, _)| *e == event)
            .map_or(&[], |(_, actions)| actions.as_slice())
    }
}

/// A stable handle to a [`FailureEventSet`] registered with the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventSetId(pub(crate) usize);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_replaces_existing_event_binding() {
        let mut set = FailureEventSet::new("s", "");
        set.bind(
            SecurityOperationEvent::SopCorruptedAtAcceptor,
            vec![EventAction::RemoveSecurityOperation],
        );
        set.bind(
            SecurityOperationEvent::SopCorruptedAtAcceptor,
            vec![EventAction::FailBundleForwarding, EventAction::ReportReasonCode(1)],
        );

        assert_eq!(
            set.actions_for(SecurityOperationEvent::SopCorruptedAtAcceptor),
            &[EventAction::FailBundleForwarding, EventAction::ReportReasonCode(1)],
        );
    }

    #[test]
    fn unbound_event_yields_no_actions() {
        let set = FailureEventSet::new("s", "");
        assert!(set
            .actions_for(SecurityOperationEvent::SopMissingAtVerifier)
            .is_empty());
    }

    #[test]
    fn event_ids_deserialize_from_camel_case() {
        let event: SecurityOperationEvent =
            serde_json::from_str("\"sopMisconfiguredAtVerifier\"").unwrap();
        assert_eq!(event, SecurityOperationEvent::SopMisconfiguredAtVerifier);
    }
}
