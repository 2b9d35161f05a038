//! Deduplicating policy storage.

use std::collections::HashMap;

use crate::eid::EndpointPattern;

use super::error::PolicyError;
use super::rule::{Policy, PolicyId, SecurityRole};

/// The dedupe key: role plus the three patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PolicyKey {
    role: SecurityRole,
    security_source: EndpointPattern,
    bundle_source: EndpointPattern,
    bundle_final_dest: EndpointPattern,
}

/// Holds the policies of one manager, keyed by `(role, patterns)`.
///
/// Policies are appended during config load and never removed, so a
/// [`PolicyId`] is a stable reference for the store's lifetime.
#[derive(Debug, Default)]
pub struct PolicyStore {
    policies: Vec<Policy>,
    by_key: HashMap<PolicyKey, PolicyId>,
}

impl PolicyStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the three pattern texts and returns the existing policy for
    /// the `(role, patterns)` key, or creates a new one.
    ///
    /// The boolean is true exactly when the policy was newly created.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::BadSyntax`] when any pattern text is
    /// malformed, and [`PolicyError::ReservedRole`] for the reserved role
    /// tag. Nothing is inserted on error.
    pub fn create_or_get(
        &mut self,
        security_source: &str,
        bundle_source: &str,
        bundle_final_dest: &str,
        role: SecurityRole,
    ) -> Result<(PolicyId, bool), PolicyError> {
        if role == SecurityRole::ReservedMax {
            return Err(PolicyError::ReservedRole);
        }
        let security_source = EndpointPattern::parse(security_source)?;
        let bundle_source = EndpointPattern::parse(bundle_source)?;
        let bundle_final_dest = EndpointPattern::parse(bundle_final_dest)?;

        let key = PolicyKey {
            role,
            security_source,
            bundle_source,
            bundle_final_dest,
        };
        if let Some(&id) = self.by_key.get(&key) {
            return Ok((id, false));
        }

        let id = PolicyId(self.policies.len());
        self.policies.push(Policy::new(
            role,
            security_source,
            bundle_source,
            bundle_final_dest,
        ));
        self.by_key.insert(key, id);
        Ok((id, true))
    }

    /// Returns the policy behind a handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle did not come from this store.
    #[must_use]
    pub fn get(&self, id: PolicyId) -> &Policy {
        &self.policies[id.0]
    }

    /// Mutable access for the config loader; policies are immutable once
    /// load returns.
    pub(crate) fn get_mut(&mut self, id: PolicyId) -> &mut Policy {
        &mut self.policies[id.0]
    }

    /// Number of stored policies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Returns true when no policies are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Iterates `(handle, policy)` pairs for one role.
    pub fn policies_with_role(
        &self,
        role: SecurityRole,
    ) -> impl Iterator<Item = (PolicyId, &Policy)> {
        self.policies
            .iter()
            .enumerate()
            .filter(move |(_, p)| p.role == role)
            .map(|(i, p)| (PolicyId(i), p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_syntax_inserts_nothing() {
        let mut store = PolicyStore::new();
        for (ss, bs, bd) in [
            ("ipn:**.*", "ipn:*.*", "ipn:*.*"),
            ("ipn:*.*", "ipn:*.**", "ipn:*.*"),
            ("ipn:*.*", "ipn:*.*", "ipn:***.*"),
        ] {
            assert!(store
                .create_or_get(ss, bs, bd, SecurityRole::Acceptor)
                .is_err());
        }
        assert!(store
            .create_or_get("ipn:*.*", "ipn:*.*", "ipn:*.*", SecurityRole::ReservedMax)
            .is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn duplicate_key_returns_existing_handle() {
        let mut store = PolicyStore::new();
        let (a1, new1) = store
            .create_or_get("ipn:*.*", "ipn:*.*", "ipn:*.*", SecurityRole::Acceptor)
            .unwrap();
        let (a2, new2) = store
            .create_or_get("ipn:*.*", "ipn:*.*", "ipn:*.*", SecurityRole::Acceptor)
            .unwrap();
        let (a3, new3) = store
            .create_or_get("ipn:*.*", "ipn:*.*", "ipn:*.*", SecurityRole::Acceptor)
            .unwrap();
        assert!(new1);
        assert!(!new2);
        assert!(!new3);
        assert_eq!(a1, a2);
        assert_eq!(a1, a3);

        // Same patterns under a different role is a distinct policy.
        let (s1, new_s) = store
            .create_or_get("ipn:*.*", "ipn:*.*", "ipn:*.*", SecurityRole::Source)
            .unwrap();
        assert!(new_s);
        assert_ne!(s1, a1);
        assert_eq!(store.len(), 2);
    }
}
