//! Query resolution: concrete EIDs to the most specific policy.

use tracing::debug;

use crate::eid::{Eid, EndpointPattern, PatternComponent};

use super::cache::PolicySearchCache;
use super::rule::{Policy, PolicyId, SecurityRole};
use super::store::PolicyStore;

impl PolicyStore {
    /// Resolves `(security source, bundle source, bundle destination)` under
    /// a role to the most specific matching policy.
    ///
    /// Candidates are the role's policies whose three patterns all match.
    /// The winner is the lexicographic minimum of the six-component
    /// specificity keys (security source first, `Exact` before `Any`),
    /// which coincides with the most specific candidate under the product
    /// order whenever the candidates are comparable and otherwise applies
    /// the deterministic tie-break.
    #[must_use]
    pub fn find(
        &self,
        security_source: Eid,
        bundle_source: Eid,
        bundle_final_dest: Eid,
        role: SecurityRole,
    ) -> Option<PolicyId> {
        let mut best: Option<(PolicyId, [u8; 6])> = None;
        for (id, policy) in self.policies_with_role(role) {
            if !candidate_matches(policy, security_source, bundle_source, bundle_final_dest) {
                continue;
            }
            let key = policy.specificity_key();
            match &best {
                Some((_, best_key)) if *best_key <= key => {}
                _ => best = Some((id, key)),
            }
        }
        debug!(
            %security_source,
            %bundle_source,
            %bundle_final_dest,
            ?role,
            matched = best.is_some(),
            "policy lookup"
        );
        best.map(|(id, _)| id)
    }

    /// [`Self::find`] memoized through a caller-owned single-slot cache.
    ///
    /// The cache keys on the whole query, not on the result, so a repeated
    /// query hits even when the answer is `None`, and changing any one of
    /// the four fields misses.
    #[must_use]
    pub fn find_with_cache(
        &self,
        security_source: Eid,
        bundle_source: Eid,
        bundle_final_dest: Eid,
        role: SecurityRole,
        cache: &mut PolicySearchCache,
    ) -> Option<PolicyId> {
        let query = (security_source, bundle_source, bundle_final_dest, role);
        if let Some(result) = cache.lookup(query) {
            return result;
        }
        let result = self.find(security_source, bundle_source, bundle_final_dest, role);
        cache.store(query, result);
        result
    }

    /// Reports pairs of same-role policies that could both match some query
    /// while being incomparable under the product specificity order. Such
    /// pairs make the runtime tie-break load-bearing and are surfaced as a
    /// configuration diagnostic at load time.
    pub(crate) fn incomparable_pairs(&self) -> Vec<(PolicyId, PolicyId)> {
        let mut pairs = Vec::new();
        for role in [
            SecurityRole::Source,
            SecurityRole::Verifier,
            SecurityRole::Acceptor,
        ] {
            let role_policies: Vec<_> = self.policies_with_role(role).collect();
            for (i, (id_a, a)) in role_policies.iter().enumerate() {
                for (id_b, b) in &role_policies[i + 1..] {
                    if overlaps(a, b) && incomparable(a, b) {
                        pairs.push((*id_a, *id_b));
                    }
                }
            }
        }
        pairs
    }
}

fn candidate_matches(
    policy: &Policy,
    security_source: Eid,
    bundle_source: Eid,
    bundle_final_dest: Eid,
) -> bool {
    policy.security_source.matches(security_source)
        && policy.bundle_source.matches(bundle_source)
        && policy.bundle_final_dest.matches(bundle_final_dest)
}

/// True when some concrete query is matched by both policies.
fn overlaps(a: &Policy, b: &Policy) -> bool {
    patterns_overlap(a.security_source, b.security_source)
        && patterns_overlap(a.bundle_source, b.bundle_source)
        && patterns_overlap(a.bundle_final_dest, b.bundle_final_dest)
}

fn patterns_overlap(a: EndpointPattern, b: EndpointPattern) -> bool {
    components_overlap(a.node, b.node) && components_overlap(a.service, b.service)
}

fn components_overlap(a: PatternComponent, b: PatternComponent) -> bool {
    match (a, b) {
        (PatternComponent::Exact(x), PatternComponent::Exact(y)) => x == y,
        _ => true,
    }
}

/// True when neither policy's pattern triple is componentwise at least as
/// specific as the other's.
fn incomparable(a: &Policy, b: &Policy) -> bool {
    let ka = a.specificity_key();
    let kb = b.specificity_key();
    let a_leq_b = ka.iter().zip(&kb).all(|(x, y)| x <= y);
    let b_leq_a = kb.iter().zip(&ka).all(|(x, y)| x <= y);
    !a_leq_b && !b_leq_a
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_store() -> (PolicyStore, Vec<PolicyId>) {
        // The reference seven-pattern table.
        const PATTERNS: [(&str, &str, &str); 7] = [
            ("ipn:*.*", "ipn:*.*", "ipn:*.*"),
            ("ipn:1.1", "ipn:*.*", "ipn:*.*"),
            ("ipn:1.*", "ipn:*.*", "ipn:*.*"),
            ("ipn:*.*", "ipn:2.1", "ipn:*.*"),
            ("ipn:*.*", "ipn:2.*", "ipn:*.*"),
            ("ipn:*.*", "ipn:*.*", "ipn:3.1"),
            ("ipn:*.*", "ipn:*.*", "ipn:3.*"),
        ];
        let mut store = PolicyStore::new();
        let mut ids = Vec::new();
        for (ss, bs, bd) in PATTERNS {
            let (id, is_new) = store
                .create_or_get(ss, bs, bd, SecurityRole::Acceptor)
                .unwrap();
            assert!(is_new);
            ids.push(id);
        }
        (store, ids)
    }

    #[test]
    fn most_specific_candidate_wins() {
        let mut store = PolicyStore::new();
        let (any, _) = store
            .create_or_get("ipn:*.*", "ipn:*.*", "ipn:*.*", SecurityRole::Acceptor)
            .unwrap();
        let (exact, _) = store
            .create_or_get("ipn:1.1", "ipn:*.*", "ipn:*.*", SecurityRole::Acceptor)
            .unwrap();

        let bs = Eid::new(2, 1);
        let bd = Eid::new(3, 1);
        assert_eq!(
            store.find(Eid::new(1, 1), bs, bd, SecurityRole::Acceptor),
            Some(exact)
        );
        assert_eq!(
            store.find(Eid::new(1, 2), bs, bd, SecurityRole::Acceptor),
            Some(any)
        );
        assert_eq!(
            store.find(Eid::new(1, 2), bs, bd, SecurityRole::Verifier),
            None
        );
    }

    #[test]
    fn brute_force_probe_table_resolves_each_pattern() {
        let (store, ids) = seeded_store();
        let probes: [(Eid, Eid, Eid); 7] = [
            (Eid::new(10, 10), Eid::new(20, 10), Eid::new(30, 10)),
            (Eid::new(1, 1), Eid::new(20, 10), Eid::new(30, 10)),
            (Eid::new(1, 10), Eid::new(20, 10), Eid::new(30, 10)),
            (Eid::new(10, 10), Eid::new(2, 1), Eid::new(30, 10)),
            (Eid::new(10, 10), Eid::new(2, 10), Eid::new(30, 10)),
            (Eid::new(10, 10), Eid::new(20, 10), Eid::new(3, 1)),
            (Eid::new(10, 10), Eid::new(20, 10), Eid::new(3, 10)),
        ];
        for (i, (ss, bs, bd)) in probes.into_iter().enumerate() {
            assert_eq!(
                store.find(ss, bs, bd, SecurityRole::Acceptor),
                Some(ids[i]),
                "probe {i} resolved to the wrong pattern"
            );
        }
    }

    #[test]
    fn no_candidate_returns_none() {
        let mut store = PolicyStore::new();
        store
            .create_or_get("ipn:1.1", "ipn:*.*", "ipn:*.*", SecurityRole::Acceptor)
            .unwrap();
        assert_eq!(
            store.find(
                Eid::new(9, 9),
                Eid::new(2, 1),
                Eid::new(3, 1),
                SecurityRole::Acceptor
            ),
            None
        );
    }

    #[test]
    fn incomparable_overlapping_policies_are_reported() {
        let mut store = PolicyStore::new();
        store
            .create_or_get("ipn:1.1", "ipn:*.*", "ipn:*.*", SecurityRole::Acceptor)
            .unwrap();
        store
            .create_or_get("ipn:*.*", "ipn:2.1", "ipn:*.*", SecurityRole::Acceptor)
            .unwrap();
        assert_eq!(store.incomparable_pairs().len(), 1);

        // Disjoint exact components cannot co-match; not ambiguous.
        let mut store = PolicyStore::new();
        store
            .create_or_get("ipn:1.1", "ipn:*.*", "ipn:*.*", SecurityRole::Acceptor)
            .unwrap();
        store
            .create_or_get("ipn:2.2", "ipn:8.1", "ipn:*.*", SecurityRole::Acceptor)
            .unwrap();
        assert!(store.incomparable_pairs().is_empty());
    }
}
