//! Single-slot memoizer for repeated policy queries.

use crate::eid::Eid;

use super::rule::{PolicyId, SecurityRole};

type Query = (Eid, Eid, Eid, SecurityRole);

/// Caches the last policy query and its resolution.
///
/// Bundle processing issues the same `(security source, bundle source,
/// bundle destination, role)` query for every operation of a bundle and
/// usually for long runs of bundles on the same flow, so one slot removes
/// almost all repeated matcher walks. The slot holds the last *query*, not
/// the last successful match: a `None` resolution is cached too, and
/// changing any one query field misses.
///
/// Each caller owns its own cache; the type must not be shared across
/// threads.
#[derive(Debug, Default)]
pub struct PolicySearchCache {
    slot: Option<(Query, Option<PolicyId>)>,
    /// True when the previous lookup was answered from the slot. Exposed
    /// for observability.
    pub was_cache_hit: bool,
}

impl PolicySearchCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the memoized resolution when `query` equals the stored one,
    /// updating [`Self::was_cache_hit`] either way.
    pub(crate) fn lookup(&mut self, query: Query) -> Option<Option<PolicyId>> {
        match &self.slot {
            Some((stored, result)) if *stored == query => {
                self.was_cache_hit = true;
                Some(*result)
            }
            _ => {
                self.was_cache_hit = false;
                None
            }
        }
    }

    /// Replaces the slot with a freshly computed resolution.
    pub(crate) fn store(&mut self, query: Query, result: Option<PolicyId>) {
        self.slot = Some((query, result));
    }
}

#[cfg(test)]
mod tests {
    use crate::policy::{PolicyStore, SecurityRole};

    use super::*;

    #[test]
    fn second_identical_query_hits() {
        let mut store = PolicyStore::new();
        store
            .create_or_get("ipn:*.*", "ipn:*.*", "ipn:*.*", SecurityRole::Acceptor)
            .unwrap();
        let mut cache = PolicySearchCache::new();
        let (ss, bs, bd) = (Eid::new(1, 1), Eid::new(2, 1), Eid::new(3, 1));

        let first = store.find_with_cache(ss, bs, bd, SecurityRole::Acceptor, &mut cache);
        assert!(first.is_some());
        assert!(!cache.was_cache_hit);

        let second = store.find_with_cache(ss, bs, bd, SecurityRole::Acceptor, &mut cache);
        assert_eq!(second, first);
        assert!(cache.was_cache_hit);
    }

    #[test]
    fn changing_any_field_invalidates() {
        let mut store = PolicyStore::new();
        store
            .create_or_get("ipn:*.*", "ipn:*.*", "ipn:*.*", SecurityRole::Acceptor)
            .unwrap();
        store
            .create_or_get("ipn:*.*", "ipn:*.*", "ipn:*.*", SecurityRole::Verifier)
            .unwrap();
        let mut cache = PolicySearchCache::new();
        let (ss, bs, bd) = (Eid::new(1, 1), Eid::new(2, 1), Eid::new(3, 1));

        store.find_with_cache(ss, bs, bd, SecurityRole::Acceptor, &mut cache);
        for query in [
            (Eid::new(1, 2), bs, bd, SecurityRole::Acceptor),
            (ss, Eid::new(2, 2), bd, SecurityRole::Acceptor),
            (ss, bs, Eid::new(3, 2), SecurityRole::Acceptor),
            (ss, bs, bd, SecurityRole::Verifier),
        ] {
            store.find_with_cache(query.0, query.1, query.2, query.3, &mut cache);
            assert!(!cache.was_cache_hit, "query {query:?} should have missed");
            // Re-prime for the next variation.
            store.find_with_cache(ss, bs, bd, SecurityRole::Acceptor, &mut cache);
            assert!(!cache.was_cache_hit);
        }
    }

    #[test]
    fn none_resolutions_are_cached_as_queries() {
        let store = PolicyStore::new();
        let mut cache = PolicySearchCache::new();
        let (ss, bs, bd) = (Eid::new(1, 1), Eid::new(2, 1), Eid::new(3, 1));

        assert!(store
            .find_with_cache(ss, bs, bd, SecurityRole::Acceptor, &mut cache)
            .is_none());
        assert!(!cache.was_cache_hit);
        assert!(store
            .find_with_cache(ss, bs, bd, SecurityRole::Acceptor, &mut cache)
            .is_none());
        assert!(cache.was_cache_hit);
    }
}
