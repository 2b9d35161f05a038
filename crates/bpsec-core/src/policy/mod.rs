//! Policy model, storage, and matching.
//!
//! A [`Policy`] binds a security role and three wildcard endpoint patterns
//! (security source, bundle source, bundle final destination) to the
//! security service to apply, its context parameters, and a failure event
//! set. The [`PolicyStore`] holds the deduplicated policy set for one
//! manager; the matcher resolves a concrete `(security source, bundle
//! source, bundle destination, role)` query to the most specific matching
//! policy, with a single-slot [`PolicySearchCache`] for the repeated-query
//! hot path.
//!
//! # Matching
//!
//! A policy is a candidate for a query when its role matches and all three
//! patterns match the corresponding concrete EIDs. The winner is the most
//! specific candidate under the product order over the three patterns
//! (`Exact` beats `Any`, componentwise). Incomparable candidates are a
//! configuration smell surfaced at load time; at match time a deterministic
//! lexicographic tie-break applies, earlier components dominating.

mod cache;
mod error;
mod matcher;
mod rule;
mod store;

pub use cache::PolicySearchCache;
pub use error::PolicyError;
pub use rule::{Policy, PolicyId, SecurityContextKind, SecurityRole, SecurityService};
pub use store::PolicyStore;
