//! Policy value types.

use std::collections::BTreeSet;

use serde::Deserialize;

use crate::context::SecurityContextParams;
use crate::eid::EndpointPattern;
use crate::events::EventSetId;

/// The role a node plays for a security operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityRole {
    /// Adds security operations to outgoing bundles.
    Source,
    /// Validates operations on transiting bundles, leaving them in place.
    Verifier,
    /// Validates and strips operations destined for this node.
    Acceptor,
    /// Reserved sentinel tag; rejected on policy creation.
    #[serde(skip)]
    ReservedMax,
}

/// The security service a policy applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityService {
    /// Block Integrity Block (BIB) protection.
    Integrity,
    /// Block Confidentiality Block (BCB) protection.
    Confidentiality,
}

/// The security context family used to realize a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SecurityContextKind {
    /// BCB-AES-GCM (RFC 9173 context id 2).
    AesGcm,
    /// BIB-HMAC-SHA2 (RFC 9173 context id 1).
    HmacSha,
}

/// A stable handle to a policy held by a [`super::PolicyStore`].
///
/// Handles index into the store and stay valid for the store's lifetime;
/// policies are never removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PolicyId(pub(crate) usize);

/// One loaded security policy.
///
/// Created by the config loader and immutable for the life of the manager
/// thereafter.
#[derive(Debug, Clone)]
pub struct Policy {
    /// The configured `securityPolicyRuleId`.
    pub rule_id: u64,
    /// Free-form operator description.
    pub description: String,
    /// The role this policy is indexed under.
    pub role: SecurityRole,
    /// Pattern the security source EID must match.
    pub security_source: EndpointPattern,
    /// Pattern the bundle source EID must match.
    pub bundle_source: EndpointPattern,
    /// Pattern the bundle final destination EID must match.
    pub bundle_final_dest: EndpointPattern,
    /// Block type codes of the blocks this policy protects.
    pub target_block_types: BTreeSet<u8>,
    /// The security service to apply.
    pub service: SecurityService,
    /// The security context family.
    pub context: SecurityContextKind,
    /// Context parameters (variants, IV size, scope flags, key material).
    pub params: SecurityContextParams,
    /// The resolved failure event set for this policy.
    pub event_set: EventSetId,
}

impl Policy {
    /// Creates a policy skeleton for the given key; the config loader fills
    /// in service, targets, and parameters before the store is sealed.
    #[must_use]
    pub(crate) fn new(
        role: SecurityRole,
        security_source: EndpointPattern,
        bundle_source: EndpointPattern,
        bundle_final_dest: EndpointPattern,
    ) -> Self {
        Self {
            rule_id: 0,
            description: String::new(),
            role,
            security_source,
            bundle_source,
            bundle_final_dest,
            target_block_types: BTreeSet::new(),
            service: SecurityService::Integrity,
            context: SecurityContextKind::HmacSha,
            params: SecurityContextParams::default(),
            event_set: EventSetId(0),
        }
    }

    /// The six-component specificity key used for deterministic matching:
    /// per component, 0 for `Exact` and 1 for `Any`, security source first.
    /// Lexicographically smaller keys are more specific.
    #[must_use]
    pub(crate) fn specificity_key(&self) -> [u8; 6] {
        [
            self.security_source.node.rank(),
            self.security_source.service.rank(),
            self.bundle_source.node.rank(),
            self.bundle_source.service.rank(),
            self.bundle_final_dest.node.rank(),
            self.bundle_final_dest.service.rank(),
        ]
    }
}
