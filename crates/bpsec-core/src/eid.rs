//! Endpoint identifiers and wildcard endpoint patterns.
//!
//! BPSec policies select traffic by matching three endpoint IDs (security
//! source, bundle source, bundle final destination) against wildcard
//! patterns of the form `ipn:<N>.<S>`, where each of `<N>` and `<S>` is
//! either a decimal node/service number or a single `*`.
//!
//! Patterns are partially ordered by specificity: an exact component is more
//! specific than a wildcard, and a pattern is more specific than another iff
//! it is componentwise at least as specific and strictly more specific in at
//! least one component. The policy matcher uses this order to pick the
//! winning policy among multiple candidates.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An `ipn`-scheme endpoint identifier: a node number and a service number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Eid {
    /// The node number.
    pub node_id: u64,
    /// The service number.
    pub service_id: u64,
}

impl Eid {
    /// Creates an EID from a node and service number.
    #[must_use]
    pub const fn new(node_id: u64, service_id: u64) -> Self {
        Self {
            node_id,
            service_id,
        }
    }

    /// The null endpoint `ipn:0.0`, used as the report-to EID when no
    /// reports are requested.
    #[must_use]
    pub const fn null() -> Self {
        Self::new(0, 0)
    }
}

impl fmt::Display for Eid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ipn:{}.{}", self.node_id, self.service_id)
    }
}

/// Errors produced when parsing an endpoint pattern.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum PatternError {
    /// The pattern text is not of the form `ipn:<D|*>.<D|*>`.
    #[error("malformed endpoint pattern: {text:?}")]
    BadSyntax {
        /// The rejected pattern text.
        text: String,
    },
}

/// One component of an endpoint pattern: a wildcard or an exact number.
///
/// `Exact` is more specific than `Any`; the derived order is used by the
/// matcher's tie-break, so the variant order here is load-bearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PatternComponent {
    /// Matches exactly one node/service number.
    Exact(u64),
    /// Matches any number.
    Any,
}

impl PatternComponent {
    /// Returns true if this component matches the given number.
    #[must_use]
    pub fn matches(self, value: u64) -> bool {
        match self {
            Self::Exact(x) => x == value,
            Self::Any => true,
        }
    }

    /// Specificity rank: 0 for `Exact`, 1 for `Any`. Lower is more specific.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Exact(_) => 0,
            Self::Any => 1,
        }
    }

    fn parse(text: &str) -> Result<Self, ()> {
        if text == "*" {
            return Ok(Self::Any);
        }
        // A non-empty decimal with no sign, no whitespace, no extra stars.
        if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(());
        }
        text.parse::<u64>().map(Self::Exact).map_err(|_| ())
    }
}

impl fmt::Display for PatternComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(x) => write!(f, "{x}"),
            Self::Any => f.write_str("*"),
        }
    }
}

/// A wildcard endpoint pattern over the `ipn` scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointPattern {
    /// The node-number component.
    pub node: PatternComponent,
    /// The service-number component.
    pub service: PatternComponent,
}

impl EndpointPattern {
    /// The fully wildcarded pattern `ipn:*.*`.
    pub const ANY: Self = Self {
        node: PatternComponent::Any,
        service: PatternComponent::Any,
    };

    /// Parses a pattern of the exact form `ipn:<D|*>.<D|*>`.
    ///
    /// Multi-star components (`**`), empty components, embedded whitespace,
    /// signs, and schemes other than `ipn` are all rejected.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::BadSyntax`] for any text outside the accepted
    /// grammar.
    pub fn parse(text: &str) -> Result<Self, PatternError> {
        let bad = || PatternError::BadSyntax {
            text: text.to_string(),
        };
        let rest = text.strip_prefix("ipn:").ok_or_else(bad)?;
        let (node_text, service_text) = rest.split_once('.').ok_or_else(bad)?;
        let node = PatternComponent::parse(node_text).map_err(|()| bad())?;
        let service = PatternComponent::parse(service_text).map_err(|()| bad())?;
        Ok(Self { node, service })
    }

    /// Returns true if the pattern matches the given concrete EID.
    #[must_use]
    pub fn matches(&self, eid: Eid) -> bool {
        self.node.matches(eid.node_id) && self.service.matches(eid.service_id)
    }

    /// Returns true if `self` is strictly more specific than `other`:
    /// componentwise at least as specific and strictly more specific in at
    /// least one component.
    #[must_use]
    pub fn is_more_specific_than(&self, other: &Self) -> bool {
        let n = (self.node.rank(), other.node.rank());
        let s = (self.service.rank(), other.service.rank());
        n.0 <= n.1 && s.0 <= s.1 && (n.0 < n.1 || s.0 < s.1)
    }
}

impl fmt::Display for EndpointPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ipn:{}.{}", self.node, self.service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_exact_and_wildcard_components() {
        let p = EndpointPattern::parse("ipn:10.1").unwrap();
        assert_eq!(p.node, PatternComponent::Exact(10));
        assert_eq!(p.service, PatternComponent::Exact(1));

        let p = EndpointPattern::parse("ipn:*.*").unwrap();
        assert_eq!(p, EndpointPattern::ANY);

        let p = EndpointPattern::parse("ipn:1.*").unwrap();
        assert_eq!(p.node, PatternComponent::Exact(1));
        assert_eq!(p.service, PatternComponent::Any);
    }

    #[test]
    fn rejects_malformed_patterns() {
        for text in [
            "ipn:**.*",
            "ipn:*.**",
            "ipn:***.*",
            "ipn:.*",
            "ipn:*.",
            "ipn:*",
            "ipn:1.2.3",
            "ipn: 1.2",
            "ipn:1 .2",
            "ipn:+1.2",
            "ipn:-1.2",
            "dtn://node/svc",
            "ipn:a.b",
            "",
        ] {
            assert!(
                EndpointPattern::parse(text).is_err(),
                "expected rejection of {text:?}"
            );
        }
    }

    #[test]
    fn matches_componentwise() {
        let p = EndpointPattern::parse("ipn:1.*").unwrap();
        assert!(p.matches(Eid::new(1, 1)));
        assert!(p.matches(Eid::new(1, 999)));
        assert!(!p.matches(Eid::new(2, 1)));

        assert!(EndpointPattern::ANY.matches(Eid::new(0, 0)));
    }

    #[test]
    fn specificity_is_a_strict_partial_order() {
        let exact = EndpointPattern::parse("ipn:1.1").unwrap();
        let half = EndpointPattern::parse("ipn:1.*").unwrap();
        let any = EndpointPattern::ANY;

        assert!(exact.is_more_specific_than(&half));
        assert!(exact.is_more_specific_than(&any));
        assert!(half.is_more_specific_than(&any));
        assert!(!any.is_more_specific_than(&half));
        assert!(!exact.is_more_specific_than(&exact));

        // Incomparable: each wildcard in a different component.
        let node_any = EndpointPattern::parse("ipn:*.1").unwrap();
        assert!(!half.is_more_specific_than(&node_any));
        assert!(!node_any.is_more_specific_than(&half));
    }

    #[test]
    fn display_round_trips() {
        for text in ["ipn:0.0", "ipn:1.*", "ipn:*.7", "ipn:*.*"] {
            let p = EndpointPattern::parse(text).unwrap();
            assert_eq!(p.to_string(), text);
        }
        assert_eq!(Eid::new(10, 1).to_string(), "ipn:10.1");
    }
}
