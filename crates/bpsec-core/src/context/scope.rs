//! Scope flags and AAD assembly.

use std::fmt;

/// The 3-bit scope selector deciding which canonical byte ranges are folded
/// into the AAD (BCB) or the MACed content (BIB).
///
/// Bit assignment is pinned for byte-level interop:
/// bit 0 selects the primary block's canonical bytes, bit 1 the target
/// block's type/number/flags header, bit 2 the security block's own
/// type/number/flags header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeFlags(u8);

impl ScopeFlags {
    /// Include the primary block's canonical bytes.
    pub const INCLUDE_PRIMARY_BLOCK: u8 = 0b001;
    /// Include the target block's type, number, and flags header.
    pub const INCLUDE_TARGET_HEADER: u8 = 0b010;
    /// Include the security block's own type, number, and flags header.
    pub const INCLUDE_SECURITY_HEADER: u8 = 0b100;

    /// All three ranges selected (value 7, the configuration default).
    pub const ALL: Self = Self(0b111);
    /// Nothing beyond the protected data itself.
    pub const NONE: Self = Self(0);

    /// Validates a configured or wire value; only 0..=7 are meaningful.
    #[must_use]
    pub const fn from_value(value: u64) -> Option<Self> {
        if value <= 7 {
            #[allow(clippy::cast_possible_truncation)]
            Some(Self(value as u8))
        } else {
            None
        }
    }

    /// The raw 3-bit value.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// True when the primary block is in scope.
    #[must_use]
    pub const fn includes_primary(self) -> bool {
        self.0 & Self::INCLUDE_PRIMARY_BLOCK != 0
    }

    /// True when the target block header is in scope.
    #[must_use]
    pub const fn includes_target_header(self) -> bool {
        self.0 & Self::INCLUDE_TARGET_HEADER != 0
    }

    /// True when the security block header is in scope.
    #[must_use]
    pub const fn includes_security_header(self) -> bool {
        self.0 & Self::INCLUDE_SECURITY_HEADER != 0
    }

    /// Assembles the scope-selected AAD into `out` (cleared first).
    ///
    /// Concatenation order is fixed: primary block bytes, then target
    /// header, then security header. For BIB the caller appends the target
    /// block's data bytes afterwards to form the IPPT; for BCB the target
    /// data is the in-place AEAD payload and stays out of the AAD.
    pub fn assemble_aad(
        self,
        primary_bytes: &[u8],
        target_header: &[u8],
        security_header: &[u8],
        out: &mut Vec<u8>,
    ) {
        out.clear();
        if self.includes_primary() {
            out.extend_from_slice(primary_bytes);
        }
        if self.includes_target_header() {
            out.extend_from_slice(target_header);
        }
        if self.includes_security_header() {
            out.extend_from_slice(security_header);
        }
    }
}

impl Default for ScopeFlags {
    fn default() -> Self {
        Self::ALL
    }
}

impl fmt::Display for ScopeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#05b}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_above_seven_are_rejected() {
        assert!(ScopeFlags::from_value(7).is_some());
        assert!(ScopeFlags::from_value(8).is_none());
        assert!(ScopeFlags::from_value(u64::MAX).is_none());
    }

    #[test]
    fn aad_concatenation_order_is_primary_target_security() {
        let mut out = Vec::new();
        ScopeFlags::ALL.assemble_aad(b"PP", b"tt", b"ss", &mut out);
        assert_eq!(out, b"PPttss");

        ScopeFlags::from_value(0b101)
            .unwrap()
            .assemble_aad(b"PP", b"tt", b"ss", &mut out);
        assert_eq!(out, b"PPss");

        ScopeFlags::NONE.assemble_aad(b"PP", b"tt", b"ss", &mut out);
        assert!(out.is_empty());
    }
}
