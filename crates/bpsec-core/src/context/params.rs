//! Typed security-context parameters.

use std::path::PathBuf;

use super::scope::ScopeFlags;
use crate::bundle::CrcType;

/// AES key-size variant for BCB-AES-GCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AesVariant {
    /// AES-128-GCM.
    A128,
    /// AES-256-GCM (RFC 9173 default).
    #[default]
    A256,
}

impl AesVariant {
    /// Key length in bytes.
    #[must_use]
    pub const fn key_len(self) -> usize {
        match self {
            Self::A128 => 16,
            Self::A256 => 32,
        }
    }

    /// RFC 9173 wire identifier (COSE algorithm: 1 = A128GCM, 3 = A256GCM).
    #[must_use]
    pub const fn wire_id(self) -> u64 {
        match self {
            Self::A128 => 1,
            Self::A256 => 3,
        }
    }

    /// Decodes the wire identifier.
    #[must_use]
    pub const fn from_wire_id(id: u64) -> Option<Self> {
        match id {
            1 => Some(Self::A128),
            3 => Some(Self::A256),
            _ => None,
        }
    }

    /// Decodes the config value (`aesVariant`: 128 or 256).
    #[must_use]
    pub const fn from_config_value(value: u64) -> Option<Self> {
        match value {
            128 => Some(Self::A128),
            256 => Some(Self::A256),
            _ => None,
        }
    }
}

/// SHA-2 variant for BIB-HMAC-SHA2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShaVariant {
    /// HMAC 256/256.
    Sha256,
    /// HMAC 384/384 (RFC 9173 default).
    #[default]
    Sha384,
    /// HMAC 512/512.
    Sha512,
}

impl ShaVariant {
    /// Digest length in bytes.
    #[must_use]
    pub const fn digest_len(self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// RFC 9173 wire identifier (COSE algorithm: 5, 6, 7).
    #[must_use]
    pub const fn wire_id(self) -> u64 {
        match self {
            Self::Sha256 => 5,
            Self::Sha384 => 6,
            Self::Sha512 => 7,
        }
    }

    /// Decodes the wire identifier.
    #[must_use]
    pub const fn from_wire_id(id: u64) -> Option<Self> {
        match id {
            5 => Some(Self::Sha256),
            6 => Some(Self::Sha384),
            7 => Some(Self::Sha512),
            _ => None,
        }
    }

    /// Decodes the config value (`shaVariant`: 256, 384, or 512).
    #[must_use]
    pub const fn from_config_value(value: u64) -> Option<Self> {
        match value {
            256 => Some(Self::Sha256),
            384 => Some(Self::Sha384),
            512 => Some(Self::Sha512),
            _ => None,
        }
    }
}

/// The resolved parameters of a policy's security context.
///
/// Populated by the config loader; the AES/SHA variants, IV size, and scope
/// flags also drive what a source writes into its security blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityContextParams {
    /// AES key-size variant (confidentiality policies).
    pub aes_variant: AesVariant,
    /// SHA-2 variant (integrity policies).
    pub sha_variant: ShaVariant,
    /// IV length in bytes generated per confidentiality operation.
    pub iv_size_bytes: usize,
    /// Which headers are folded into the AAD / MACed content.
    pub scope_flags: ScopeFlags,
    /// CRC type applied to emitted security blocks.
    pub security_block_crc: CrcType,
    /// Key file backing this policy's key material.
    pub key_file: Option<PathBuf>,
}

impl Default for SecurityContextParams {
    fn default() -> Self {
        Self {
            aes_variant: AesVariant::default(),
            sha_variant: ShaVariant::default(),
            iv_size_bytes: 12,
            scope_flags: ScopeFlags::ALL,
            security_block_crc: CrcType::None,
            key_file: None,
        }
    }
}
