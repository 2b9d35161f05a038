//! Block CRC types and computation.
//!
//! RFC 9171 CRCs are computed over the entire block's CBOR encoding with
//! the CRC field present and zero-filled: CRC-16/X.25 for type 1,
//! CRC-32/Castagnoli for type 2.

use crc::Crc;

use super::error::BundleError;

const CRC16_X25: Crc<u16> = Crc::<u16>::new(&crc::CRC_16_IBM_SDLC);
const CRC32_CASTAGNOLI: Crc<u32> = Crc::<u32>::new(&crc::CRC_32_ISCSI);

/// The CRC applied to a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrcType {
    /// No CRC (wire value 0).
    #[default]
    None,
    /// CRC-16/X.25 (wire value 1).
    Crc16,
    /// CRC-32/Castagnoli (wire value 2).
    Crc32,
}

impl CrcType {
    /// Decodes the wire value.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::UnsupportedCrcType`] for unknown codes.
    pub fn from_wire(value: u64) -> Result<Self, BundleError> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Crc16),
            2 => Ok(Self::Crc32),
            _ => Err(BundleError::UnsupportedCrcType { value }),
        }
    }

    /// Decodes the configuration value (`securityBlockCrc`: 0, 16, or 32
    /// CRC bits).
    #[must_use]
    pub const fn from_config_value(value: u64) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            16 => Some(Self::Crc16),
            32 => Some(Self::Crc32),
            _ => None,
        }
    }

    /// The wire value.
    #[must_use]
    pub const fn wire_value(self) -> u64 {
        match self {
            Self::None => 0,
            Self::Crc16 => 1,
            Self::Crc32 => 2,
        }
    }

    /// Length in bytes of the CRC field's byte string.
    #[must_use]
    pub const fn len(self) -> usize {
        match self {
            Self::None => 0,
            Self::Crc16 => 2,
            Self::Crc32 => 4,
        }
    }

    /// True for [`CrcType::None`].
    #[must_use]
    pub const fn is_none(self) -> bool {
        matches!(self, Self::None)
    }

    /// Computes the big-endian CRC over block bytes whose CRC field bytes
    /// are zero-filled. Empty for [`CrcType::None`].
    #[must_use]
    pub fn compute(self, zero_filled_block: &[u8]) -> Vec<u8> {
        match self {
            Self::None => Vec::new(),
            Self::Crc16 => CRC16_X25.checksum(zero_filled_block).to_be_bytes().to_vec(),
            Self::Crc32 => CRC32_CASTAGNOLI
                .checksum(zero_filled_block)
                .to_be_bytes()
                .to_vec(),
        }
    }
}

/// Patches the trailing zero-filled CRC field of an encoded block in place.
pub(super) fn patch_trailing_crc(crc_type: CrcType, encoded: &mut [u8]) {
    let n = crc_type.len();
    if n == 0 {
        return;
    }
    let crc = crc_type.compute(encoded);
    let len = encoded.len();
    encoded[len - n..].copy_from_slice(&crc);
}

/// Verifies the CRC of a raw block slice whose last `crc_type.len()` bytes
/// hold the received CRC.
pub(super) fn verify_trailing_crc(crc_type: CrcType, raw_block: &[u8]) -> bool {
    let n = crc_type.len();
    if n == 0 {
        return true;
    }
    if raw_block.len() < n {
        return false;
    }
    let received = &raw_block[raw_block.len() - n..];
    let mut zeroed = raw_block.to_vec();
    let len = zeroed.len();
    zeroed[len - n..].fill(0);
    crc_type.compute(&zeroed) == received
}
