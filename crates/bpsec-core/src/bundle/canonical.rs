//! Canonical (non-primary) block codec.

use ciborium::value::Value;

use crate::cbor::{as_array, as_bytes, as_u64, encode_u64_into, encode_value};

use super::crc::{patch_trailing_crc, verify_trailing_crc, CrcType};
use super::error::BundleError;

/// Canonical block type of the payload block.
pub const PAYLOAD_BLOCK_TYPE: u8 = 1;

/// One canonical block: type, number, flags, CRC type, and the
/// block-type-specific data bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalBlock {
    /// Block type code.
    pub block_type: u8,
    /// Block number, unique within the bundle; the payload block is 1.
    pub block_number: u64,
    /// Block processing control flags.
    pub block_flags: u64,
    /// CRC type applied to this block.
    pub crc_type: CrcType,
    /// Block-type-specific data. For BIB/BCB this is the encoded Abstract
    /// Security Block; for the payload block, the application data.
    pub data: Vec<u8>,
}

impl CanonicalBlock {
    /// Creates a block with no CRC.
    #[must_use]
    pub fn new(block_type: u8, block_number: u64, block_flags: u64, data: Vec<u8>) -> Self {
        Self {
            block_type,
            block_number,
            block_flags,
            crc_type: CrcType::None,
            data,
        }
    }

    /// Canonical encoding, CRC included when configured.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut fields = vec![
            Value::from(u64::from(self.block_type)),
            Value::from(self.block_number),
            Value::from(self.block_flags),
            Value::from(self.crc_type.wire_value()),
            Value::Bytes(self.data.clone()),
        ];
        if !self.crc_type.is_none() {
            fields.push(Value::Bytes(vec![0; self.crc_type.len()]));
        }
        let mut out = encode_value(&Value::Array(fields));
        patch_trailing_crc(self.crc_type, &mut out);
        out
    }

    /// The type/number/flags header bytes consumed by the scope-flag AAD
    /// assembly: the three values as a canonical CBOR sequence.
    #[must_use]
    pub fn header_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(27);
        encode_u64_into(u64::from(self.block_type), &mut out);
        encode_u64_into(self.block_number, &mut out);
        encode_u64_into(self.block_flags, &mut out);
        out
    }

    /// Decodes a canonical block from its CBOR value and raw slice (the
    /// slice is needed for CRC verification).
    ///
    /// # Errors
    ///
    /// Rejects shape errors, unknown CRC types, and CRC mismatches.
    pub fn decode(value: &Value, raw: &[u8]) -> Result<Self, BundleError> {
        let fields = as_array(value).ok_or(BundleError::BadShape {
            field: "canonical block",
        })?;

        let block_type_raw = fields.first().and_then(as_u64).ok_or(BundleError::BadShape {
            field: "block type",
        })?;
        let block_type = u8::try_from(block_type_raw).map_err(|_| BundleError::BadShape {
            field: "block type",
        })?;
        let block_number = fields.get(1).and_then(as_u64).ok_or(BundleError::BadShape {
            field: "block number",
        })?;
        let block_flags = fields.get(2).and_then(as_u64).ok_or(BundleError::BadShape {
            field: "block flags",
        })?;
        let crc_type = CrcType::from_wire(fields.get(3).and_then(as_u64).ok_or(
            BundleError::BadShape {
                field: "block CRC type",
            },
        )?)?;

        let expected_len = 5 + usize::from(!crc_type.is_none());
        if fields.len() != expected_len {
            return Err(BundleError::BadShape {
                field: "canonical block",
            });
        }
        if !verify_trailing_crc(crc_type, raw) {
            return Err(BundleError::CrcMismatch { block_number });
        }

        let data = as_bytes(&fields[4])
            .ok_or(BundleError::BadShape {
                field: "block data",
            })?
            .to_vec();

        Ok(Self {
            block_type,
            block_number,
            block_flags,
            crc_type,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::cbor::decode_one;

    use super::*;

    fn decode_bytes(bytes: &[u8]) -> Result<CanonicalBlock, BundleError> {
        let mut rest = bytes;
        let value = decode_one(&mut rest).unwrap();
        CanonicalBlock::decode(&value, bytes)
    }

    #[test]
    fn encode_decode_round_trips() {
        let block = CanonicalBlock::new(PAYLOAD_BLOCK_TYPE, 1, 0x10, b"payload".to_vec());
        assert_eq!(decode_bytes(&block.encode()).unwrap(), block);
    }

    #[test]
    fn crc_protected_block_detects_corruption() {
        let mut block = CanonicalBlock::new(7, 2, 0, b"extension".to_vec());
        block.crc_type = CrcType::Crc32;
        let bytes = block.encode();
        assert_eq!(decode_bytes(&bytes).unwrap(), block);

        let mut corrupted = bytes;
        let last = corrupted.len() - 6;
        corrupted[last] ^= 0xFF;
        assert!(matches!(
            decode_bytes(&corrupted),
            Err(BundleError::CrcMismatch { block_number: 2 })
        ));
    }

    #[test]
    fn header_bytes_are_the_three_leading_fields() {
        let block = CanonicalBlock::new(11, 3, 0x20, Vec::new());
        // 11, 3, then 0x20 (= 32, needs the one-byte uint prefix).
        assert_eq!(block.header_bytes(), [0x0B, 0x03, 0x18, 0x20]);
    }
}
