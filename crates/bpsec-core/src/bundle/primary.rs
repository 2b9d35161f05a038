//! Primary block codec.

use ciborium::value::Value;

use crate::cbor::{as_array, as_u64, eid_from_value, eid_to_value, encode_value};
use crate::eid::Eid;

use super::crc::{patch_trailing_crc, verify_trailing_crc, CrcType};
use super::error::BundleError;

/// Bundle processing control flag: the bundle is a fragment.
const FLAG_IS_FRAGMENT: u64 = 0b1;

/// A bundle creation timestamp: milliseconds since the DTN epoch plus a
/// sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CreationTimestamp {
    /// Milliseconds since 2000-01-01 UTC.
    pub dtn_time_ms: u64,
    /// Sequence number distinguishing bundles created in the same
    /// millisecond.
    pub sequence_number: u64,
}

/// The decoded primary block of a BPv7 bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryBlock {
    /// Bundle processing control flags.
    pub bundle_flags: u64,
    /// CRC type applied to the primary block.
    pub crc_type: CrcType,
    /// The bundle's final destination.
    pub destination: Eid,
    /// The bundle's source node.
    pub source: Eid,
    /// Where status reports are sent.
    pub report_to: Eid,
    /// Creation timestamp.
    pub creation_timestamp: CreationTimestamp,
    /// Lifetime in milliseconds.
    pub lifetime_ms: u64,
}

impl PrimaryBlock {
    /// Protocol version emitted and accepted.
    pub const VERSION: u64 = 7;

    /// Creates a primary block with no CRC and a null report-to endpoint.
    #[must_use]
    pub fn new(source: Eid, destination: Eid) -> Self {
        Self {
            bundle_flags: 0,
            crc_type: CrcType::None,
            destination,
            source,
            report_to: Eid::null(),
            creation_timestamp: CreationTimestamp::default(),
            lifetime_ms: 0,
        }
    }

    /// Canonical encoding of the primary block, CRC included when
    /// configured. These are also the bytes the scope-flag AAD assembly
    /// consumes.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut fields = vec![
            Value::from(Self::VERSION),
            Value::from(self.bundle_flags),
            Value::from(self.crc_type.wire_value()),
            eid_to_value(self.destination),
            eid_to_value(self.source),
            eid_to_value(self.report_to),
            Value::Array(vec![
                Value::from(self.creation_timestamp.dtn_time_ms),
                Value::from(self.creation_timestamp.sequence_number),
            ]),
            Value::from(self.lifetime_ms),
        ];
        if !self.crc_type.is_none() {
            fields.push(Value::Bytes(vec![0; self.crc_type.len()]));
        }
        let mut out = encode_value(&Value::Array(fields));
        patch_trailing_crc(self.crc_type, &mut out);
        out
    }

    /// Decodes a primary block from its CBOR value and raw slice (the
    /// slice is needed for CRC verification).
    ///
    /// # Errors
    ///
    /// Rejects versions other than 7, fragments, non-`ipn` EIDs, CRC
    /// mismatches, and shape errors.
    pub fn decode(value: &Value, raw: &[u8]) -> Result<Self, BundleError> {
        let fields = as_array(value).ok_or(BundleError::BadShape {
            field: "primary block",
        })?;

        let version = field_u64(fields, 0, "primary version")?;
        if version != Self::VERSION {
            return Err(BundleError::UnsupportedVersion { found: version });
        }

        let bundle_flags = field_u64(fields, 1, "bundle flags")?;
        if bundle_flags & FLAG_IS_FRAGMENT != 0 {
            return Err(BundleError::FragmentUnsupported);
        }

        let crc_type = CrcType::from_wire(field_u64(fields, 2, "primary CRC type")?)?;
        let expected_len = 8 + usize::from(!crc_type.is_none());
        if fields.len() != expected_len {
            return Err(BundleError::BadShape {
                field: "primary block",
            });
        }
        if !verify_trailing_crc(crc_type, raw) {
            return Err(BundleError::CrcMismatch { block_number: 0 });
        }

        let destination = field_eid(fields, 3, "destination EID")?;
        let source = field_eid(fields, 4, "source EID")?;
        let report_to = field_eid(fields, 5, "report-to EID")?;

        let ts = as_array(&fields[6]).ok_or(BundleError::BadShape {
            field: "creation timestamp",
        })?;
        if ts.len() != 2 {
            return Err(BundleError::BadShape {
                field: "creation timestamp",
            });
        }
        let creation_timestamp = CreationTimestamp {
            dtn_time_ms: as_u64(&ts[0]).ok_or(BundleError::BadShape {
                field: "creation timestamp",
            })?,
            sequence_number: as_u64(&ts[1]).ok_or(BundleError::BadShape {
                field: "creation timestamp",
            })?,
        };
        let lifetime_ms = field_u64(fields, 7, "lifetime")?;

        Ok(Self {
            bundle_flags,
            crc_type,
            destination,
            source,
            report_to,
            creation_timestamp,
            lifetime_ms,
        })
    }
}

fn field_u64(fields: &[Value], index: usize, field: &'static str) -> Result<u64, BundleError> {
    fields
        .get(index)
        .and_then(as_u64)
        .ok_or(BundleError::BadShape { field })
}

fn field_eid(fields: &[Value], index: usize, field: &'static str) -> Result<Eid, BundleError> {
    let value = fields.get(index).ok_or(BundleError::BadShape { field })?;
    eid_from_value(value).ok_or(BundleError::UnsupportedEidScheme { field })
}

#[cfg(test)]
mod tests {
    use crate::cbor::decode_one;

    use super::*;

    fn sample() -> PrimaryBlock {
        let mut primary = PrimaryBlock::new(Eid::new(1, 1), Eid::new(2, 1));
        primary.creation_timestamp = CreationTimestamp {
            dtn_time_ms: 1000,
            sequence_number: 1,
        };
        primary.lifetime_ms = 1000;
        primary
    }

    fn decode_bytes(bytes: &[u8]) -> Result<PrimaryBlock, BundleError> {
        let mut rest = bytes;
        let value = decode_one(&mut rest).unwrap();
        PrimaryBlock::decode(&value, bytes)
    }

    #[test]
    fn encode_decode_round_trips() {
        let primary = sample();
        assert_eq!(decode_bytes(&primary.encode()).unwrap(), primary);
    }

    #[test]
    fn crc_protected_primary_round_trips() {
        for crc_type in [CrcType::Crc16, CrcType::Crc32] {
            let mut primary = sample();
            primary.crc_type = crc_type;
            let bytes = primary.encode();
            assert_eq!(decode_bytes(&bytes).unwrap(), primary);

            let mut corrupted = bytes;
            corrupted[4] ^= 1;
            assert!(matches!(
                decode_bytes(&corrupted),
                Err(BundleError::CrcMismatch { block_number: 0 })
            ));
        }
    }

    #[test]
    fn wrong_version_is_rejected() {
        let mut primary = sample();
        let mut bytes = primary.encode();
        // Patch the version field (second byte of the array encoding).
        bytes[1] = 0x06;
        assert!(matches!(
            decode_bytes(&bytes),
            Err(BundleError::UnsupportedVersion { found: 6 })
        ));
        primary.bundle_flags = FLAG_IS_FRAGMENT;
        assert_eq!(
            decode_bytes(&primary.encode()),
            Err(BundleError::FragmentUnsupported)
        );
    }
}
