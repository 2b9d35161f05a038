//! Abstract Security Block encode/decode.

use ciborium::value::Value;
use thiserror::Error;

use crate::cbor::{
    as_array, as_bytes, as_u64, decode_one, eid_from_value, eid_to_value, encode_value,
};
use crate::eid::Eid;

/// Flag bit: security context parameters are present.
const FLAG_PARAMETERS_PRESENT: u64 = 0b1;

/// Errors from decoding a security block's type-specific data.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum CodecError {
    /// The byte string ended before the sequence was complete.
    #[error("security block data is truncated")]
    Truncated,

    /// An item had the wrong CBOR shape.
    #[error("malformed security block field: {field}")]
    BadShape {
        /// The field that failed to decode.
        field: &'static str,
    },

    /// Bytes remained after the final sequence item.
    #[error("trailing bytes after security block data")]
    TrailingBytes,

    /// The security source EID used a scheme other than `ipn`.
    #[error("unsupported security source EID scheme")]
    UnsupportedEidScheme,
}

/// The decoded form of a BIB's or BCB's block-type-specific data.
///
/// Parameter and result values are kept as raw CBOR values so that ids this
/// node does not interpret still round-trip bit-exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct AbstractSecurityBlock {
    /// Block numbers of the protected target blocks, in operation order.
    pub targets: Vec<u64>,
    /// RFC 9173 security context identifier.
    pub context_id: u64,
    /// Context flags; bit 0 signals that parameters are present.
    pub flags: u64,
    /// The EID of the node that added this security block.
    pub source: Eid,
    /// Context parameters as `(id, value)` pairs. Ids may repeat; the
    /// outgoing processor emits one IV parameter per target, in target
    /// order.
    pub parameters: Vec<(u64, Value)>,
    /// Per-target result lists, index-aligned with [`Self::targets`].
    pub results: Vec<Vec<(u64, Value)>>,
}

impl AbstractSecurityBlock {
    /// Creates an empty security block for the given context and source.
    #[must_use]
    pub fn new(context_id: u64, source: Eid) -> Self {
        Self {
            targets: Vec::new(),
            context_id,
            flags: 0,
            source,
            parameters: Vec::new(),
            results: Vec::new(),
        }
    }

    /// Encodes the block-type-specific data as a CBOR sequence.
    ///
    /// The parameters-present flag bit is derived from the parameter list,
    /// so a decoded block re-encodes to the same bytes.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&encode_value(&Value::Array(
            self.targets.iter().map(|&t| Value::from(t)).collect(),
        )));
        out.extend_from_slice(&encode_value(&Value::from(self.context_id)));

        let mut flags = self.flags & !FLAG_PARAMETERS_PRESENT;
        if !self.parameters.is_empty() {
            flags |= FLAG_PARAMETERS_PRESENT;
        }
        out.extend_from_slice(&encode_value(&Value::from(flags)));
        out.extend_from_slice(&encode_value(&eid_to_value(self.source)));

        if !self.parameters.is_empty() {
            out.extend_from_slice(&encode_value(&pairs_to_value(&self.parameters)));
        }
        out.extend_from_slice(&encode_value(&Value::Array(
            self.results.iter().map(|r| pairs_to_value(r)).collect(),
        )));
        out
    }

    /// Decodes block-type-specific data; the whole byte string must be
    /// consumed.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] describing the first malformed field.
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let mut rest = data;

        let targets_value = decode_one(&mut rest).ok_or(CodecError::Truncated)?;
        let targets = as_array(&targets_value)
            .ok_or(CodecError::BadShape { field: "targets" })?
            .iter()
            .map(|v| as_u64(v).ok_or(CodecError::BadShape { field: "targets" }))
            .collect::<Result<Vec<_>, _>>()?;

        let context_id = decode_u64(&mut rest, "context id")?;
        let flags = decode_u64(&mut rest, "flags")?;

        let source_value = decode_one(&mut rest).ok_or(CodecError::Truncated)?;
        let source = eid_from_value(&source_value).ok_or(CodecError::UnsupportedEidScheme)?;

        let parameters = if flags & FLAG_PARAMETERS_PRESENT != 0 {
            let value = decode_one(&mut rest).ok_or(CodecError::Truncated)?;
            value_to_pairs(&value, "parameters")?
        } else {
            Vec::new()
        };

        let results_value = decode_one(&mut rest).ok_or(CodecError::Truncated)?;
        let results = as_array(&results_value)
            .ok_or(CodecError::BadShape { field: "results" })?
            .iter()
            .map(|entry| value_to_pairs(entry, "results"))
            .collect::<Result<Vec<_>, _>>()?;

        if !rest.is_empty() {
            return Err(CodecError::TrailingBytes);
        }
        Ok(Self {
            targets,
            context_id,
            flags,
            source,
            parameters,
            results,
        })
    }

    /// First parameter with the given id, as an unsigned integer.
    #[must_use]
    pub fn param_u64(&self, id: u64) -> Option<u64> {
        self.parameters
            .iter()
            .find(|(pid, _)| *pid == id)
            .and_then(|(_, v)| as_u64(v))
    }

    /// The `index`-th parameter with the given id, as a byte string. Used
    /// for per-target IVs, which repeat the id in target order.
    #[must_use]
    pub fn param_bytes_nth(&self, id: u64, index: usize) -> Option<&[u8]> {
        self.parameters
            .iter()
            .filter(|(pid, _)| *pid == id)
            .nth(index)
            .and_then(|(_, v)| as_bytes(v))
    }

    /// Falls back to the sole parameter of an id when only one was emitted
    /// for all targets, otherwise picks the target-indexed one.
    #[must_use]
    pub fn param_bytes_for_target(&self, id: u64, target_index: usize) -> Option<&[u8]> {
        let count = self.parameters.iter().filter(|(pid, _)| *pid == id).count();
        if count == 1 {
            self.param_bytes_nth(id, 0)
        } else {
            self.param_bytes_nth(id, target_index)
        }
    }

    /// The result with the given id for the `target_index`-th target.
    #[must_use]
    pub fn result_bytes(&self, target_index: usize, id: u64) -> Option<&[u8]> {
        self.results
            .get(target_index)?
            .iter()
            .find(|(rid, _)| *rid == id)
            .and_then(|(_, v)| as_bytes(v))
    }

    /// Position of a target block number in the target list.
    #[must_use]
    pub fn target_index(&self, target: u64) -> Option<usize> {
        self.targets.iter().position(|&t| t == target)
    }

    /// Removes the operation at `target_index`, dropping the target, its
    /// results, and its slice of any per-target parameter (an id repeated
    /// once per target, the way IVs are emitted). Returns true when no
    /// operations remain.
    pub fn remove_operation(&mut self, target_index: usize) -> bool {
        let targets_before = self.targets.len();
        self.targets.remove(target_index);
        if target_index < self.results.len() {
            self.results.remove(target_index);
        }

        let mut ids: Vec<u64> = self.parameters.iter().map(|(id, _)| *id).collect();
        ids.sort_unstable();
        ids.dedup();
        for id in ids {
            let count = self.parameters.iter().filter(|(pid, _)| *pid == id).count();
            if count != targets_before {
                continue;
            }
            if let Some(pos) = self
                .parameters
                .iter()
                .enumerate()
                .filter(|(_, (pid, _))| *pid == id)
                .nth(target_index)
                .map(|(i, _)| i)
            {
                self.parameters.remove(pos);
            }
        }
        self.targets.is_empty()
    }

    /// True when this block no longer protects anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

fn decode_u64(rest: &mut &[u8], field: &'static str) -> Result<u64, CodecError> {
    let value = decode_one(rest).ok_or(CodecError::Truncated)?;
    as_u64(&value).ok_or(CodecError::BadShape { field })
}

fn pairs_to_value(pairs: &[(u64, Value)]) -> Value {
    Value::Array(
        pairs
            .iter()
            .map(|(id, v)| Value::Array(vec![Value::from(*id), v.clone()]))
            .collect(),
    )
}

fn value_to_pairs(value: &Value, field: &'static str) -> Result<Vec<(u64, Value)>, CodecError> {
    as_array(value)
        .ok_or(CodecError::BadShape { field })?
        .iter()
        .map(|pair| {
            let pair = as_array(pair).ok_or(CodecError::BadShape { field })?;
            if pair.len() != 2 {
                return Err(CodecError::BadShape { field });
            }
            let id = as_u64(&pair[0]).ok_or(CodecError::BadShape { field })?;
            Ok((id, pair[1].clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::block::{PARAM_AES_VARIANT, PARAM_IV, RESULT_AUTH};
    use crate::context::BCB_AES_GCM_ID;

    use super::*;

    fn sample_bcb() -> AbstractSecurityBlock {
        let mut asb = AbstractSecurityBlock::new(BCB_AES_GCM_ID, Eid::new(10, 1));
        asb.targets.push(1);
        asb.parameters
            .push((PARAM_IV, Value::Bytes(vec![0x11; 12])));
        asb.parameters.push((PARAM_AES_VARIANT, Value::from(3u64)));
        asb.results
            .push(vec![(RESULT_AUTH, Value::Bytes(vec![0x22; 16]))]);
        asb
    }

    #[test]
    fn decode_encode_is_identity() {
        let asb = sample_bcb();
        let bytes = asb.encode();
        let decoded = AbstractSecurityBlock::decode(&bytes).unwrap();
        assert_eq!(decoded.targets, asb.targets);
        assert_eq!(decoded.context_id, asb.context_id);
        assert_eq!(decoded.source, asb.source);
        assert_eq!(decoded.parameters, asb.parameters);
        assert_eq!(decoded.results, asb.results);
        assert_eq!(decoded.encode(), bytes);
    }

    #[test]
    fn unknown_parameter_ids_round_trip() {
        let mut asb = sample_bcb();
        asb.parameters
            .push((99, Value::Array(vec![Value::from(1u64), Value::Bytes(vec![7])])));
        let bytes = asb.encode();
        assert_eq!(AbstractSecurityBlock::decode(&bytes).unwrap().encode(), bytes);
    }

    #[test]
    fn parameters_flag_tracks_parameter_list() {
        let mut asb = sample_bcb();
        asb.parameters.clear();
        asb.flags = FLAG_PARAMETERS_PRESENT; // stale flag; encode corrects it
        let decoded = AbstractSecurityBlock::decode(&asb.encode()).unwrap();
        assert!(decoded.parameters.is_empty());
        assert_eq!(decoded.flags & FLAG_PARAMETERS_PRESENT, 0);
    }

    #[test]
    fn truncated_and_trailing_inputs_are_rejected() {
        let bytes = sample_bcb().encode();
        assert!(AbstractSecurityBlock::decode(&bytes[..bytes.len() - 1]).is_err());

        let mut padded = bytes;
        padded.push(0x00);
        assert_eq!(
            AbstractSecurityBlock::decode(&padded),
            Err(CodecError::TrailingBytes)
        );
    }

    #[test]
    fn per_target_iv_selection() {
        let mut asb = AbstractSecurityBlock::new(BCB_AES_GCM_ID, Eid::new(10, 1));
        asb.targets.extend([1, 2]);
        asb.parameters.push((PARAM_IV, Value::Bytes(vec![0xA1; 12])));
        asb.parameters.push((PARAM_IV, Value::Bytes(vec![0xA2; 12])));
        asb.results.push(Vec::new());
        asb.results.push(Vec::new());

        assert_eq!(
            asb.param_bytes_for_target(PARAM_IV, 1),
            Some(&[0xA2; 12][..])
        );

        // A single shared IV parameter serves every target.
        let mut shared = sample_bcb();
        shared.targets.push(2);
        shared.results.push(Vec::new());
        assert_eq!(
            shared.param_bytes_for_target(PARAM_IV, 1),
            Some(&[0x11; 12][..])
        );
    }

    #[test]
    fn removing_the_last_operation_empties_the_block() {
        let mut asb = sample_bcb();
        assert!(asb.remove_operation(0));
        assert!(asb.is_empty());
    }

    #[test]
    fn removing_one_operation_keeps_siblings_aligned() {
        let mut asb = AbstractSecurityBlock::new(BCB_AES_GCM_ID, Eid::new(10, 1));
        asb.targets.extend([1, 2]);
        asb.parameters.push((PARAM_IV, Value::Bytes(vec![0xA1; 12])));
        asb.parameters.push((PARAM_IV, Value::Bytes(vec![0xA2; 12])));
        asb.parameters.push((PARAM_AES_VARIANT, Value::from(3u64)));
        asb.results
            .push(vec![(RESULT_AUTH, Value::Bytes(vec![0x01; 16]))]);
        asb.results
            .push(vec![(RESULT_AUTH, Value::Bytes(vec![0x02; 16]))]);

        assert!(!asb.remove_operation(0));
        assert_eq!(asb.targets, vec![2]);
        assert_eq!(
            asb.param_bytes_for_target(PARAM_IV, 0),
            Some(&[0xA2; 12][..])
        );
        assert_eq!(asb.param_u64(PARAM_AES_VARIANT), Some(3));
        assert_eq!(asb.result_bytes(0, RESULT_AUTH), Some(&[0x02; 16][..]));
    }
}
