//! Shared canonical-CBOR helpers for the bundle and security-block codecs.
//!
//! Everything emitted here is definite-length with minimal-width integers,
//! which is what `ciborium` produces and what canonical BPv7 encoding
//! requires for bit-exact round trips.

use ciborium::value::Value;

use crate::eid::Eid;

/// The `ipn` URI scheme code on the wire.
pub(crate) const IPN_SCHEME: u64 = 2;

/// Serializes a single CBOR item into a byte vector.
pub(crate) fn encode_value(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    // Writing into a Vec cannot fail.
    ciborium::ser::into_writer(value, &mut out)
        .unwrap_or_else(|_| unreachable!("CBOR serialization into a Vec is infallible"));
    out
}

/// Appends the canonical encoding of an unsigned integer.
pub(crate) fn encode_u64_into(value: u64, out: &mut Vec<u8>) {
    out.extend_from_slice(&encode_value(&Value::from(value)));
}

/// Reads one CBOR item from the front of `input`, advancing it.
pub(crate) fn decode_one(input: &mut &[u8]) -> Option<Value> {
    ciborium::de::from_reader(input).ok()
}

pub(crate) fn as_u64(value: &Value) -> Option<u64> {
    value.as_integer().and_then(|i| u64::try_from(i).ok())
}

pub(crate) fn as_array(value: &Value) -> Option<&[Value]> {
    value.as_array().map(Vec::as_slice)
}

pub(crate) fn as_bytes(value: &Value) -> Option<&[u8]> {
    value.as_bytes().map(Vec::as_slice)
}

/// CBOR shape of an `ipn` EID: `[2, [node, service]]`.
pub(crate) fn eid_to_value(eid: Eid) -> Value {
    Value::Array(vec![
        Value::from(IPN_SCHEME),
        Value::Array(vec![
            Value::from(eid.node_id),
            Value::from(eid.service_id),
        ]),
    ])
}

/// Decodes an `ipn` EID value; other schemes yield `None`.
pub(crate) fn eid_from_value(value: &Value) -> Option<Eid> {
    let parts = as_array(value)?;
    if parts.len() != 2 || as_u64(&parts[0])? != IPN_SCHEME {
        return None;
    }
    let ssp = as_array(&parts[1])?;
    if ssp.len() != 2 {
        return None;
    }
    Some(Eid::new(as_u64(&ssp[0])?, as_u64(&ssp[1])?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u64_encoding_is_minimal_width() {
        assert_eq!(encode_value(&Value::from(0u64)), [0x00]);
        assert_eq!(encode_value(&Value::from(23u64)), [0x17]);
        assert_eq!(encode_value(&Value::from(24u64)), [0x18, 24]);
        assert_eq!(encode_value(&Value::from(256u64)), [0x19, 0x01, 0x00]);
    }

    #[test]
    fn eid_values_round_trip() {
        let eid = Eid::new(977, 3);
        let value = eid_to_value(eid);
        assert_eq!(eid_from_value(&value), Some(eid));
    }

    #[test]
    fn non_ipn_schemes_are_rejected() {
        let dtn_none = Value::Array(vec![Value::from(1u64), Value::from(0u64)]);
        assert_eq!(eid_from_value(&dtn_none), None);
    }

    #[test]
    fn decode_one_consumes_exactly_one_item() {
        let mut bytes = encode_value(&Value::from(5u64));
        bytes.extend_from_slice(&encode_value(&Value::from(300u64)));
        let mut rest: &[u8] = &bytes;

        assert_eq!(as_u64(&decode_one(&mut rest).unwrap()), Some(5));
        assert_eq!(as_u64(&decode_one(&mut rest).unwrap()), Some(300));
        assert!(rest.is_empty());
        assert!(decode_one(&mut rest).is_none());
    }
}
