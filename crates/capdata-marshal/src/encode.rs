//! The encoder: pre-order traversal producing a canonical textual body
//! and the ordered slot table.
//!
//! The body is the minified serialization of a plain raw tree built over
//! `serde_json::Value`. Record fields are inserted in ascending name
//! order, so structurally equal inputs produce byte-identical bodies.
//! Sentinel envelopes carry the reserved `@qclass` field first.

use std::collections::{HashMap, HashSet};

use capdata_error::{MarshalError, Result};
use capdata_types::{CapData, NodeId, SlotId, Value, QCLASS};
use serde_json::{Map, Number as JsonNumber, Value as Json};

use crate::classify::pass_style_of;
use crate::ibid::EncodeIbidTable;
use crate::Marshal;

/// Maximum nesting the encoder will walk before rejecting the graph.
pub const MAX_VALUE_DEPTH: usize = 64;

pub(crate) fn serialize(marshal: &Marshal, root: &Value) -> Result<CapData> {
    let mut encoder = Encoder {
        marshal,
        slots: Vec::new(),
        slot_indexes: HashMap::new(),
        ibids: EncodeIbidTable::new(),
        path: HashSet::new(),
    };
    let raw = encoder.encode_value(root, 0)?;
    let body = serde_json::to_string(&raw)
        .map_err(|error| MarshalError::internal(format!("raw tree serialization: {error}")))?;
    Ok(CapData {
        body,
        slots: encoder.slots,
    })
}

struct Encoder<'m> {
    marshal: &'m Marshal,
    slots: Vec<SlotId>,
    slot_indexes: HashMap<NodeId, usize>,
    ibids: EncodeIbidTable,
    /// Nodes on the current root-to-leaf path. A repeat means the graph
    /// reaches one of its own ancestors; sharing a finished node is legal
    /// and handled by the ibid table instead.
    path: HashSet<NodeId>,
}

impl Encoder<'_> {
    fn encode_value(&mut self, value: &Value, depth: usize) -> Result<Json> {
        if depth > MAX_VALUE_DEPTH {
            return Err(MarshalError::NestingTooDeep {
                max: MAX_VALUE_DEPTH,
            });
        }

        // The classifier gates every node; its rejections (forbidden
        // symbols, the reserved field name, unsealed nodes) become encode
        // failures here.
        pass_style_of(value)?;

        match value {
            Value::Undefined => Ok(tag_envelope("undefined")),
            Value::Null => Ok(Json::Null),
            Value::Bool(b) => Ok(Json::Bool(*b)),
            Value::Number(n) => Ok(encode_number(*n)),
            Value::BigInt(i) => {
                let mut envelope = qclass_map("bigint");
                envelope.insert("digits".to_owned(), Json::String(i.to_string()));
                Ok(Json::Object(envelope))
            }
            Value::String(s) => Ok(Json::String(s.clone())),
            // The classifier admits exactly one symbol.
            Value::Symbol(_) => Ok(tag_envelope("@@asyncIterator")),
            Value::Record(record) => {
                let id = self.enter(value)?;
                if let Some(index) = self.ibids.get(value) {
                    return Ok(ibid_envelope(index));
                }
                self.ibids.register(value)?;
                self.path.insert(id);
                let mut out = Map::with_capacity(record.fields().len());
                for (name, field) in record.fields() {
                    out.insert(name.clone(), self.encode_value(field, depth + 1)?);
                }
                self.path.remove(&id);
                Ok(Json::Object(out))
            }
            Value::List(list) => {
                let id = self.enter(value)?;
                if let Some(index) = self.ibids.get(value) {
                    return Ok(ibid_envelope(index));
                }
                self.ibids.register(value)?;
                self.path.insert(id);
                let mut out = Vec::with_capacity(list.items().len());
                for item in list.items() {
                    out.push(self.encode_value(item, depth + 1)?);
                }
                self.path.remove(&id);
                Ok(Json::Array(out))
            }
            Value::Error(err) => {
                if let Some(index) = self.ibids.get(value) {
                    return Ok(ibid_envelope(index));
                }
                self.ibids.register(value)?;
                let error_id = self.marshal.fresh_error_id();
                tracing::info!(
                    error_id = %error_id,
                    name = err.name(),
                    message = err.message(),
                    "error passing through marshal"
                );
                let mut envelope = qclass_map("error");
                envelope.insert("errorId".to_owned(), Json::String(error_id));
                envelope.insert("name".to_owned(), Json::String(err.name().to_owned()));
                envelope.insert("message".to_owned(), Json::String(err.message().to_owned()));
                Ok(Json::Object(envelope))
            }
            Value::Remotable(remotable) => {
                let iface = remotable.iface().to_owned();
                self.encode_slot(value, Some(iface))
            }
            Value::Promise(_) => self.encode_slot(value, None),
        }
    }

    /// Check a container node against the current traversal path before
    /// anything else, so a graph that reaches one of its own ancestors
    /// fails classification-style rather than emitting a backreference.
    fn enter(&self, value: &Value) -> Result<NodeId> {
        let id = value
            .node_id()
            .ok_or_else(|| MarshalError::internal("container without identity"))?;
        if self.path.contains(&id) {
            return Err(MarshalError::CyclicValue);
        }
        Ok(id)
    }

    /// Emit a slot envelope for a by-reference value. Duplicates hit the
    /// slot map first and re-emit the same index, never an ibid; the first
    /// occurrence still consumes an ibid ordinal so both sides number
    /// nodes identically.
    fn encode_slot(&mut self, value: &Value, iface: Option<String>) -> Result<Json> {
        let id = value
            .node_id()
            .ok_or_else(|| MarshalError::internal("slot value without identity"))?;

        let index = if let Some(&index) = self.slot_indexes.get(&id) {
            index
        } else {
            self.ibids.register(value)?;
            let slot = (self.marshal.val_to_slot)(value)?;
            let index = self.slots.len();
            self.slot_indexes.insert(id, index);
            self.slots.push(slot);
            index
        };

        let mut envelope = qclass_map("slot");
        envelope.insert("index".to_owned(), Json::Number(JsonNumber::from(index)));
        if let Some(iface) = iface {
            envelope.insert("iface".to_owned(), Json::String(iface));
        }
        Ok(Json::Object(envelope))
    }
}

fn qclass_map(tag: &str) -> Map<String, Json> {
    let mut map = Map::new();
    map.insert(QCLASS.to_owned(), Json::String(tag.to_owned()));
    map
}

fn tag_envelope(tag: &str) -> Json {
    Json::Object(qclass_map(tag))
}

fn ibid_envelope(index: u64) -> Json {
    let mut envelope = qclass_map("ibid");
    envelope.insert("index".to_owned(), Json::Number(JsonNumber::from(index)));
    Json::Object(envelope)
}

/// Encode a number. Negative zero normalizes to positive zero (explicit
/// information loss); integral finite values within the 64-bit integer
/// ranges emit as bare JSON integers; the unrepresentable numerics travel
/// as envelopes. Integral magnitudes beyond those ranges (above 2^64, or
/// below -2^63) keep the float formatter's spelling, which may carry a
/// fraction or an exponent marker.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::float_cmp
)]
fn encode_number(n: f64) -> Json {
    if n.is_nan() {
        return tag_envelope("NaN");
    }
    if n == f64::INFINITY {
        return tag_envelope("Infinity");
    }
    if n == f64::NEG_INFINITY {
        return tag_envelope("-Infinity");
    }

    let n = if n == 0.0 { 0.0 } else { n };
    if n.fract() == 0.0 {
        if n >= -9_223_372_036_854_775_808.0 && n < 9_223_372_036_854_775_808.0 {
            return Json::Number(JsonNumber::from(n as i64));
        }
        if n >= 9_223_372_036_854_775_808.0 && n < 18_446_744_073_709_551_616.0 {
            return Json::Number(JsonNumber::from(n as u64));
        }
    }
    let number = JsonNumber::from_f64(n).expect("finite number");
    Json::Number(number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_normalizes_negative_zero() {
        assert_eq!(encode_number(-0.0).to_string(), "0");
        assert_eq!(encode_number(0.0).to_string(), "0");
    }

    #[test]
    fn number_integrals_emit_as_integers() {
        assert_eq!(encode_number(7.0).to_string(), "7");
        assert_eq!(encode_number(-3.0).to_string(), "-3");
        assert_eq!(encode_number(1.5).to_string(), "1.5");
    }

    #[test]
    fn number_integrals_past_i64_stay_bare() {
        // 2^63 and 2^64 - 2^11 are exactly representable doubles.
        assert_eq!(
            encode_number(9_223_372_036_854_775_808.0).to_string(),
            "9223372036854775808"
        );
        assert_eq!(
            encode_number(18_446_744_073_709_549_568.0).to_string(),
            "18446744073709549568"
        );
    }

    #[test]
    fn number_unrepresentables_emit_envelopes() {
        assert_eq!(encode_number(f64::NAN).to_string(), r#"{"@qclass":"NaN"}"#);
        assert_eq!(
            encode_number(f64::INFINITY).to_string(),
            r#"{"@qclass":"Infinity"}"#
        );
        assert_eq!(
            encode_number(f64::NEG_INFINITY).to_string(),
            r#"{"@qclass":"-Infinity"}"#
        );
    }
}
