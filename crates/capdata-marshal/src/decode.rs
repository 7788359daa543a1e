//! The decoder: strict parse, then a pre-order revive that mirrors the
//! encoder's traversal.
//!
//! Every malformed envelope, out-of-range index, and unknown sentinel is
//! fatal and localized to the operation; nothing mutable outlives a failed
//! call.

use std::collections::{BTreeMap, HashMap};

use capdata_error::{MarshalError, Result};
use capdata_types::{
    CapData, CyclePolicy, ListValue, PassableSymbol, RecordValue, SlotId, Value, QCLASS,
};
use serde_json::{Map, Value as Json};

use crate::ibid::DecodeIbidTable;
use crate::Marshal;

/// Maximum nesting the reviver will walk. The parse phase already bounds
/// recursion; this is the reviver's own check against crafted bodies.
pub const MAX_BODY_DEPTH: usize = 128;

/// Error class names revived as themselves; anything else collapses to
/// the base class.
const ERROR_NAME_WHITELIST: &[&str] = &[
    "Error",
    "EvalError",
    "RangeError",
    "ReferenceError",
    "SyntaxError",
    "TypeError",
    "URIError",
];

pub(crate) fn unserialize(marshal: &Marshal, data: &CapData, policy: CyclePolicy) -> Result<Value> {
    let raw: Json = serde_json::from_str(&data.body)
        .map_err(|error| MarshalError::parse_failed(error.to_string()))?;

    let mut reviver = Reviver {
        marshal,
        slots: &data.slots,
        policy,
        ibids: DecodeIbidTable::new(),
        slot_standins: HashMap::new(),
    };
    reviver.revive(&raw, 0)
}

struct Reviver<'m> {
    marshal: &'m Marshal,
    slots: &'m [SlotId],
    policy: CyclePolicy,
    ibids: DecodeIbidTable,
    /// First stand-in per slot index; repeated `slot` envelopes reuse it
    /// without consuming a new ibid ordinal, mirroring the encoder's
    /// slot-map-first rule.
    slot_standins: HashMap<usize, Value>,
}

impl Reviver<'_> {
    fn revive(&mut self, raw: &Json, depth: usize) -> Result<Value> {
        if depth > MAX_BODY_DEPTH {
            return Err(MarshalError::BodyTooDeep {
                max: MAX_BODY_DEPTH,
            });
        }

        match raw {
            Json::Null => Ok(Value::Null),
            Json::Bool(b) => Ok(Value::Bool(*b)),
            Json::Number(n) => {
                let n = n
                    .as_f64()
                    .ok_or_else(|| MarshalError::parse_failed("number outside f64 range"))?;
                Ok(Value::Number(n))
            }
            Json::String(s) => Ok(Value::String(s.clone())),
            Json::Array(items) => {
                let node = ListValue::pending();
                let value = Value::List(node.clone());
                let index = self.ibids.start(value.clone());
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.revive(item, depth + 1)?);
                }
                node.seal(out)?;
                self.ibids.finish(index);
                Ok(value)
            }
            Json::Object(map) => {
                if map.contains_key(QCLASS) {
                    self.revive_envelope(map)
                } else {
                    let node = RecordValue::pending();
                    let value = Value::Record(node.clone());
                    let index = self.ibids.start(value.clone());
                    let mut fields = BTreeMap::new();
                    for (name, field) in map {
                        fields.insert(name.clone(), self.revive(field, depth + 1)?);
                    }
                    node.seal(fields)?;
                    self.ibids.finish(index);
                    Ok(value)
                }
            }
        }
    }

    fn revive_envelope(&mut self, map: &Map<String, Json>) -> Result<Value> {
        let Some(Json::String(tag)) = map.get(QCLASS) else {
            return Err(MarshalError::malformed(
                QCLASS,
                "sentinel value must be a string",
            ));
        };

        match tag.as_str() {
            "undefined" => Ok(Value::Undefined),
            "NaN" => Ok(Value::Number(f64::NAN)),
            "Infinity" => Ok(Value::Number(f64::INFINITY)),
            "-Infinity" => Ok(Value::Number(f64::NEG_INFINITY)),
            "@@asyncIterator" => Ok(Value::Symbol(PassableSymbol::AsyncIterator)),
            "bigint" => {
                let Some(Json::String(digits)) = map.get("digits") else {
                    return Err(MarshalError::malformed("bigint", "digits must be a string"));
                };
                let i = digits.parse().map_err(|_| {
                    MarshalError::malformed("bigint", format!("invalid digits {digits:?}"))
                })?;
                Ok(Value::BigInt(i))
            }
            "error" => {
                let Some(Json::String(name)) = map.get("name") else {
                    return Err(MarshalError::malformed("error", "name must be a string"));
                };
                let Some(Json::String(message)) = map.get("message") else {
                    return Err(MarshalError::malformed("error", "message must be a string"));
                };
                match map.get("errorId") {
                    None | Some(Json::String(_)) => {}
                    Some(_) => {
                        return Err(MarshalError::malformed(
                            "error",
                            "errorId must be a string",
                        ));
                    }
                }
                let value = Value::error(canonical_error_name(name), message);
                self.ibids.register(value.clone());
                Ok(value)
            }
            "slot" => {
                let index = required_index(map, "slot")?;
                let len = self.slots.len();
                let ix = usize::try_from(index)
                    .ok()
                    .filter(|ix| *ix < len)
                    .ok_or(MarshalError::SlotIndexOutOfRange { index, len })?;
                let iface = match map.get("iface") {
                    None => None,
                    Some(Json::String(iface)) => Some(iface.as_str()),
                    Some(_) => {
                        return Err(MarshalError::malformed("slot", "iface must be a string"));
                    }
                };

                if let Some(standin) = self.slot_standins.get(&ix) {
                    return Ok(standin.clone());
                }
                let value = (self.marshal.slot_to_val)(&self.slots[ix], iface)?;
                self.ibids.register(value.clone());
                self.slot_standins.insert(ix, value.clone());
                Ok(value)
            }
            "ibid" => {
                let index = required_index(map, "ibid")?;
                self.ibids.lookup(index, self.policy)
            }
            other => Err(MarshalError::UnknownQClass {
                qclass: other.to_owned(),
            }),
        }
    }
}

fn required_index(map: &Map<String, Json>, qclass: &str) -> Result<u64> {
    map.get("index")
        .and_then(Json::as_u64)
        .ok_or_else(|| MarshalError::malformed(qclass, "index must be a non-negative integer"))
}

fn canonical_error_name(name: &str) -> &str {
    if ERROR_NAME_WHITELIST.contains(&name) {
        name
    } else {
        "Error"
    }
}
