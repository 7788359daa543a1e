//! Capability marshaling core.
//!
//! A [`Marshal`] converts a value graph that may include remote-object
//! references and unresolved promises into the self-describing
//! [`CapData`] wire form, and reconstructs an equivalent graph on the
//! receiving side. It is parameterized by two caller-supplied translators:
//! value-to-slot (invoked for by-reference values to extract their opaque
//! handle) and slot-to-value (invoked during decode to materialize a local
//! stand-in from a handle and an optional interface hint).
//!
//! The core is fully synchronous and single-threaded: every `serialize`
//! and `unserialize` call is a pure, turn-local computation bounded by
//! input size. It owns no ambient state; ibid tables live for the
//! duration of a single call, and slot lists are owned by the caller
//! after encode.

pub mod classify;
pub mod copy;
mod decode;
mod encode;
mod ibid;

use std::cell::Cell;

pub use capdata_error::{FailureKind, MarshalError, Result};
pub use capdata_types::{
    far, get_interface_of, presence, remotable, BigInt, CapData, CyclePolicy, ErrorValue,
    InterfaceTag, ListValue, NodeId, ParsedSlot, PassStyle, PassableSymbol, PromiseValue,
    RecordValue, RemotableValue, SlotId, SlotKind, Value, ALLEGED_PREFIX, DEFAULT_INTERFACE,
    QCLASS,
};
pub use classify::pass_style_of;
pub use copy::pure_copy;
pub use decode::MAX_BODY_DEPTH;
pub use encode::MAX_VALUE_DEPTH;

/// Translator from a by-reference value to its opaque slot identifier.
pub type ValToSlotFn = dyn Fn(&Value) -> Result<SlotId>;

/// Translator from a slot identifier (plus an optional interface hint) to
/// a local stand-in value.
pub type SlotToValFn = dyn Fn(&SlotId, Option<&str>) -> Result<Value>;

/// The marshal name used when the caller does not supply one.
pub const DEFAULT_MARSHAL_NAME: &str = "anon-marshal";

/// An encode/decode pair over a fixed pair of slot translators.
pub struct Marshal {
    pub(crate) val_to_slot: Box<ValToSlotFn>,
    pub(crate) slot_to_val: Box<SlotToValFn>,
    marshal_name: String,
    next_error_id: Cell<u64>,
}

impl Marshal {
    /// A marshal over the default translators: by-reference values carry
    /// their construction handle out, and slots revive as presence or
    /// promise stand-ins according to the textual slot convention.
    pub fn new() -> Self {
        make_marshal(
            Box::new(default_val_to_slot),
            Box::new(default_slot_to_val),
            DEFAULT_MARSHAL_NAME,
        )
    }

    /// The label carried into generated error ids.
    pub fn marshal_name(&self) -> &str {
        &self.marshal_name
    }

    /// Encode a value graph into capdata.
    ///
    /// Fails if any reachable value fails classification or slot
    /// translation; nothing partial is returned.
    pub fn serialize(&self, root: &Value) -> Result<CapData> {
        encode::serialize(self, root)
    }

    /// Decode capdata under the default forbid-cycles policy.
    pub fn unserialize(&self, data: &CapData) -> Result<Value> {
        self.unserialize_with_policy(data, CyclePolicy::default())
    }

    /// Decode capdata under an explicit cycle policy.
    pub fn unserialize_with_policy(&self, data: &CapData, policy: CyclePolicy) -> Result<Value> {
        decode::unserialize(self, data, policy)
    }

    /// Mint the next error id for an error passing through encode.
    /// Ids are monotonic within this marshal instance and exist for
    /// side-channel correlation.
    pub(crate) fn fresh_error_id(&self) -> String {
        let n = self.next_error_id.get() + 1;
        self.next_error_id.set(n);
        format!("error:{}#{n}", self.marshal_name)
    }
}

impl Default for Marshal {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a marshal from explicit translators and a name for error ids.
pub fn make_marshal(
    val_to_slot: Box<ValToSlotFn>,
    slot_to_val: Box<SlotToValFn>,
    marshal_name: impl Into<String>,
) -> Marshal {
    Marshal {
        val_to_slot,
        slot_to_val,
        marshal_name: marshal_name.into(),
        next_error_id: Cell::new(0),
    }
}

/// Default value-to-slot translator: the handle the remotable or promise
/// was constructed with.
pub fn default_val_to_slot(value: &Value) -> Result<SlotId> {
    match value {
        Value::Remotable(remotable) => Ok(remotable.handle().clone()),
        Value::Promise(promise) => Ok(promise.handle().clone()),
        other => Err(MarshalError::slot_translation(format!(
            "{} has no slot handle",
            other.type_name()
        ))),
    }
}

/// Default slot-to-value translator: parse the handle against the textual
/// slot convention and fabricate a presence (for object slots, honoring
/// the interface hint) or a promise stand-in, carrying the handle through
/// so re-encoding yields the same slot.
pub fn default_slot_to_val(slot: &SlotId, iface: Option<&str>) -> Result<Value> {
    let parsed = slot.parse()?;
    match parsed.kind {
        SlotKind::Promise => Ok(Value::promise_with_handle(slot.clone())),
        SlotKind::Object => presence(iface.unwrap_or(DEFAULT_INTERFACE), slot.clone()),
    }
}
