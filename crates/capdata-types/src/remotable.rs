//! Remotable construction and the interface-tag association.
//!
//! The interface tag is owned by the remotable wrapper itself, so the
//! object-to-tag association is write-once by construction and cannot keep
//! the object alive. [`get_interface_of`] is the lookup side.

use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use capdata_error::{MarshalError, Result};

use crate::slot::SlotId;
use crate::value::{RemotableValue, Value};

/// The exact interface tag carried by untagged remotables.
pub const DEFAULT_INTERFACE: &str = "Remotable";

/// The prefix every other interface tag must carry. The tag is a debug
/// label, serialized as a hint and never authenticated.
pub const ALLEGED_PREFIX: &str = "Alleged: ";

/// A validated interface tag: exactly `"Remotable"` or `"Alleged: ..."`.
#[derive(Clone, PartialEq, Eq)]
pub struct InterfaceTag(String);

impl InterfaceTag {
    /// Validate and wrap a tag.
    pub fn new(tag: impl Into<String>) -> Result<Self> {
        let tag = tag.into();
        if tag == DEFAULT_INTERFACE || tag.starts_with(ALLEGED_PREFIX) {
            Ok(Self(tag))
        } else {
            Err(MarshalError::InvalidInterfaceTag { tag })
        }
    }

    /// Build the `"Alleged: <name>"` tag for a far name.
    pub fn alleged(far_name: &str) -> Self {
        Self(format!("{ALLEGED_PREFIX}{far_name}"))
    }

    /// The raw tag text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InterfaceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for InterfaceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InterfaceTag({:?})", self.0)
    }
}

/// Construct a remotable: validate the interface tag, confirm the target
/// carries no data fields, snapshot the operation names onto the shell,
/// and assign a fresh local object handle.
///
/// The target must be an empty record (the only record shape eligible for
/// promotion to by-reference identity). A target that is already a
/// remotable fails as a re-registration; any data-bearing target fails
/// field by field.
pub fn remotable<I, S>(iface: &str, props: I, target: Value) -> Result<Value>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let iface = InterfaceTag::new(iface)?;

    match &target {
        Value::Remotable(existing) => {
            return Err(MarshalError::AlreadyRegistered {
                iface: existing.iface().to_owned(),
            });
        }
        Value::Record(record) => {
            if let Some(name) = record.fields().keys().next() {
                return Err(MarshalError::NonOperationField { name: name.clone() });
            }
        }
        other => {
            return Err(MarshalError::InvalidRemotableTarget {
                style: other.type_name().to_owned(),
            });
        }
    }

    let mut methods = BTreeSet::new();
    for prop in props {
        let name = prop.into();
        if name.is_empty() {
            return Err(MarshalError::NonOperationField { name });
        }
        methods.insert(name);
    }

    Ok(Value::Remotable(Rc::new(RemotableValue::new(
        iface,
        methods,
        SlotId::fresh_object(),
    ))))
}

/// Shorthand for a far object: `remotable("Alleged: " + far_name, props,
/// empty record)`.
pub fn far<I, S>(far_name: &str, props: I) -> Result<Value>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    remotable(
        InterfaceTag::alleged(far_name).as_str(),
        props,
        Value::empty_record(),
    )
}

/// Build a local stand-in for a remote object known only by its handle.
///
/// Used when reviving a `slot` reference: the interface tag is the wire
/// hint (unauthenticated), the operation set is unknown, and the handle is
/// carried through so re-encoding yields the same slot.
pub fn presence(iface: &str, handle: SlotId) -> Result<Value> {
    let iface = InterfaceTag::new(iface)?;
    Ok(Value::Remotable(Rc::new(RemotableValue::new(
        iface,
        BTreeSet::new(),
        handle,
    ))))
}

/// The interface tag of a remotable, or `None` for anything else.
pub fn get_interface_of(value: &Value) -> Option<&str> {
    value.as_remotable().map(RemotableValue::iface)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_interface_is_valid() {
        let r = remotable(DEFAULT_INTERFACE, ["poke"], Value::empty_record()).unwrap();
        assert_eq!(get_interface_of(&r), Some("Remotable"));
        assert!(r.as_remotable().unwrap().has_method("poke"));
    }

    #[test]
    fn far_builds_alleged_tag() {
        let r = far("counter", ["incr", "read"]).unwrap();
        assert_eq!(get_interface_of(&r), Some("Alleged: counter"));
        let methods: Vec<&str> = r.as_remotable().unwrap().methods().collect();
        assert_eq!(methods, ["incr", "read"]);
    }

    #[test]
    fn invalid_tag_rejected() {
        let err = remotable("counter", ["poke"], Value::empty_record()).unwrap_err();
        assert!(matches!(err, MarshalError::InvalidInterfaceTag { tag } if tag == "counter"));
    }

    #[test]
    fn reregistration_rejected() {
        let first = far("counter", ["incr"]).unwrap();
        let err = remotable(DEFAULT_INTERFACE, ["poke"], first).unwrap_err();
        assert!(
            matches!(err, MarshalError::AlreadyRegistered { iface } if iface == "Alleged: counter")
        );
    }

    #[test]
    fn data_target_rejected() {
        let target = Value::record([("count", Value::integer(0))]);
        let err = remotable(DEFAULT_INTERFACE, ["incr"], target).unwrap_err();
        assert!(matches!(err, MarshalError::NonOperationField { name } if name == "count"));
    }

    #[test]
    fn non_record_target_rejected() {
        let err = remotable(DEFAULT_INTERFACE, ["incr"], Value::integer(1)).unwrap_err();
        assert!(matches!(
            err,
            MarshalError::InvalidRemotableTarget { style } if style == "number"
        ));
    }

    #[test]
    fn empty_operation_name_rejected() {
        let err = remotable(DEFAULT_INTERFACE, [""], Value::empty_record()).unwrap_err();
        assert!(matches!(err, MarshalError::NonOperationField { name } if name.is_empty()));
    }

    #[test]
    fn presence_keeps_handle_and_hint() {
        let p = presence("Alleged: purse", SlotId::new("o-4")).unwrap();
        let remotable = p.as_remotable().unwrap();
        assert_eq!(remotable.iface(), "Alleged: purse");
        assert_eq!(remotable.handle().as_str(), "o-4");
        assert_eq!(remotable.methods().count(), 0);

        let err = presence("purse", SlotId::new("o-4")).unwrap_err();
        assert!(matches!(err, MarshalError::InvalidInterfaceTag { .. }));
    }

    #[test]
    fn interface_lookup_misses_non_remotables() {
        assert_eq!(get_interface_of(&Value::Null), None);
        assert_eq!(get_interface_of(&Value::promise()), None);
    }

    #[test]
    fn debug_stringification() {
        let r = far("bank", ["deposit"]).unwrap();
        assert_eq!(format!("{:?}", r.as_remotable().unwrap()), "[Alleged: bank]");
    }
}
