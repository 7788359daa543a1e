//! Pass-style classification: the single source of truth for how a value
//! travels.
//!
//! The classifier is total: every value yields a [`PassStyle`] or a typed
//! failure, never a silent acceptance. Classification depends only on the
//! value's structure; repeated calls return identical results.
//!
//! Several of the source policy's checks (prototype chains, array holes,
//! accessor properties, thenables, bare functions) hold by construction in
//! this value model. Immutability does not: the write-once construction
//! hatch the reviver uses can hand out under-construction nodes, so
//! sealedness is checked here, and the traversals that recurse (the
//! encoder, the deep-copy projector) walk with an ancestor set to reject
//! cyclic graphs. The reserved sentinel field on records and the
//! one-symbol whitelist are enforced here as well.

use capdata_error::{MarshalError, Result};
use capdata_types::{PassStyle, PassableSymbol, Value, QCLASS};

/// Classify a value, or fail with a typed classification error.
///
/// Decision order, first match wins: primitives map directly; a record or
/// list still under construction fails ("must be immutable"); a record
/// owning the reserved sentinel field name fails; a symbol other than the
/// asynchronous-iteration symbol fails; remotables and promises pass by
/// reference.
pub fn pass_style_of(value: &Value) -> Result<PassStyle> {
    match value {
        Value::Undefined => Ok(PassStyle::Undefined),
        Value::Null => Ok(PassStyle::Unit),
        Value::Bool(_) => Ok(PassStyle::Boolean),
        Value::Number(_) => Ok(PassStyle::Numeric),
        Value::BigInt(_) => Ok(PassStyle::BigInt),
        Value::String(_) => Ok(PassStyle::String),
        Value::Symbol(PassableSymbol::AsyncIterator) => Ok(PassStyle::Symbol),
        Value::Symbol(other) => Err(MarshalError::ForbiddenSymbol {
            name: other.name().to_owned(),
        }),
        Value::Record(record) => {
            if !record.is_sealed() {
                return Err(MarshalError::UnsealedValue);
            }
            if record.fields().contains_key(QCLASS) {
                return Err(MarshalError::ReservedFieldName {
                    name: QCLASS.to_owned(),
                });
            }
            Ok(PassStyle::CopyRecord)
        }
        Value::List(list) => {
            if !list.is_sealed() {
                return Err(MarshalError::UnsealedValue);
            }
            Ok(PassStyle::CopyArray)
        }
        Value::Error(_) => Ok(PassStyle::CopyError),
        Value::Remotable(_) => Ok(PassStyle::Remote),
        Value::Promise(_) => Ok(PassStyle::Future),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capdata_types::{far, BigInt};

    #[test]
    fn primitives_classify_directly() {
        assert_eq!(pass_style_of(&Value::Undefined).unwrap(), PassStyle::Undefined);
        assert_eq!(pass_style_of(&Value::Null).unwrap(), PassStyle::Unit);
        assert_eq!(pass_style_of(&Value::Bool(true)).unwrap(), PassStyle::Boolean);
        assert_eq!(
            pass_style_of(&Value::Number(1.5)).unwrap(),
            PassStyle::Numeric
        );
        assert_eq!(
            pass_style_of(&Value::bigint(BigInt::from(10))).unwrap(),
            PassStyle::BigInt
        );
        assert_eq!(
            pass_style_of(&Value::string("hi")).unwrap(),
            PassStyle::String
        );
    }

    #[test]
    fn only_async_iterator_symbol_passes() {
        assert_eq!(
            pass_style_of(&Value::Symbol(PassableSymbol::AsyncIterator)).unwrap(),
            PassStyle::Symbol
        );

        let err =
            pass_style_of(&Value::Symbol(PassableSymbol::Registered("tag".to_owned())))
                .unwrap_err();
        assert!(matches!(err, MarshalError::ForbiddenSymbol { name } if name == "tag"));

        let err = pass_style_of(&Value::Symbol(PassableSymbol::Unique(
            "@@iterator".to_owned(),
        )))
        .unwrap_err();
        assert!(matches!(err, MarshalError::ForbiddenSymbol { .. }));
    }

    #[test]
    fn containers_classify_as_copy() {
        assert_eq!(
            pass_style_of(&Value::record([("a", Value::Null)])).unwrap(),
            PassStyle::CopyRecord
        );
        assert_eq!(
            pass_style_of(&Value::empty_record()).unwrap(),
            PassStyle::CopyRecord
        );
        assert_eq!(
            pass_style_of(&Value::list([Value::Null])).unwrap(),
            PassStyle::CopyArray
        );
        assert_eq!(
            pass_style_of(&Value::error("TypeError", "boom")).unwrap(),
            PassStyle::CopyError
        );
    }

    #[test]
    fn reserved_field_name_fails() {
        let v = Value::record([("@qclass", Value::string("slot"))]);
        let err = pass_style_of(&v).unwrap_err();
        assert!(matches!(err, MarshalError::ReservedFieldName { name } if name == "@qclass"));
    }

    #[test]
    fn unsealed_nodes_fail_classification() {
        use capdata_types::{ListValue, RecordValue};

        let err = pass_style_of(&Value::Record(RecordValue::pending())).unwrap_err();
        assert!(matches!(err, MarshalError::UnsealedValue));

        let err = pass_style_of(&Value::List(ListValue::pending())).unwrap_err();
        assert!(matches!(err, MarshalError::UnsealedValue));
    }

    #[test]
    fn reference_styles() {
        let r = far("thing", ["poke"]).unwrap();
        assert_eq!(pass_style_of(&r).unwrap(), PassStyle::Remote);
        assert_eq!(pass_style_of(&Value::promise()).unwrap(), PassStyle::Future);
    }

    #[test]
    fn classification_is_deterministic() {
        let v = Value::record([("a", Value::list([Value::integer(1)]))]);
        assert_eq!(pass_style_of(&v).unwrap(), pass_style_of(&v).unwrap());
    }
}
