//! Value model and wire types for the capdata marshaling core.
//!
//! This crate defines the domain the marshal operates over:
//! - the [`Value`] sum type (primitives, records, lists, errors,
//!   remotables, promises) with pointer-identity composite nodes
//! - [`PassStyle`], the total classification tag
//! - [`CapData`], the `{body, slots}` wire form
//! - [`SlotId`] and the textual slot convention
//! - remotable construction and the interface-tag association
//! - [`CyclePolicy`], the caller-chosen backreference policy

pub mod capdata;
pub mod pass_style;
pub mod remotable;
pub mod slot;
pub mod value;

pub use capdata::CapData;
pub use num_bigint::BigInt;
pub use pass_style::PassStyle;
pub use remotable::{
    far, get_interface_of, presence, remotable, InterfaceTag, ALLEGED_PREFIX, DEFAULT_INTERFACE,
};
pub use slot::{ParsedSlot, SlotId, SlotKind};
pub use value::{
    ErrorValue, ListValue, NodeId, PassableSymbol, PromiseValue, RecordValue, RemotableValue,
    Value,
};

use std::fmt;
use std::str::FromStr;

use capdata_error::MarshalError;

/// The reserved sentinel field name that discriminates encoded envelopes
/// from natural records. An input record owning this name fails
/// classification.
pub const QCLASS: &str = "@qclass";

/// What the reviver does when a backreference lands on a node whose
/// construction has not finished.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CyclePolicy {
    /// Return the partially built reference.
    AllowCycles,
    /// Log at warn level and return the reference.
    WarnOfCycles,
    /// Fail the decode.
    #[default]
    ForbidCycles,
}

impl CyclePolicy {
    /// The policy's literal wire-facing name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AllowCycles => "allowCycles",
            Self::WarnOfCycles => "warnOfCycles",
            Self::ForbidCycles => "forbidCycles",
        }
    }
}

impl fmt::Display for CyclePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CyclePolicy {
    type Err = MarshalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allowCycles" => Ok(Self::AllowCycles),
            "warnOfCycles" => Ok(Self::WarnOfCycles),
            "forbidCycles" => Ok(Self::ForbidCycles),
            other => Err(MarshalError::UnknownCyclePolicy {
                policy: other.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_policy_default_forbids() {
        assert_eq!(CyclePolicy::default(), CyclePolicy::ForbidCycles);
    }

    #[test]
    fn cycle_policy_round_trips_names() {
        for policy in [
            CyclePolicy::AllowCycles,
            CyclePolicy::WarnOfCycles,
            CyclePolicy::ForbidCycles,
        ] {
            assert_eq!(policy.as_str().parse::<CyclePolicy>().unwrap(), policy);
        }
    }

    #[test]
    fn cycle_policy_rejects_unknown() {
        let err = "retryCycles".parse::<CyclePolicy>().unwrap_err();
        assert!(
            matches!(err, MarshalError::UnknownCyclePolicy { policy } if policy == "retryCycles")
        );
    }

    #[test]
    fn sentinel_constant() {
        assert_eq!(QCLASS, "@qclass");
    }
}
