use crate::slot::SlotId;

/// The wire form: a canonical textual body plus the ordered slot table.
///
/// `body` contains zero-based indices into `slots`; the slot list is
/// positional and owned by the caller once produced. Capdata is ephemeral:
/// produced, transported, consumed.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CapData {
    /// Canonical textual serialization of the value graph.
    pub body: String,
    /// Opaque slot identifiers, in first-encounter order.
    pub slots: Vec<SlotId>,
}

impl CapData {
    /// Assemble capdata from its parts.
    pub fn new(body: impl Into<String>, slots: Vec<SlotId>) -> Self {
        Self {
            body: body.into(),
            slots,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction() {
        let data = CapData::new("null", vec![]);
        assert_eq!(data.body, "null");
        assert!(data.slots.is_empty());
    }

    #[test]
    fn equality_covers_slots() {
        let a = CapData::new("{}", vec![SlotId::new("o+1")]);
        let b = CapData::new("{}", vec![SlotId::new("o+1")]);
        let c = CapData::new("{}", vec![SlotId::new("o+2")]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
