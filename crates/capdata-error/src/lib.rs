use thiserror::Error;

/// Primary error type for capdata marshaling operations.
///
/// Every failure the core can produce is a variant here, grouped by the
/// stage that raises it. All failures are fail-fast: nothing is retried
/// internally and nothing is swallowed.
#[derive(Error, Debug)]
pub enum MarshalError {
    // === Classification ===
    /// A symbol other than the whitelisted asynchronous-iteration symbol.
    #[error("cannot pass symbol {name:?}: only @@asyncIterator is passable")]
    ForbiddenSymbol { name: String },

    /// A record used the reserved sentinel field name.
    #[error("property name {name:?} is reserved for the encoding")]
    ReservedFieldName { name: String },

    /// A record or list was passed while still under construction.
    #[error("value must be immutable: a node is still under construction")]
    UnsealedValue,

    /// A record or list contains itself.
    #[error("value must be immutable: the graph is cyclic")]
    CyclicValue,

    /// The value graph nests deeper than the encoder is willing to walk.
    #[error("value graph nests deeper than {max} levels")]
    NestingTooDeep { max: usize },

    // === Remotable registry ===
    /// Interface tag was neither `"Remotable"` nor `"Alleged: ..."`.
    #[error("invalid interface tag {tag:?}: expected \"Remotable\" or an \"Alleged: \" prefix")]
    InvalidInterfaceTag { tag: String },

    /// The construction target already carries an interface tag.
    #[error("target is already a remotable with interface {iface:?}")]
    AlreadyRegistered { iface: String },

    /// The construction target owns a field that is not an operation.
    #[error("remotable target field {name:?} is not an operation")]
    NonOperationField { name: String },

    /// The construction target was not an empty record.
    #[error("remotable target must be an empty record, got {style}")]
    InvalidRemotableTarget { style: String },

    // === Encode ===
    /// The caller-supplied value-to-slot translator rejected a value.
    #[error("slot translation failed: {detail}")]
    SlotTranslation { detail: String },

    // === Decode ===
    /// The body was not structurally valid canonical text.
    #[error("body parse failed: {detail}")]
    ParseFailed { detail: String },

    /// The body nests deeper than the reviver is willing to walk.
    #[error("body nests deeper than {max} levels")]
    BodyTooDeep { max: usize },

    /// A sentinel envelope carried an unknown discriminator.
    #[error("unknown @qclass {qclass:?}")]
    UnknownQClass { qclass: String },

    /// A sentinel envelope payload field was missing or mistyped.
    #[error("malformed {qclass:?} envelope: {detail}")]
    MalformedEnvelope { qclass: String, detail: String },

    /// A `slot` envelope referenced past the end of the slot table.
    #[error("slot index {index} out of range for {len} slots")]
    SlotIndexOutOfRange { index: u64, len: usize },

    /// An `ibid` envelope referenced a node not yet emitted.
    #[error("ibid index {index} out of range for {len} nodes")]
    IbidOutOfRange { index: u64, len: usize },

    /// An `ibid` envelope closed a cycle under the forbid-cycles policy.
    #[error("ibid index {index} would create a cycle")]
    ForbiddenCycle { index: u64 },

    /// A slot identifier did not follow the textual slot convention.
    #[error("invalid slot id {slot:?}")]
    InvalidSlotId { slot: String },

    /// A cycle-policy name was not one of the three known policies.
    #[error("unknown cycle policy {policy:?}")]
    UnknownCyclePolicy { policy: String },

    // === Deep-copy projection ===
    /// A pure-data copy reached a value that passes by reference.
    #[error("cannot copy a {style} across a capability boundary")]
    Uncopyable { style: String },

    // === Internal ===
    /// Internal consistency violation (should never happen).
    #[error("internal error: {0}")]
    Internal(String),
}

/// The stage of the marshaling pipeline a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Value does not fit any legal pass-style.
    Classify,
    /// Remotable construction or interface-tag violation.
    Registry,
    /// Failure while producing capdata.
    Encode,
    /// Failure while reviving capdata.
    Decode,
    /// Internal consistency violation.
    Invariant,
}

impl MarshalError {
    /// Map this error to the failure kind of the stage that raises it.
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::ForbiddenSymbol { .. }
            | Self::ReservedFieldName { .. }
            | Self::UnsealedValue
            | Self::CyclicValue
            | Self::NestingTooDeep { .. } => FailureKind::Classify,
            Self::InvalidInterfaceTag { .. }
            | Self::AlreadyRegistered { .. }
            | Self::NonOperationField { .. }
            | Self::InvalidRemotableTarget { .. } => FailureKind::Registry,
            Self::SlotTranslation { .. } | Self::Uncopyable { .. } => FailureKind::Encode,
            Self::ParseFailed { .. }
            | Self::BodyTooDeep { .. }
            | Self::UnknownQClass { .. }
            | Self::MalformedEnvelope { .. }
            | Self::SlotIndexOutOfRange { .. }
            | Self::IbidOutOfRange { .. }
            | Self::ForbiddenCycle { .. }
            | Self::InvalidSlotId { .. }
            | Self::UnknownCyclePolicy { .. } => FailureKind::Decode,
            Self::Internal(_) => FailureKind::Invariant,
        }
    }

    /// Whether this failure was caused by the shape of the input value
    /// rather than by the wire data or the core itself.
    pub const fn is_input_rejection(&self) -> bool {
        matches!(
            self.kind(),
            FailureKind::Classify | FailureKind::Registry | FailureKind::Encode
        )
    }

    /// Whether this failure was raised while consuming untrusted capdata.
    pub const fn is_wire_rejection(&self) -> bool {
        matches!(self.kind(), FailureKind::Decode)
    }

    /// Create a slot-translation error.
    pub fn slot_translation(detail: impl Into<String>) -> Self {
        Self::SlotTranslation {
            detail: detail.into(),
        }
    }

    /// Create a body-parse error.
    pub fn parse_failed(detail: impl Into<String>) -> Self {
        Self::ParseFailed {
            detail: detail.into(),
        }
    }

    /// Create a malformed-envelope error.
    pub fn malformed(qclass: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::MalformedEnvelope {
            qclass: qclass.into(),
            detail: detail.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type alias using `MarshalError`.
pub type Result<T> = std::result::Result<T, MarshalError>;
