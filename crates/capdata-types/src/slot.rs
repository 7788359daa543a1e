//! Opaque slot identifiers and the textual slot convention.
//!
//! The core treats slots as opaque handles; only the default translators
//! and the fresh-handle allocator interpret them. A parseable slot reads
//! `<type><sign><index>`: type `o` (object) or `p` (promise), sign `+`
//! (allocated locally) or `-` (allocated by the peer), index a decimal
//! `u64` with no superfluous leading zeros.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use capdata_error::{MarshalError, Result};

static NEXT_OBJECT_INDEX: AtomicU64 = AtomicU64::new(1);
static NEXT_PROMISE_INDEX: AtomicU64 = AtomicU64::new(1);

/// An opaque, positional handle for a non-copyable value.
#[derive(Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct SlotId(String);

impl SlotId {
    /// Wrap an arbitrary textual handle. No validation: the slot space is
    /// opaque to the core.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Allocate a fresh local object handle (`o+N`).
    pub fn fresh_object() -> Self {
        let n = NEXT_OBJECT_INDEX.fetch_add(1, Ordering::Relaxed);
        Self(format!("o+{n}"))
    }

    /// Allocate a fresh local promise handle (`p+N`).
    pub fn fresh_promise() -> Self {
        let n = NEXT_PROMISE_INDEX.fetch_add(1, Ordering::Relaxed);
        Self(format!("p+{n}"))
    }

    /// The raw textual handle.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse this handle against the textual slot convention.
    pub fn parse(&self) -> Result<ParsedSlot> {
        let invalid = || MarshalError::InvalidSlotId {
            slot: self.0.clone(),
        };

        let mut chars = self.0.chars();
        let kind = match chars.next() {
            Some('o') => SlotKind::Object,
            Some('p') => SlotKind::Promise,
            _ => return Err(invalid()),
        };
        let local = match chars.next() {
            Some('+') => true,
            Some('-') => false,
            _ => return Err(invalid()),
        };

        let digits = chars.as_str();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if digits.len() > 1 && digits.starts_with('0') {
            return Err(invalid());
        }
        let index = digits.parse::<u64>().map_err(|_| invalid())?;

        Ok(ParsedSlot { kind, local, index })
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SlotId({})", self.0)
    }
}

impl From<&str> for SlotId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SlotId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// What a parseable slot identifier names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    /// A remote-style object.
    Object,
    /// A not-yet-available value.
    Promise,
}

/// The decoded form of a slot following the textual convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedSlot {
    /// Object or promise.
    pub kind: SlotKind,
    /// Whether the handle was allocated by this side (`+`) or the peer (`-`).
    pub local: bool,
    /// The allocation index.
    pub index: u64,
}
