use std::cell::OnceCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

use capdata_error::{MarshalError, Result};
use num_bigint::BigInt;

use crate::remotable::InterfaceTag;
use crate::slot::SlotId;

/// A passable value.
///
/// This is the input and output domain of the marshal: a closed sum type
/// over the unit absence, primitives, copyable containers, error objects,
/// and the two by-reference cases (remotables and promises). Composite
/// nodes sit behind [`Rc`], so cloning a `Value` is cheap and object
/// identity is pointer identity (see [`Value::node_id`]).
///
/// Every value is immutable once sealed. Records and lists seal their
/// contents through a write-once cell so the reviver can expose a node to
/// backreferences while its children are still being rebuilt. The
/// constructors on this type only produce sealed, acyclic nodes; a graph
/// assembled through [`RecordValue::pending`]/[`ListValue::pending`] is
/// not trusted, so the classifier rejects unsealed nodes and the encoding
/// and copying traversals reject cycles.
#[derive(Clone, Debug)]
pub enum Value {
    /// The distinct absence of a value.
    Undefined,
    /// The unit absence.
    Null,
    /// A boolean.
    Bool(bool),
    /// A 64-bit IEEE 754 number, including NaN, the infinities, and -0.
    Number(f64),
    /// An arbitrary-precision integer.
    BigInt(BigInt),
    /// A UTF-8 text string.
    String(String),
    /// A symbol. Only the asynchronous-iteration symbol is passable; the
    /// other cases exist to be rejected by the classifier.
    Symbol(PassableSymbol),
    /// A record of named fields.
    Record(Rc<RecordValue>),
    /// An ordered sequence.
    List(Rc<ListValue>),
    /// An error object.
    Error(Rc<ErrorValue>),
    /// A remote-style object, passed by reference.
    Remotable(Rc<RemotableValue>),
    /// A not-yet-available value, passed by reference.
    Promise(Rc<PromiseValue>),
}

/// A symbol in the value universe.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PassableSymbol {
    /// The well-known asynchronous-iteration symbol, the only passable one.
    AsyncIterator,
    /// A registered symbol with the given key. Not passable.
    Registered(String),
    /// A unique symbol with the given description. Not passable.
    Unique(String),
}

impl PassableSymbol {
    /// The printable name of this symbol.
    pub fn name(&self) -> &str {
        match self {
            Self::AsyncIterator => "@@asyncIterator",
            Self::Registered(key) => key,
            Self::Unique(description) => description,
        }
    }
}

/// Stable identity of a composite node, derived from its allocation.
///
/// Two `Value`s share a `NodeId` exactly when they are clones of the same
/// underlying node. Only valid for comparison while the values it was
/// taken from are alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl Value {
    /// Build a sealed record from `(name, value)` pairs. Duplicate names
    /// keep the last value.
    pub fn record<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let map = fields.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self::Record(Rc::new(RecordValue::sealed(map)))
    }

    /// The record with no fields.
    pub fn empty_record() -> Self {
        Self::Record(Rc::new(RecordValue::sealed(BTreeMap::new())))
    }

    /// Build a sealed list.
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Self::List(Rc::new(ListValue::sealed(items.into_iter().collect())))
    }

    /// Build a text string value.
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    /// Build a number from an integer.
    ///
    /// Numbers are IEEE 754 doubles; magnitudes above 2^53 lose precision.
    /// Use [`Value::bigint`] for exact large integers.
    #[allow(clippy::cast_precision_loss)]
    pub fn integer(i: i64) -> Self {
        Self::Number(i as f64)
    }

    /// Build an arbitrary-precision integer value.
    pub fn bigint(i: impl Into<BigInt>) -> Self {
        Self::BigInt(i.into())
    }

    /// Build an error value with no stack.
    pub fn error(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error(Rc::new(ErrorValue {
            name: name.into(),
            message: message.into(),
            stack: None,
        }))
    }

    /// Build an error value carrying a local stack trace. The stack never
    /// crosses the wire.
    pub fn error_with_stack(
        name: impl Into<String>,
        message: impl Into<String>,
        stack: impl Into<String>,
    ) -> Self {
        Self::Error(Rc::new(ErrorValue {
            name: name.into(),
            message: message.into(),
            stack: Some(stack.into()),
        }))
    }

    /// Build a promise placeholder with a fresh local handle.
    pub fn promise() -> Self {
        Self::Promise(Rc::new(PromiseValue {
            handle: SlotId::fresh_promise(),
        }))
    }

    /// Build a promise placeholder around an existing handle.
    pub fn promise_with_handle(handle: SlotId) -> Self {
        Self::Promise(Rc::new(PromiseValue { handle }))
    }

    /// Returns true for the distinct absence.
    pub const fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Returns true for the unit absence.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Try to extract a boolean.
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to extract a number.
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Try to extract an arbitrary-precision integer.
    pub const fn as_bigint(&self) -> Option<&BigInt> {
        match self {
            Self::BigInt(i) => Some(i),
            _ => None,
        }
    }

    /// Try to extract a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to extract a record.
    pub fn as_record(&self) -> Option<&RecordValue> {
        match self {
            Self::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Try to extract a list.
    pub fn as_list(&self) -> Option<&ListValue> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    /// Try to extract an error.
    pub fn as_error(&self) -> Option<&ErrorValue> {
        match self {
            Self::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Try to extract a remotable.
    pub fn as_remotable(&self) -> Option<&RemotableValue> {
        match self {
            Self::Remotable(r) => Some(r),
            _ => None,
        }
    }

    /// Try to extract a promise placeholder.
    pub fn as_promise(&self) -> Option<&PromiseValue> {
        match self {
            Self::Promise(p) => Some(p),
            _ => None,
        }
    }

    /// A short name for the value's shape, for diagnostics.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::BigInt(_) => "bigint",
            Self::String(_) => "string",
            Self::Symbol(_) => "symbol",
            Self::Record(_) => "record",
            Self::List(_) => "list",
            Self::Error(_) => "error",
            Self::Remotable(_) => "remotable",
            Self::Promise(_) => "promise",
        }
    }

    /// Identity of this value's composite node, or `None` for primitives.
    ///
    /// Primitives (including strings, bigints, and symbols) have no
    /// identity and are never ibid-tracked.
    pub fn node_id(&self) -> Option<NodeId> {
        let ptr = match self {
            Self::Record(rc) => Rc::as_ptr(rc).cast::<()>(),
            Self::List(rc) => Rc::as_ptr(rc).cast::<()>(),
            Self::Error(rc) => Rc::as_ptr(rc).cast::<()>(),
            Self::Remotable(rc) => Rc::as_ptr(rc).cast::<()>(),
            Self::Promise(rc) => Rc::as_ptr(rc).cast::<()>(),
            _ => return None,
        };
        Some(NodeId(ptr as usize))
    }

    /// Whether `self` and `other` are the same node (or equal primitives
    /// of the same variant for identity-free cases).
    pub fn same_node(&self, other: &Self) -> bool {
        match (self.node_id(), other.node_id()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialEq for Value {
    /// Structural equality.
    ///
    /// Numbers compare with IEEE semantics (`NaN != NaN`, `-0 == 0`).
    /// Errors compare by name and message; stacks are local-only.
    /// Remotables and promises compare by node identity. Comparing two
    /// distinct cyclic graphs does not terminate; cycles can only be
    /// produced on request via the allow-cycles decode policy.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::BigInt(a), Self::BigInt(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Symbol(a), Self::Symbol(b)) => a == b,
            (Self::Record(a), Self::Record(b)) => {
                Rc::ptr_eq(a, b) || a.fields() == b.fields()
            }
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b) || a.items() == b.items(),
            (Self::Error(a), Self::Error(b)) => {
                a.name() == b.name() && a.message() == b.message()
            }
            (Self::Remotable(a), Self::Remotable(b)) => Rc::ptr_eq(a, b),
            (Self::Promise(a), Self::Promise(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::integer(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<BigInt> for Value {
    fn from(i: BigInt) -> Self {
        Self::BigInt(i)
    }
}

/// A record node: named fields behind a write-once seal.
pub struct RecordValue {
    fields: OnceCell<BTreeMap<String, Value>>,
}

impl RecordValue {
    pub(crate) fn sealed(fields: BTreeMap<String, Value>) -> Self {
        let cell = OnceCell::new();
        let _ = cell.set(fields);
        Self { fields: cell }
    }

    /// Allocate an under-construction record. Reviver plumbing: the node
    /// can be referenced (and its identity taken) before it is sealed.
    ///
    /// Graphs assembled through this hatch get no structural guarantees:
    /// the classifier fails on unsealed nodes, and the encoder and
    /// deep-copy projector fail on self-referential graphs.
    pub fn pending() -> Rc<Self> {
        Rc::new(Self {
            fields: OnceCell::new(),
        })
    }

    /// Seal a pending record. Fails if the node was already sealed.
    pub fn seal(&self, fields: BTreeMap<String, Value>) -> Result<()> {
        self.fields
            .set(fields)
            .map_err(|_| MarshalError::internal("record node sealed twice"))
    }

    /// Whether the node has been sealed.
    pub fn is_sealed(&self) -> bool {
        self.fields.get().is_some()
    }

    /// The fields, in ascending name order.
    ///
    /// # Panics
    /// If the node is still under construction, which cannot be observed
    /// through a completed marshal operation.
    pub fn fields(&self) -> &BTreeMap<String, Value> {
        self.fields.get().expect("record node is sealed")
    }
}

impl fmt::Debug for RecordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.fields.get() {
            Some(fields) => f.debug_map().entries(fields.iter()).finish(),
            None => f.write_str("<record under construction>"),
        }
    }
}

/// A list node: an ordered sequence behind a write-once seal.
pub struct ListValue {
    items: OnceCell<Vec<Value>>,
}

impl ListValue {
    pub(crate) fn sealed(items: Vec<Value>) -> Self {
        let cell = OnceCell::new();
        let _ = cell.set(items);
        Self { items: cell }
    }

    /// Allocate an under-construction list. Reviver plumbing; see
    /// [`RecordValue::pending`] for the guarantees callers forfeit.
    pub fn pending() -> Rc<Self> {
        Rc::new(Self {
            items: OnceCell::new(),
        })
    }

    /// Seal a pending list. Fails if the node was already sealed.
    pub fn seal(&self, items: Vec<Value>) -> Result<()> {
        self.items
            .set(items)
            .map_err(|_| MarshalError::internal("list node sealed twice"))
    }

    /// Whether the node has been sealed.
    pub fn is_sealed(&self) -> bool {
        self.items.get().is_some()
    }

    /// The elements in order.
    ///
    /// # Panics
    /// If the node is still under construction, which cannot be observed
    /// through a completed marshal operation.
    pub fn items(&self) -> &[Value] {
        self.items.get().expect("list node is sealed")
    }
}

impl fmt::Debug for ListValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.items.get() {
            Some(items) => f.debug_list().entries(items.iter()).finish(),
            None => f.write_str("<list under construction>"),
        }
    }
}

/// An error node. Only the name and message travel; the stack is local.
#[derive(Debug)]
pub struct ErrorValue {
    name: String,
    message: String,
    stack: Option<String>,
}

impl ErrorValue {
    /// The error class name, e.g. `"TypeError"`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The local stack trace, if any. Never serialized.
    pub fn stack(&self) -> Option<&str> {
        self.stack.as_deref()
    }
}

/// A remote-style object: an interface tag, a set of operation names, and
/// the opaque handle it travels under.
pub struct RemotableValue {
    iface: InterfaceTag,
    methods: BTreeSet<String>,
    handle: SlotId,
}

impl RemotableValue {
    pub(crate) fn new(iface: InterfaceTag, methods: BTreeSet<String>, handle: SlotId) -> Self {
        Self {
            iface,
            methods,
            handle,
        }
    }

    /// The interface tag recorded at construction.
    pub fn iface(&self) -> &str {
        self.iface.as_str()
    }

    /// The operation names, in ascending order.
    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().map(String::as_str)
    }

    /// Whether the remotable exposes the named operation.
    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains(name)
    }

    /// The handle this remotable travels under.
    pub fn handle(&self) -> &SlotId {
        &self.handle
    }
}

impl fmt::Debug for RemotableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.iface)
    }
}

/// A promise placeholder: only the handle it travels under.
pub struct PromiseValue {
    handle: SlotId,
}

impl PromiseValue {
    /// The handle this promise travels under.
    pub fn handle(&self) -> &SlotId {
        &self.handle
    }
}

impl fmt::Debug for PromiseValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Promise {}]", self.handle)
    }
}
