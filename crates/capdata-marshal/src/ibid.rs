//! Ibid tables: identity and backreference state for one encode or decode.
//!
//! Both sides number distinct non-primitive nodes in pre-order, root
//! first. The encoder's table is an append-only identity-keyed map; the
//! decoder's is a positional list plus the set of nodes whose construction
//! has not finished, against which the cycle policy is applied.

use std::collections::{HashMap, HashSet};

use capdata_error::{MarshalError, Result};
use capdata_types::{CyclePolicy, NodeId, Value};

/// Encode side: node identity to ibid ordinal, append-only.
pub(crate) struct EncodeIbidTable {
    indexes: HashMap<NodeId, u64>,
    next: u64,
}

impl EncodeIbidTable {
    pub(crate) fn new() -> Self {
        Self {
            indexes: HashMap::new(),
            next: 0,
        }
    }

    /// The ordinal previously assigned to this node, if any.
    pub(crate) fn get(&self, value: &Value) -> Option<u64> {
        value.node_id().and_then(|id| self.indexes.get(&id).copied())
    }

    /// Assign the next ordinal to a not-yet-seen non-primitive node.
    pub(crate) fn register(&mut self, value: &Value) -> Result<u64> {
        let id = value
            .node_id()
            .ok_or_else(|| MarshalError::internal("primitive in ibid table"))?;
        if self.indexes.contains_key(&id) {
            return Err(MarshalError::internal("ibid node registered twice"));
        }
        let index = self.next;
        self.indexes.insert(id, index);
        self.next += 1;
        Ok(index)
    }
}

/// Decode side: revived nodes by ordinal, plus the unfinished set.
pub(crate) struct DecodeIbidTable {
    values: Vec<Value>,
    unfinished: HashSet<usize>,
}

impl DecodeIbidTable {
    pub(crate) fn new() -> Self {
        Self {
            values: Vec::new(),
            unfinished: HashSet::new(),
        }
    }

    /// Append a finished node.
    pub(crate) fn register(&mut self, value: Value) -> usize {
        let index = self.values.len();
        self.values.push(value);
        index
    }

    /// Append a node whose children are still being revived.
    pub(crate) fn start(&mut self, value: Value) -> usize {
        let index = self.register(value);
        self.unfinished.insert(index);
        index
    }

    /// Mark a started node finished.
    pub(crate) fn finish(&mut self, index: usize) {
        let was_unfinished = self.unfinished.remove(&index);
        debug_assert!(was_unfinished, "finish on a node that was not started");
    }

    /// Resolve a backreference, applying the cycle policy when the
    /// referent's construction has not completed.
    pub(crate) fn lookup(&self, index: u64, policy: CyclePolicy) -> Result<Value> {
        let out_of_range = || MarshalError::IbidOutOfRange {
            index,
            len: self.values.len(),
        };
        let ix = usize::try_from(index).map_err(|_| out_of_range())?;
        let value = self.values.get(ix).ok_or_else(out_of_range)?;

        if self.unfinished.contains(&ix) {
            match policy {
                CyclePolicy::AllowCycles => {}
                CyclePolicy::WarnOfCycles => {
                    tracing::warn!(index, "backreference closes a cycle");
                }
                CyclePolicy::ForbidCycles => {
                    return Err(MarshalError::ForbiddenCycle { index });
                }
            }
        }
        Ok(value.clone())
    }
}
