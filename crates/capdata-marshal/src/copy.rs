//! Deep-copy projection: a pure-data clone of a copy-only subgraph.

use std::collections::{BTreeMap, HashMap, HashSet};

use capdata_error::{MarshalError, Result};
use capdata_types::{NodeId, Value};

use crate::classify::pass_style_of;

/// Produce a freshly allocated, immutable clone consisting only of
/// copy-pass material.
///
/// Primitives pass through. Records and lists are cloned with a visited
/// map so shared descendants stay shared (and identical) in the clone.
/// Errors are cloned keeping name and message only; stack traces are
/// dropped. Remotables and promises fail: copies may not cross capability
/// boundaries. A graph that reaches one of its own ancestors fails
/// ("must be immutable").
pub fn pure_copy(value: &Value) -> Result<Value> {
    let mut visited: HashMap<NodeId, Value> = HashMap::new();
    let mut path: HashSet<NodeId> = HashSet::new();
    copy_value(value, &mut visited, &mut path)
}

fn copy_value(
    value: &Value,
    visited: &mut HashMap<NodeId, Value>,
    path: &mut HashSet<NodeId>,
) -> Result<Value> {
    let style = pass_style_of(value)?;
    if style.is_primitive() {
        return Ok(value.clone());
    }
    if style.passes_by_reference() {
        return Err(MarshalError::Uncopyable {
            style: style.as_str().to_owned(),
        });
    }

    let id = value
        .node_id()
        .ok_or_else(|| MarshalError::internal("copy node without identity"))?;
    if path.contains(&id) {
        return Err(MarshalError::CyclicValue);
    }
    if let Some(clone) = visited.get(&id) {
        return Ok(clone.clone());
    }

    path.insert(id);
    let clone = match value {
        Value::Record(record) => {
            let mut fields = BTreeMap::new();
            for (name, field) in record.fields() {
                fields.insert(name.clone(), copy_value(field, visited, path)?);
            }
            Value::record(fields)
        }
        Value::List(list) => {
            let mut items = Vec::with_capacity(list.items().len());
            for item in list.items() {
                items.push(copy_value(item, visited, path)?);
            }
            Value::list(items)
        }
        Value::Error(err) => Value::error(err.name(), err.message()),
        _ => return Err(MarshalError::internal("unreachable copy style")),
    };
    path.remove(&id);
    visited.insert(id, clone.clone());
    Ok(clone)
}
