use dap::types;
use mpdbg_runtime::{Frame, Value, read};

use crate::cache::VariableReferenceCache;
use crate::scope::{ScopeKind, ScopeRef};

/// Name of the synthetic child holding a scope's dunder-named bindings.
pub const SPECIAL_GROUP: &str = "Special";

/// One row of a `variables` response.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableInfo {
    pub name: String,
    pub value: String,
    pub type_name: String,
    /// Cache or scope reference to expand this row, 0 for atomic values.
    pub reference: i64,
    pub named: i64,
    pub indexed: i64,
}

impl VariableInfo {
    /// Describes `value` under `name`. Containers are registered in `cache`
    /// so the client can expand them.
    pub fn describe(name: impl Into<String>, value: &Value, cache: &mut VariableReferenceCache) -> Self {
        let name = name.into();
        let Some(len) = value.len() else {
            return Self {
                name,
                value: value.repr(),
                type_name: value.type_name().to_string(),
                reference: 0,
                named: 0,
                indexed: 0,
            };
        };

        let type_name = value.type_name();
        let summary = if len == 0 {
            format!("{}(empty)", type_name)
        } else {
            format!("{}({} items)", type_name, len)
        };
        let (named, indexed) = match value {
            Value::Dict(_) => (len as i64, 0),
            _ => (0, len as i64),
        };

        Self {
            name,
            value: summary,
            type_name: type_name.to_string(),
            reference: cache.add(value.clone()),
            named,
            indexed,
        }
    }
}

impl VariableInfo {
    /// `(namedVariables, indexedVariables)` as sent to the client: both set for
    /// containers, zeros included, and both absent for atomic values.
    pub fn child_counts(&self) -> (Option<i64>, Option<i64>) {
        if self.reference == 0 {
            (None, None)
        } else {
            (Some(self.named), Some(self.indexed))
        }
    }
}

impl From<VariableInfo> for types::Variable {
    fn from(info: VariableInfo) -> Self {
        let (named_variables, indexed_variables) = info.child_counts();
        types::Variable {
            name: info.name,
            value: info.value,
            type_field: (!info.type_name.is_empty()).then_some(info.type_name),
            presentation_hint: None,
            evaluate_name: None,
            variables_reference: info.reference,
            named_variables,
            indexed_variables,
            memory_reference: None,
        }
    }
}

/// Dunder names such as `__name__` are implementation-reserved.
pub fn is_special_name(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}

/// Lists the children behind `reference`.
///
/// `frames` are the frames of the current stop, indexed by frame id. Unknown,
/// stale and evicted references yield an empty list.
pub fn variables(reference: i64, frames: &[Frame], cache: &mut VariableReferenceCache) -> Vec<VariableInfo> {
    if let Some(scope) = ScopeRef::decode(reference) {
        return match usize::try_from(scope.frame_id).ok().and_then(|id| frames.get(id)) {
            Some(frame) => scope_variables(frame, scope, cache),
            None => Vec::new(),
        };
    }

    match cache.get(reference).cloned() {
        Some(value) => children(&value, cache),
        None => Vec::new(),
    }
}

fn scope_variables(frame: &Frame, scope: ScopeRef, cache: &mut VariableReferenceCache) -> Vec<VariableInfo> {
    let namespace = if scope.kind.is_global() {
        &frame.globals
    } else {
        &frame.locals
    };
    let bindings: Vec<(String, Value)> = read(namespace)
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect();

    let (special, regular): (Vec<_>, Vec<_>) = bindings
        .into_iter()
        .partition(|(name, _)| is_special_name(name));

    if scope.kind.is_special() {
        return special
            .iter()
            .map(|(name, value)| VariableInfo::describe(name.as_str(), value, cache))
            .collect();
    }

    let group = VariableInfo {
        name: SPECIAL_GROUP.to_string(),
        value: String::new(),
        type_name: String::new(),
        reference: scope.special().encode(),
        named: special.len() as i64,
        indexed: 0,
    };

    std::iter::once(group)
        .chain(
            regular
                .iter()
                .map(|(name, value)| VariableInfo::describe(name.as_str(), value, cache)),
        )
        .collect()
}

/// One level of a container's children.
pub fn children(value: &Value, cache: &mut VariableReferenceCache) -> Vec<VariableInfo> {
    match value {
        Value::Dict(entries) => {
            let entries = read(entries).clone();
            entries
                .iter()
                .map(|(key, child)| VariableInfo::describe(key.key_name(), child, cache))
                .collect()
        }
        Value::List(items) => {
            let items = read(items).clone();
            indexed_children(&items, |i| format!("[{}]", i), cache)
        }
        Value::Tuple(items) => indexed_children(items, |i| format!("[{}]", i), cache),
        Value::Set(items) => {
            let items = read(items).clone();
            indexed_children(&items, |i| format!("<{}>", i), cache)
        }
        _ => Vec::new(),
    }
}

fn indexed_children(
    items: &[Value],
    name: impl Fn(usize) -> String,
    cache: &mut VariableReferenceCache,
) -> Vec<VariableInfo> {
    items
        .iter()
        .enumerate()
        .map(|(i, child)| VariableInfo::describe(name(i), child, cache))
        .collect()
}
