use std::fmt;

use itertools::Itertools;

use crate::{Shared, SharedCell, read};

/// Containers nested deeper than this are rendered as `...` by [`Value::repr`].
const MAX_REPR_DEPTH: usize = 8;

/// A runtime value.
///
/// Lists, dicts and sets are shared mutable containers: cloning the value aliases
/// the same storage, so a debugger holding a clone sees (and can change) the data
/// the running program sees.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Shared<SharedCell<Vec<Value>>>),
    Tuple(Shared<Vec<Value>>),
    Dict(Shared<SharedCell<Vec<(Value, Value)>>>),
    Set(Shared<SharedCell<Vec<Value>>>),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Shared::new(SharedCell::new(items)))
    }

    pub fn tuple(items: Vec<Value>) -> Self {
        Value::Tuple(Shared::new(items))
    }

    /// Builds a dict, keeping the last value for repeated keys.
    pub fn dict(entries: Vec<(Value, Value)>) -> Self {
        let mut unique: Vec<(Value, Value)> = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            match unique.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => unique.push((key, value)),
            }
        }
        Value::Dict(Shared::new(SharedCell::new(unique)))
    }

    /// Builds a set, dropping duplicate members.
    pub fn set(items: Vec<Value>) -> Self {
        let mut unique: Vec<Value> = Vec::with_capacity(items.len());
        for item in items {
            if !unique.contains(&item) {
                unique.push(item);
            }
        }
        Value::Set(Shared::new(SharedCell::new(unique)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Set(_) => "set",
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(
            self,
            Value::List(_) | Value::Tuple(_) | Value::Dict(_) | Value::Set(_)
        )
    }

    /// Number of direct children, `None` for atomic values.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::List(items) | Value::Set(items) => Some(read(items).len()),
            Value::Tuple(items) => Some(items.len()),
            Value::Dict(entries) => Some(read(entries).len()),
            _ => None,
        }
    }

    /// Address of the container storage. Two values with the same identity are
    /// the same runtime object.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::List(items) | Value::Set(items) => Some(Shared::as_ptr(items) as *const () as usize),
            Value::Tuple(items) => Some(Shared::as_ptr(items) as *const () as usize),
            Value::Dict(entries) => Some(Shared::as_ptr(entries) as *const () as usize),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Renders the value in the runtime's literal syntax.
    pub fn repr(&self) -> String {
        self.repr_at(0)
    }

    /// Name used for this value when it appears as a dict key: strings are shown
    /// bare, everything else in literal syntax.
    pub fn key_name(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            other => other.repr(),
        }
    }

    fn repr_at(&self, depth: usize) -> String {
        if depth > MAX_REPR_DEPTH && self.is_container() {
            return "...".to_string();
        }

        match self {
            Value::None => "None".to_string(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Str(s) => quote(s),
            Value::List(items) => format!(
                "[{}]",
                read(items).iter().map(|v| v.repr_at(depth + 1)).join(", ")
            ),
            Value::Tuple(items) if items.len() == 1 => format!("({},)", items[0].repr_at(depth + 1)),
            Value::Tuple(items) => format!(
                "({})",
                items.iter().map(|v| v.repr_at(depth + 1)).join(", ")
            ),
            Value::Dict(entries) => format!(
                "{{{}}}",
                read(entries)
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.repr_at(depth + 1), v.repr_at(depth + 1)))
                    .join(", ")
            ),
            Value::Set(items) => {
                let items = read(items);
                if items.is_empty() {
                    "set()".to_string()
                } else {
                    format!("{{{}}}", items.iter().map(|v| v.repr_at(depth + 1)).join(", "))
                }
            }
        }
    }
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        "nan".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "inf" } else { "-inf" }.to_string()
    } else {
        format!("{f:?}")
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        if let (Some(a), Some(b)) = (self.identity(), other.identity())
            && a == b
        {
            return true;
        }

        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => (*a as f64) == *b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => *read(a) == *read(b),
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => *read(a) == *read(b),
            (Value::Set(a), Value::Set(b)) => {
                let (a, b) = (read(a), read(b));
                a.len() == b.len() && a.iter().all(|item| b.contains(item))
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repr())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Value::None, "None", "NoneType")]
    #[case(Value::Bool(true), "True", "bool")]
    #[case(Value::Int(42), "42", "int")]
    #[case(Value::Float(1.0), "1.0", "float")]
    #[case(Value::Float(f64::NAN), "nan", "float")]
    #[case(Value::str("hello world"), "\"hello world\"", "str")]
    #[case(Value::str("say \"hi\""), "\"say \\\"hi\\\"\"", "str")]
    #[case(Value::list(vec![1.into(), "a".into()]), "[1, \"a\"]", "list")]
    #[case(Value::tuple(vec![1.into()]), "(1,)", "tuple")]
    #[case(Value::dict(vec![("k".into(), Value::None)]), "{\"k\": None}", "dict")]
    #[case(Value::set(vec![]), "set()", "set")]
    fn test_repr_and_type_name(#[case] value: Value, #[case] repr: &str, #[case] type_name: &str) {
        assert_eq!(value.repr(), repr);
        assert_eq!(value.type_name(), type_name);
    }

    #[test]
    fn test_clone_aliases_container() {
        let list = Value::list(vec![1.into()]);
        let alias = list.clone();
        if let Value::List(items) = &alias {
            crate::write(items).push(2.into());
        }
        assert_eq!(list.len(), Some(2));
        assert_eq!(list.identity(), alias.identity());
    }

    #[test]
    fn test_set_and_dict_deduplicate() {
        assert_eq!(Value::set(vec![1.into(), 1.into(), 2.into()]).len(), Some(2));
        let dict = Value::dict(vec![("a".into(), 1.into()), ("a".into(), 2.into())]);
        assert_eq!(dict.repr(), "{\"a\": 2}");
    }

    #[test]
    fn test_deep_nesting_repr_is_truncated() {
        let mut value = Value::list(vec![]);
        for _ in 0..12 {
            value = Value::list(vec![value]);
        }
        assert!(value.repr().contains("..."));
    }

    #[test]
    fn test_atomic_values_have_no_identity() {
        assert!(Value::Int(1).identity().is_none());
        assert!(Value::str("x").identity().is_none());
        assert!(Value::tuple(vec![]).identity().is_some());
    }
}
