use crate::value::Value;
use crate::{Shared, SharedCell, read};

/// Insertion-ordered name bindings of a scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Namespace {
    bindings: Vec<(String, Value)>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings
            .iter()
            .find(|(binding, _)| binding == name)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Binds `name`, replacing an existing binding in place.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.bindings.iter_mut().find(|(binding, _)| *binding == name) {
            Some(slot) => slot.1 = value,
            None => self.bindings.push((name, value)),
        }
    }

    /// Rebinds an existing name. Returns `false` and leaves the namespace
    /// untouched when the name is not bound.
    pub fn replace(&mut self, name: &str, value: Value) -> bool {
        match self.bindings.iter_mut().find(|(binding, _)| binding == name) {
            Some(slot) => {
                slot.1 = value;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.bindings.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl FromIterator<(String, Value)> for Namespace {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut namespace = Namespace::new();
        for (name, value) in iter {
            namespace.insert(name, value);
        }
        namespace
    }
}

/// An activation record of a running function.
///
/// Clones share the namespaces of the live frame, so a debugger holding a
/// snapshot reads and writes the program's actual bindings. `line` is the line
/// the frame was executing when the snapshot was taken.
#[derive(Debug, Clone)]
pub struct Frame {
    pub function: String,
    pub source: String,
    pub line: u32,
    pub locals: Shared<SharedCell<Namespace>>,
    pub globals: Shared<SharedCell<Namespace>>,
}

impl Frame {
    pub fn new(
        function: impl Into<String>,
        source: impl Into<String>,
        globals: Shared<SharedCell<Namespace>>,
    ) -> Self {
        Self {
            function: function.into(),
            source: source.into(),
            line: 0,
            locals: Shared::new(SharedCell::new(Namespace::new())),
            globals,
        }
    }

    /// Looks a name up in the locals, then the globals.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        let local = read(&self.locals).get(name).cloned();
        local.or_else(|| read(&self.globals).get(name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_keeps_order_and_replaces_in_place() {
        let mut ns = Namespace::new();
        ns.insert("a", 1.into());
        ns.insert("b", 2.into());
        ns.insert("a", 3.into());

        let names: Vec<_> = ns.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(ns.get("a"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_replace_missing_name_is_rejected() {
        let mut ns = Namespace::new();
        assert!(!ns.replace("missing", 1.into()));
        assert!(ns.is_empty());
    }

    #[test]
    fn test_frame_clone_shares_namespaces() {
        let globals = Shared::new(SharedCell::new(Namespace::new()));
        let frame = Frame::new("main", "target.py", Shared::clone(&globals));
        let snapshot = frame.clone();

        crate::write(&snapshot.locals).insert("x", 10.into());
        crate::write(&globals).insert("g", "global".into());

        assert_eq!(frame.lookup("x"), Some(Value::Int(10)));
        assert_eq!(frame.lookup("g"), Some(Value::str("global")));
        assert_eq!(frame.lookup("nope"), None);
    }
}
