use mpdbg_runtime::{Frame, FrameMutator, LiveFrameMutator, Value, write};
use tracing::debug;

use crate::cache::VariableReferenceCache;
use crate::error::MutationError;
use crate::inspector::VariableInfo;
use crate::literal::parse_literal;
use crate::scope::ScopeRef;

/// Writes client-supplied literals into the bindings of a suspended program.
#[derive(Debug)]
pub struct VariableMutator {
    frame_mutator: Box<dyn FrameMutator>,
}

impl Default for VariableMutator {
    fn default() -> Self {
        Self::new(Box::new(LiveFrameMutator))
    }
}

impl VariableMutator {
    pub fn new(frame_mutator: Box<dyn FrameMutator>) -> Self {
        Self { frame_mutator }
    }

    /// Parses `literal` and binds it to `name` inside the namespace or
    /// container behind `reference`. Nothing changes unless the whole
    /// operation succeeds.
    pub fn set_variable(
        &self,
        reference: i64,
        name: &str,
        literal: &str,
        frames: &[Frame],
        cache: &mut VariableReferenceCache,
    ) -> Result<VariableInfo, MutationError> {
        let value = parse_literal(literal)?;
        debug!(reference, name, value = %value, "Setting variable");

        match ScopeRef::decode(reference) {
            Some(scope) => {
                let frame = usize::try_from(scope.frame_id)
                    .ok()
                    .and_then(|id| frames.get(id))
                    .ok_or(MutationError::InvalidReference(reference))?;
                self.set_in_scope(frame, scope, name, value.clone())?;
            }
            None => {
                let container = cache
                    .get(reference)
                    .cloned()
                    .ok_or(MutationError::InvalidReference(reference))?;
                set_in_container(&container, name, value.clone())?;
            }
        }

        Ok(VariableInfo::describe(name, &value, cache))
    }

    fn set_in_scope(&self, frame: &Frame, scope: ScopeRef, name: &str, value: Value) -> Result<(), MutationError> {
        let replaced = if scope.kind.is_global() {
            write(&frame.globals).replace(name, value)
        } else {
            self.frame_mutator.set_local_binding(frame, name, value)
        };

        if replaced {
            Ok(())
        } else {
            Err(MutationError::NameNotFound(name.to_string()))
        }
    }
}

fn set_in_container(container: &Value, name: &str, value: Value) -> Result<(), MutationError> {
    match container {
        Value::Dict(entries) => {
            let mut entries = write(entries);
            let slot = entries
                .iter_mut()
                .find(|(key, _)| key.key_name() == name)
                .ok_or_else(|| MutationError::NameNotFound(name.to_string()))?;
            slot.1 = value;
            Ok(())
        }
        Value::List(items) => {
            let mut items = write(items);
            let slot = parse_index(name)
                .and_then(|index| items.get_mut(index))
                .ok_or_else(|| MutationError::NameNotFound(name.to_string()))?;
            *slot = value;
            Ok(())
        }
        Value::Tuple(_) | Value::Set(_) => Err(MutationError::Immutable(container.type_name())),
        _ => Err(MutationError::NameNotFound(name.to_string())),
    }
}

/// `"[3]"` -> 3
fn parse_index(name: &str) -> Option<usize> {
    name.strip_prefix('[')?.strip_suffix(']')?.parse().ok()
}

#[cfg(test)]
mod tests {
    use mpdbg_runtime::{Namespace, Shared, SharedCell, read};
    use rstest::rstest;

    use super::*;
    use crate::scope::ScopeKind;

    fn frames() -> Vec<Frame> {
        let globals = Namespace::from_iter([("counter".to_string(), Value::Int(0))]);
        let frame = Frame::new("main", "target.py", Shared::new(SharedCell::new(globals)));
        write(&frame.locals).insert("x", 10.into());
        vec![frame]
    }

    fn scope(kind: ScopeKind) -> i64 {
        ScopeRef::new(0, kind).unwrap().encode()
    }

    #[test]
    fn test_set_local_writes_live_frame() {
        let frames = frames();
        let mut cache = VariableReferenceCache::default();

        let info = VariableMutator::default()
            .set_variable(scope(ScopeKind::Locals), "x", "1000", &frames, &mut cache)
            .unwrap();

        assert_eq!(info.value, "1000");
        assert_eq!(frames[0].lookup("x"), Some(Value::Int(1000)));
    }

    #[test]
    fn test_set_global() {
        let frames = frames();
        let mut cache = VariableReferenceCache::default();

        VariableMutator::default()
            .set_variable(scope(ScopeKind::Globals), "counter", "5", &frames, &mut cache)
            .unwrap();

        assert_eq!(read(&frames[0].globals).get("counter"), Some(&Value::Int(5)));
    }

    #[test]
    fn test_set_container_literal_returns_reference() {
        let frames = frames();
        let mut cache = VariableReferenceCache::default();

        let info = VariableMutator::default()
            .set_variable(scope(ScopeKind::Locals), "x", "[1, 2]", &frames, &mut cache)
            .unwrap();

        assert_eq!(info.value, "list(2 items)");
        assert_eq!(cache.get(info.reference), frames[0].lookup("x").as_ref());
    }

    #[rstest]
    #[case(scope(ScopeKind::Locals), "missing", "1", MutationError::NameNotFound("missing".to_string()))]
    #[case(scope(ScopeKind::Globals), "x", "1", MutationError::NameNotFound("x".to_string()))]
    #[case(scope(ScopeKind::Locals), "x", "oops", MutationError::InvalidLiteral("oops".to_string()))]
    #[case(ScopeRef::new(4, ScopeKind::Locals).unwrap().encode(), "x", "1", MutationError::InvalidReference(4001))]
    #[case(99_999, "x", "1", MutationError::InvalidReference(99_999))]
    fn test_failures_leave_state_unchanged(
        #[case] reference: i64,
        #[case] name: &str,
        #[case] literal: &str,
        #[case] expected: MutationError,
    ) {
        let frames = frames();
        let mut cache = VariableReferenceCache::default();

        let err = VariableMutator::default()
            .set_variable(reference, name, literal, &frames, &mut cache)
            .unwrap_err();

        assert_eq!(err, expected);
        assert_eq!(frames[0].lookup("x"), Some(Value::Int(10)));
        assert!(!read(&frames[0].globals).contains("x"));
    }

    #[test]
    fn test_set_dict_entry_and_list_item() {
        let frames = frames();
        let mut cache = VariableReferenceCache::default();
        let dict = Value::dict(vec![("key".into(), 1.into()), (2.into(), 2.into())]);
        let list = Value::list(vec![1.into(), 2.into()]);
        let dict_ref = cache.add(dict.clone());
        let list_ref = cache.add(list.clone());
        let mutator = VariableMutator::default();

        mutator.set_variable(dict_ref, "key", "'new'", &frames, &mut cache).unwrap();
        mutator.set_variable(dict_ref, "2", "None", &frames, &mut cache).unwrap();
        mutator.set_variable(list_ref, "[1]", "2.5", &frames, &mut cache).unwrap();

        assert_eq!(dict.repr(), "{\"key\": \"new\", 2: None}");
        assert_eq!(list.repr(), "[1, 2.5]");
        assert_eq!(
            mutator.set_variable(list_ref, "[2]", "0", &frames, &mut cache),
            Err(MutationError::NameNotFound("[2]".to_string()))
        );
    }

    #[test]
    fn test_tuples_and_sets_are_immutable() {
        let frames = frames();
        let mut cache = VariableReferenceCache::default();
        let tuple_ref = cache.add(Value::tuple(vec![1.into()]));
        let set_ref = cache.add(Value::set(vec![1.into()]));
        let mutator = VariableMutator::default();

        assert_eq!(
            mutator.set_variable(tuple_ref, "[0]", "2", &frames, &mut cache),
            Err(MutationError::Immutable("tuple"))
        );
        assert_eq!(
            mutator.set_variable(set_ref, "<0>", "2", &frames, &mut cache),
            Err(MutationError::Immutable("set"))
        );
    }
}
