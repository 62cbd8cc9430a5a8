use std::fmt::Debug;

use tracing::debug;

use crate::frame::Frame;
use crate::value::Value;
use crate::write;

/// Platform primitive for rebinding a local of a suspended frame by name.
///
/// Returns `false` when the frame has no such local; the frame is left
/// untouched in that case.
pub trait FrameMutator: Debug + Send {
    fn set_local_binding(&self, frame: &Frame, name: &str, value: Value) -> bool;
}

/// Writes straight into the frame's live local slots.
#[derive(Debug, Default, Clone, Copy)]
pub struct LiveFrameMutator;

impl FrameMutator for LiveFrameMutator {
    fn set_local_binding(&self, frame: &Frame, name: &str, value: Value) -> bool {
        let replaced = write(&frame.locals).replace(name, value);
        debug!(function = %frame.function, name, replaced, "set_local_binding");
        replaced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Namespace, Shared, SharedCell};

    #[test]
    fn test_set_local_binding_rebinds_existing_slot() {
        let frame = Frame::new("main", "target.py", Shared::new(SharedCell::new(Namespace::new())));
        write(&frame.locals).insert("x", 10.into());

        assert!(LiveFrameMutator.set_local_binding(&frame.clone(), "x", 100.into()));
        assert_eq!(frame.lookup("x"), Some(Value::Int(100)));
    }

    #[test]
    fn test_set_local_binding_rejects_unknown_name() {
        let frame = Frame::new("main", "target.py", Shared::new(SharedCell::new(Namespace::new())));
        assert!(!LiveFrameMutator.set_local_binding(&frame, "ghost", 1.into()));
        assert!(crate::read(&frame.locals).is_empty());
    }
}
