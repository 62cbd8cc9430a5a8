//! Runtime model for programs debugged over DAP.
//!
//! A debuggee is a set of modules whose entry points run on an [`Interpreter`].
//! The interpreter keeps a stack of [`Frame`]s and reports every executed line to
//! a [`Tracer`] before running it, which is where a debugger gets control.
pub mod error;
pub mod frame;
pub mod interpreter;
pub mod mutation;
pub mod program;
pub mod programs;
pub mod tracer;
pub mod value;

pub use error::RuntimeError;
pub use frame::{Frame, Namespace};
pub use interpreter::Interpreter;
pub use mutation::{FrameMutator, LiveFrameMutator};
pub use program::{EntryPoint, Module, ProgramRegistry};
pub use tracer::{NullTracer, TraceAction, Tracer};
pub use value::Value;

pub type Shared<T> = std::sync::Arc<T>;
pub type SharedCell<T> = std::sync::RwLock<T>;

/// Acquires a read guard, recovering the data if a writer panicked.
pub fn read<T>(cell: &SharedCell<T>) -> std::sync::RwLockReadGuard<'_, T> {
    cell.read().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Acquires a write guard, recovering the data if a writer panicked.
pub fn write<T>(cell: &SharedCell<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    cell.write().unwrap_or_else(std::sync::PoisonError::into_inner)
}
