//! Modules bundled with the runtime, used as debug targets.
pub mod target;
