use std::fmt::Debug;

use crate::frame::Frame;

/// What the interpreter does after reporting a line.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum TraceAction {
    /// Run the line and keep tracing.
    #[default]
    Continue,
    /// Run the line and stop tracing for the rest of the run.
    Detach,
    /// Unwind the program without running the line.
    Abort,
}

/// Line hook installed into an [`crate::Interpreter`].
///
/// `trace_line` is called on the program's own thread before each traced line
/// executes. `frames` is the call stack, outermost first; the last frame is the
/// one about to run `line`. An implementation may block here for as long as it
/// needs, the program does not advance until it returns.
pub trait Tracer: Debug + Send {
    fn trace_line(&self, _frames: &[Frame]) -> TraceAction {
        TraceAction::Continue
    }
}

#[derive(Debug, Default)]
pub struct NullTracer;

impl Tracer for NullTracer {}
