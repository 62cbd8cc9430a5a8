use std::fmt;

use crossbeam_channel::{Receiver, Sender};
use mpdbg_runtime::{Frame, Shared, SharedCell, TraceAction, Tracer, read};
use tracing::{debug, error};

use crate::breakpoints::BreakpointManager;
use crate::protocol::{DapCommand, DebuggerMessage, THREAD_ID};

/// Tracer installed into the debuggee. On a breakpoint line it reports the
/// stop to the dispatcher and blocks the debuggee until told how to go on.
pub struct DapTracer {
    breakpoints: Shared<SharedCell<BreakpointManager>>,
    message_tx: Sender<DebuggerMessage>,
    command_rx: Receiver<DapCommand>,
    thread_id: i64,
}

impl fmt::Debug for DapTracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DapTracer")
            .field("thread_id", &self.thread_id)
            .finish()
    }
}

impl DapTracer {
    pub fn new(
        breakpoints: Shared<SharedCell<BreakpointManager>>,
        message_tx: Sender<DebuggerMessage>,
        command_rx: Receiver<DapCommand>,
    ) -> Self {
        Self {
            breakpoints,
            message_tx,
            command_rx,
            thread_id: THREAD_ID,
        }
    }

    fn next_action(&self, command: DapCommand) -> TraceAction {
        match command {
            DapCommand::Continue => TraceAction::Continue,
            DapCommand::Detach => TraceAction::Detach,
            DapCommand::Terminate => TraceAction::Abort,
        }
    }
}

impl Tracer for DapTracer {
    fn trace_line(&self, frames: &[Frame]) -> TraceAction {
        let Some(current) = frames.last() else {
            return TraceAction::Continue;
        };
        let Some(breakpoint_id) = read(&self.breakpoints).hit(&current.source, i64::from(current.line)) else {
            return TraceAction::Continue;
        };

        debug!(line = current.line, function = %current.function, "Breakpoint hit");

        let message = DebuggerMessage::BreakpointHit {
            thread_id: self.thread_id,
            line: current.line,
            breakpoint_id,
            frames: frames.iter().rev().cloned().collect(),
        };

        if let Err(e) = self.message_tx.send(message) {
            error!(error = %e, "Failed to send breakpoint message to DAP server");
            return TraceAction::Detach;
        }

        // A dropped command channel means the adapter let go of the debuggee.
        match self.command_rx.recv() {
            Ok(command) => self.next_action(command),
            Err(_) => {
                debug!("Command channel closed, detaching");
                TraceAction::Detach
            }
        }
    }
}
