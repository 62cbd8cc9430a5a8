use std::io;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use mpdbg_runtime::{
    EntryPoint, Frame, Interpreter, Module, ProgramRegistry, RuntimeError, Shared, SharedCell,
};
use tracing::{debug, error, info};

use crate::breakpoints::BreakpointManager;
use crate::handler::DapTracer;
use crate::protocol::{DapCommand, DebuggerMessage};

/// Where the debuggee stands from the dispatcher's point of view.
#[derive(Debug)]
enum Debuggee {
    /// Nothing attached, or the attach target could not be resolved.
    Detached,
    /// Resolved and waiting for the client to finish configuration.
    Pending(Module, EntryPoint),
    /// Running on its own thread.
    Started {
        command_tx: Sender<DapCommand>,
        handle: JoinHandle<()>,
    },
}

/// Drives the single debuggee thread and owns the frames of the current stop.
#[derive(Debug)]
pub struct ExecutionController {
    registry: ProgramRegistry,
    breakpoints: Shared<SharedCell<BreakpointManager>>,
    message_tx: Sender<DebuggerMessage>,
    message_rx: Receiver<DebuggerMessage>,
    debuggee: Debuggee,
    /// Frames of the current stop, innermost first; a frame's index is its id
    /// for this stop.
    stop: Option<Vec<Frame>>,
    /// Thread of a debuggee that was let go and may still be running.
    released: Option<JoinHandle<()>>,
}

impl ExecutionController {
    pub fn new(registry: ProgramRegistry, breakpoints: Shared<SharedCell<BreakpointManager>>) -> Self {
        let (message_tx, message_rx) = crossbeam_channel::unbounded();
        Self {
            registry,
            breakpoints,
            message_tx,
            message_rx,
            debuggee: Debuggee::Detached,
            stop: None,
            released: None,
        }
    }

    pub fn message_rx(&self) -> &Receiver<DebuggerMessage> {
        &self.message_rx
    }

    /// Resolves the debuggee. It is started later by [`Self::start`].
    pub fn attach(&mut self, module_path: &str, entry_point: &str) -> Result<(), RuntimeError> {
        let (module, entry) = self.registry.resolve(module_path, entry_point)?;
        info!(module = module.name, entry_point = entry.name, "Debuggee attached");
        self.debuggee = Debuggee::Pending(module, entry);
        Ok(())
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.debuggee, Debuggee::Pending(..))
    }

    /// Starts a pending debuggee on its own thread. Returns `false` when there
    /// is nothing to start.
    pub fn start(&mut self) -> io::Result<bool> {
        let Debuggee::Pending(module, entry) = self.debuggee else {
            return Ok(false);
        };

        let (command_tx, command_rx) = crossbeam_channel::unbounded();
        let tracer = DapTracer::new(
            Shared::clone(&self.breakpoints),
            self.message_tx.clone(),
            command_rx,
        );
        let message_tx = self.message_tx.clone();

        let handle = thread::Builder::new()
            .name("debuggee".to_string())
            .spawn(move || run_debuggee(module, entry, tracer, message_tx))?;

        debug!(module = module.name, "Debuggee started");
        self.debuggee = Debuggee::Started { command_tx, handle };
        Ok(true)
    }

    pub fn on_breakpoint_hit(&mut self, frames: Vec<Frame>) {
        self.stop = Some(frames);
    }

    /// Frames of the current stop, empty while running.
    pub fn frames(&self) -> &[Frame] {
        self.stop.as_deref().unwrap_or_default()
    }

    /// Lets a stopped debuggee run to the next breakpoint.
    pub fn resume(&mut self) -> bool {
        if self.stop.take().is_none() {
            return false;
        }
        self.send_command(DapCommand::Continue)
    }

    /// Leaves the debuggee running freely without any more stops.
    pub fn detach(&mut self) {
        self.release(DapCommand::Detach);
    }

    /// Unwinds the debuggee at its next traced line.
    pub fn terminate(&mut self) {
        self.release(DapCommand::Terminate);
    }

    fn release(&mut self, command: DapCommand) {
        if self.stop.take().is_some() {
            self.send_command(command);
        }
        // Dropping the command channel answers every later stop with a detach.
        if let Debuggee::Started { handle, .. } = std::mem::replace(&mut self.debuggee, Debuggee::Detached) {
            debug!(?command, "Releasing debuggee");
            self.released = Some(handle);
        }
    }

    /// Blocks until a released debuggee has run to its end. Returns `false`
    /// when no debuggee was released.
    pub fn wait_released(&mut self) -> bool {
        let Some(handle) = self.released.take() else {
            return false;
        };
        info!("Waiting for the detached debuggee to finish");
        if handle.join().is_err() {
            error!("Debuggee thread panicked");
        }
        true
    }

    fn send_command(&self, command: DapCommand) -> bool {
        match &self.debuggee {
            Debuggee::Started { command_tx, .. } => command_tx.send(command).is_ok(),
            _ => false,
        }
    }
}

fn run_debuggee(module: Module, entry: EntryPoint, tracer: DapTracer, message_tx: Sender<DebuggerMessage>) {
    let mut interpreter = Interpreter::new(&module, Box::new(tracer));

    let exit_code = match interpreter.run(entry) {
        Ok(result) => {
            info!(module = module.name, result = %result, "Debuggee finished");
            0
        }
        Err(RuntimeError::Aborted) => {
            info!(module = module.name, "Debuggee terminated by the debugger");
            1
        }
        Err(e) => {
            error!(module = module.name, error = %e, "Debuggee failed");
            1
        }
    };

    // The dispatcher may be gone already after a detach.
    let _ = message_tx.send(DebuggerMessage::Terminated { exit_code });
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mpdbg_runtime::{read, write};

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn controller(lines: &[i64]) -> ExecutionController {
        let breakpoints = Shared::new(SharedCell::new(BreakpointManager::new()));
        write(&breakpoints).set_breakpoints("target.py", lines);
        ExecutionController::new(ProgramRegistry::with_builtin_modules(), breakpoints)
    }

    fn next_hit(controller: &mut ExecutionController) -> u32 {
        match controller.message_rx().recv_timeout(TIMEOUT).unwrap() {
            DebuggerMessage::BreakpointHit { line, frames, .. } => {
                controller.on_breakpoint_hit(frames);
                line
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    fn exit_code(controller: &ExecutionController) -> i64 {
        loop {
            match controller.message_rx().recv_timeout(TIMEOUT).unwrap() {
                DebuggerMessage::Terminated { exit_code } => return exit_code,
                DebuggerMessage::BreakpointHit { .. } => continue,
            }
        }
    }

    #[test]
    fn test_attach_unknown_module_fails_and_never_starts() {
        let mut controller = controller(&[82]);
        assert!(matches!(
            controller.attach("nonexistent", "main"),
            Err(RuntimeError::ModuleNotFound(_))
        ));
        assert!(!controller.is_pending());
        assert!(!controller.start().unwrap());
    }

    #[test]
    fn test_stop_resume_and_finish() {
        let mut controller = controller(&[82]);
        controller.attach("target.py", "main").unwrap();
        assert!(controller.start().unwrap());
        assert!(!controller.start().unwrap());

        for _ in 0..3 {
            assert_eq!(next_hit(&mut controller), 82);
            let frames = controller.frames();
            assert_eq!(frames.len(), 1);
            assert_eq!(frames[0].function, "main");
            assert_eq!(frames[0].lookup("total"), Some(42.into()));
            assert!(controller.resume());
            assert!(controller.frames().is_empty());
        }

        assert_eq!(exit_code(&controller), 0);
    }

    #[test]
    fn test_nested_frames_innermost_first() {
        let mut controller = controller(&[43]);
        controller.attach("target", "main").unwrap();
        controller.start().unwrap();

        assert_eq!(next_hit(&mut controller), 43);
        let functions: Vec<&str> = controller.frames().iter().map(|f| f.function.as_str()).collect();
        assert_eq!(functions, vec!["mathematics", "main"]);

        controller.detach();
        assert!(!controller.resume());
        assert_eq!(exit_code(&controller), 0);
    }

    #[test]
    fn test_released_debuggee_runs_to_completion() {
        let mut controller = controller(&[82]);
        controller.attach("target", "main").unwrap();
        controller.start().unwrap();
        assert!(!controller.wait_released());

        assert_eq!(next_hit(&mut controller), 82);
        let globals = Shared::clone(&controller.frames()[0].globals);
        controller.detach();

        assert!(controller.wait_released());
        assert_eq!(read(&globals).get("counter"), Some(&3.into()));
        assert_eq!(exit_code(&controller), 0);
        assert!(!controller.wait_released());
    }

    #[test]
    fn test_terminate_unwinds_debuggee() {
        let mut controller = controller(&[78]);
        controller.attach("target", "main").unwrap();
        controller.start().unwrap();

        assert_eq!(next_hit(&mut controller), 78);
        controller.terminate();

        assert_eq!(exit_code(&controller), 1);
    }
}
