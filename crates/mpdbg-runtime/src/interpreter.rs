use tracing::debug;

use crate::error::RuntimeError;
use crate::frame::{Frame, Namespace};
use crate::program::{EntryPoint, Module};
use crate::tracer::{TraceAction, Tracer};
use crate::value::Value;
use crate::{Shared, SharedCell, read, write};

/// Executes the routines of one module on the calling thread.
#[derive(Debug)]
pub struct Interpreter {
    tracer: Box<dyn Tracer>,
    source: String,
    globals: Shared<SharedCell<Namespace>>,
    stack: Vec<Frame>,
    tracing: bool,
}

impl Interpreter {
    pub fn new(module: &Module, tracer: Box<dyn Tracer>) -> Self {
        Self {
            tracer,
            source: module.source.to_string(),
            globals: Shared::new(SharedCell::new((module.globals)())),
            stack: Vec::new(),
            tracing: true,
        }
    }

    pub fn globals(&self) -> Shared<SharedCell<Namespace>> {
        Shared::clone(&self.globals)
    }

    /// Call stack, outermost first.
    pub fn frames(&self) -> &[Frame] {
        &self.stack
    }

    pub fn is_tracing(&self) -> bool {
        self.tracing
    }

    pub fn run(&mut self, entry: EntryPoint) -> Result<Value, RuntimeError> {
        debug!(entry_point = entry.name, source = %self.source, "Running entry point");
        self.call(entry.name, entry.routine)
    }

    /// Runs `body` in a fresh frame named `function`.
    pub fn call<F>(&mut self, function: &str, body: F) -> Result<Value, RuntimeError>
    where
        F: FnOnce(&mut Interpreter) -> Result<Value, RuntimeError>,
    {
        self.stack.push(Frame::new(
            function,
            self.source.clone(),
            Shared::clone(&self.globals),
        ));
        let result = body(self);
        self.stack.pop();
        result
    }

    /// Marks `line` as the next line of the current frame and reports it to the
    /// tracer before it runs.
    pub fn line(&mut self, line: u32) -> Result<(), RuntimeError> {
        let Some(frame) = self.stack.last_mut() else {
            return Ok(());
        };
        frame.line = line;

        if !self.tracing {
            return Ok(());
        }

        match self.tracer.trace_line(&self.stack) {
            TraceAction::Continue => Ok(()),
            TraceAction::Detach => {
                debug!(line, "Tracer detached");
                self.tracing = false;
                Ok(())
            }
            TraceAction::Abort => Err(RuntimeError::Aborted),
        }
    }

    /// Binds `name` in the current frame, or in the globals at module level.
    pub fn assign(&mut self, name: &str, value: Value) {
        match self.stack.last() {
            Some(frame) => write(&frame.locals).insert(name, value),
            None => write(&self.globals).insert(name, value),
        }
    }

    pub fn assign_global(&mut self, name: &str, value: Value) {
        write(&self.globals).insert(name, value);
    }

    pub fn load(&self, name: &str) -> Result<Value, RuntimeError> {
        let value = match self.stack.last() {
            Some(frame) => frame.lookup(name),
            None => read(&self.globals).get(name).cloned(),
        };
        value.ok_or_else(|| RuntimeError::NameNotDefined(name.to_string()))
    }

    pub fn load_int(&self, name: &str) -> Result<i64, RuntimeError> {
        let value = self.load(name)?;
        value.as_int().ok_or_else(|| RuntimeError::TypeMismatch {
            name: name.to_string(),
            expected: "int",
            actual: value.type_name(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug)]
    struct RecordingTracer {
        lines: Shared<Mutex<Vec<(String, u32, usize)>>>,
        action_at: Option<(u32, TraceAction)>,
    }

    impl Tracer for RecordingTracer {
        fn trace_line(&self, frames: &[Frame]) -> TraceAction {
            let top = frames.last().unwrap();
            self.lines
                .lock()
                .unwrap()
                .push((top.function.clone(), top.line, frames.len()));
            match self.action_at {
                Some((line, action)) if line == top.line => action,
                _ => TraceAction::Continue,
            }
        }
    }

    fn module() -> Module {
        Module {
            name: "sample",
            source: "sample.py",
            globals: || Namespace::from_iter([("__name__".to_string(), Value::str("sample"))]),
            entry_points: &[EntryPoint {
                name: "main",
                routine: sample_main,
            }],
        }
    }

    fn sample_main(interp: &mut Interpreter) -> Result<Value, RuntimeError> {
        interp.line(1)?;
        interp.assign("a", 1.into());
        interp.line(2)?;
        let inner = interp.call("helper", |interp| {
            interp.line(10)?;
            Ok(Value::Int(interp.load_int("a").unwrap_or(0) + 1))
        })?;
        interp.line(3)?;
        interp.assign("b", inner);
        interp.load("b")
    }

    #[test]
    fn test_run_traces_every_line_with_call_depth() {
        let lines = Shared::new(Mutex::new(Vec::new()));
        let tracer = RecordingTracer {
            lines: Shared::clone(&lines),
            action_at: None,
        };
        let module = module();
        let mut interp = Interpreter::new(&module, Box::new(tracer));

        let result = interp.run(module.entry_points[0]).unwrap();

        // helper cannot see main's locals
        assert_eq!(result, Value::Int(1));
        let recorded = lines.lock().unwrap().clone();
        assert_eq!(
            recorded,
            vec![
                ("main".to_string(), 1, 1),
                ("main".to_string(), 2, 1),
                ("helper".to_string(), 10, 2),
                ("main".to_string(), 3, 1),
            ]
        );
        assert!(interp.frames().is_empty());
    }

    #[test]
    fn test_detach_stops_tracing() {
        let lines = Shared::new(Mutex::new(Vec::new()));
        let tracer = RecordingTracer {
            lines: Shared::clone(&lines),
            action_at: Some((2, TraceAction::Detach)),
        };
        let module = module();
        let mut interp = Interpreter::new(&module, Box::new(tracer));

        assert!(interp.run(module.entry_points[0]).is_ok());
        assert!(!interp.is_tracing());
        assert_eq!(lines.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_abort_unwinds_program() {
        let tracer = RecordingTracer {
            lines: Shared::new(Mutex::new(Vec::new())),
            action_at: Some((1, TraceAction::Abort)),
        };
        let module = module();
        let mut interp = Interpreter::new(&module, Box::new(tracer));

        assert_eq!(
            interp.run(module.entry_points[0]),
            Err(RuntimeError::Aborted)
        );
        assert!(interp.frames().is_empty());
    }

    #[test]
    fn test_load_reports_missing_and_mistyped_names() {
        let module = module();
        let mut interp = Interpreter::new(&module, Box::new(crate::NullTracer));
        assert_eq!(
            interp.load("missing"),
            Err(RuntimeError::NameNotDefined("missing".to_string()))
        );

        interp.assign("s", "text".into());
        assert!(matches!(
            interp.load_int("s"),
            Err(RuntimeError::TypeMismatch { actual: "str", .. })
        ));
        assert_eq!(interp.load("__name__"), Ok(Value::str("sample")));
    }
}
