use std::fmt;
use std::time::Duration;

use crossbeam_channel::{Receiver, select};
use dap::events::{Event, ExitedEventBody, OutputEventBody, StoppedEventBody};
use dap::requests::{
    ContinueArguments, EvaluateArguments, ScopesArguments, SetBreakpointsArguments,
    SetVariableArguments, StackTraceArguments, VariablesArguments,
};
use dap::responses::{
    ContinueResponse, EvaluateResponse, Response, ResponseBody, ScopesResponse,
    SetBreakpointsResponse, SetExceptionBreakpointsResponse, SetVariableResponse,
    StackTraceResponse, ThreadsResponse, VariablesResponse,
};
use dap::types;
use mpdbg_runtime::{Frame, ProgramRegistry, Shared, SharedCell, read, write};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::breakpoints::BreakpointManager;
use crate::cache::VariableReferenceCache;
use crate::config::AdapterConfig;
use crate::error::AdapterError;
use crate::executor::ExecutionController;
use crate::inspector::{self, VariableInfo};
use crate::literal::parse_literal;
use crate::mutator::VariableMutator;
use crate::protocol::{
    AttachArgs, DebuggerMessage, DisconnectArgs, IncomingRequest, THREAD_ID, THREAD_NAME,
};
use crate::scope::{ScopeKind, ScopeRef};
use crate::source_map::{SourceMap, file_name};
use crate::transport::{Inbound, MessageSink, Outbound};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RunState {
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SessionState {
    Uninitialized,
    Initialized,
    Attached(RunState),
    Terminated,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Initialized => "initialized",
            SessionState::Attached(RunState::Running) => "running",
            SessionState::Attached(RunState::Stopped) => "stopped",
            SessionState::Terminated => "terminated",
        };
        write!(f, "{}", state)
    }
}

/// One debugging session over one control connection.
///
/// The dispatcher is driven by [`Session::run_once`], which handles at most one
/// inbound request or one debuggee message per call.
pub struct Session<S> {
    config: AdapterConfig,
    state: SessionState,
    inbound: Receiver<Inbound>,
    outbound: Outbound<S>,
    log_rx: Option<Receiver<String>>,
    breakpoints: Shared<SharedCell<BreakpointManager>>,
    executor: ExecutionController,
    cache: VariableReferenceCache,
    mutator: VariableMutator,
    source_map: SourceMap,
    /// Events to send right after the response being built.
    events: Vec<Event>,
}

impl<S: MessageSink> Session<S> {
    pub fn new(config: AdapterConfig, registry: ProgramRegistry, inbound: Receiver<Inbound>, sink: S) -> Self {
        let breakpoints = Shared::new(SharedCell::new(BreakpointManager::new()));
        Self {
            state: SessionState::Uninitialized,
            inbound,
            outbound: Outbound::new(sink),
            log_rx: None,
            executor: ExecutionController::new(registry, Shared::clone(&breakpoints)),
            breakpoints,
            cache: VariableReferenceCache::new(config.max_cached_refs),
            mutator: VariableMutator::default(),
            source_map: SourceMap::default(),
            events: Vec::new(),
            config,
        }
    }

    /// Forwards log lines from `log_rx` to the client as `output` events.
    pub fn with_console_log(mut self, log_rx: Receiver<String>) -> Self {
        self.log_rx = Some(log_rx);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Blocks until a debuggee detached by this session has finished. The
    /// debuggee lives in the adapter process, so exiting earlier would cut it
    /// off mid-run.
    pub fn wait_released(&mut self) -> bool {
        self.executor.wait_released()
    }

    pub fn run(&mut self) -> Result<(), AdapterError> {
        let poll_interval = self.config.poll_interval;
        while self.run_once(poll_interval)? {}
        info!("Session ended");
        Ok(())
    }

    /// Waits up to `timeout` for a request or a debuggee message and handles
    /// it. Returns `false` once the session has terminated.
    pub fn run_once(&mut self, timeout: Duration) -> Result<bool, AdapterError> {
        let inbound = self.inbound.clone();
        let debugger = self.executor.message_rx().clone();

        select! {
            recv(inbound) -> message => match message {
                Ok(Inbound::Message(message)) => self.handle_message(message)?,
                Ok(Inbound::Closed) | Err(_) => self.on_client_closed(),
            },
            recv(debugger) -> message => {
                if let Ok(message) = message {
                    self.handle_debugger_message(message)?;
                }
            },
            default(timeout) => {},
        }

        self.forward_logs()?;
        Ok(self.state != SessionState::Terminated)
    }

    fn handle_message(&mut self, message: Value) -> Result<(), AdapterError> {
        let seq = message.get("seq").and_then(Value::as_i64);
        let command = message
            .get("command")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let request: IncomingRequest = match serde_json::from_value(message) {
            Ok(request) => request,
            Err(e) => {
                let Some(seq) = seq else {
                    warn!(error = %e, "Dropping message without a sequence number");
                    return Ok(());
                };
                let error = AdapterError::ProtocolError(e.to_string());
                warn!(seq, error = %error, "Malformed request");
                self.outbound.respond_error(seq, &command, &error.to_string())?;
                return Ok(());
            }
        };

        if request.kind != "request" {
            debug!(kind = %request.kind, command = %request.command, "Ignoring non-request message");
            return Ok(());
        }

        self.dispatch(request)
    }

    /// Answers `request` with exactly one response, then sends the events it
    /// queued.
    fn dispatch(&mut self, request: IncomingRequest) -> Result<(), AdapterError> {
        let IncomingRequest {
            seq,
            command,
            arguments,
            ..
        } = request;

        match self.handle_request(&command, arguments) {
            Ok(body) => {
                self.outbound.respond(
                    &command,
                    Response {
                        request_seq: seq,
                        success: true,
                        message: None,
                        body: Some(body),
                        error: None,
                    },
                )?;
            }
            Err(e) => {
                warn!(seq, command = %command, error = %e, "Request failed");
                self.events.clear();
                self.outbound.respond_error(seq, &command, &e.to_string())?;
            }
        }

        for event in std::mem::take(&mut self.events) {
            self.outbound.send_event(event)?;
        }
        Ok(())
    }

    fn handle_request(&mut self, command: &str, arguments: Value) -> Result<ResponseBody, AdapterError> {
        match command {
            "initialize" => self.initialize(command),
            "attach" => self.attach(command, parse_arguments(command, arguments)?),
            "configurationDone" => self.configuration_done(command),
            "setBreakpoints" => self.set_breakpoints(command, parse_arguments(command, arguments)?),
            "setExceptionBreakpoints" => {
                debug!("Received SetExceptionBreakpoints request");
                self.require(command, |state| state != SessionState::Uninitialized)?;
                Ok(ResponseBody::SetExceptionBreakpoints(
                    SetExceptionBreakpointsResponse { breakpoints: None },
                ))
            }
            "threads" => self.threads(command),
            "stackTrace" => self.stack_trace(command, parse_arguments(command, arguments)?),
            "scopes" => self.scopes(command, parse_arguments(command, arguments)?),
            "variables" => self.variables(command, parse_arguments(command, arguments)?),
            "setVariable" => self.set_variable(command, parse_arguments(command, arguments)?),
            "continue" => self.continue_(command, parse_arguments(command, arguments)?),
            "evaluate" => self.evaluate(command, parse_arguments(command, arguments)?),
            "disconnect" => self.disconnect(parse_arguments(command, arguments)?),
            "next" | "stepIn" | "stepOut" | "pause" => Err(AdapterError::UnsupportedCommand(command.to_string())),
            _ => Err(AdapterError::UnknownCommand(command.to_string())),
        }
    }

    fn require(&self, command: &str, allowed: impl Fn(SessionState) -> bool) -> Result<(), AdapterError> {
        if allowed(self.state) {
            Ok(())
        } else {
            Err(AdapterError::InvalidState {
                command: command.to_string(),
                state: self.state.to_string(),
            })
        }
    }

    fn initialize(&mut self, command: &str) -> Result<ResponseBody, AdapterError> {
        debug!("Received Initialize request");
        self.require(command, |state| state == SessionState::Uninitialized)?;

        self.state = SessionState::Initialized;
        self.events.push(Event::Initialized);

        Ok(ResponseBody::Initialize(types::Capabilities {
            supports_configuration_done_request: Some(true),
            supports_set_variable: Some(true),
            supports_evaluate_for_hovers: Some(true),
            ..Default::default()
        }))
    }

    fn attach(&mut self, command: &str, args: AttachArgs) -> Result<ResponseBody, AdapterError> {
        debug!(?args, "Received Attach request");
        self.require(command, |state| state == SessionState::Initialized)?;

        let module = args.module.as_deref().unwrap_or(&self.config.module);
        let entry_point = args.entry_point.as_deref().unwrap_or(&self.config.entry_point);

        // Attach always succeeds; an unknown target just never stops.
        if let Err(e) = self.executor.attach(module, entry_point) {
            warn!(module, entry_point, error = %e, "Debuggee cannot run");
        }
        if args.log_to_file == Some(true) {
            info!("logToFile requested, logs stay with the adapter's own writer");
        }

        self.source_map = SourceMap::new(&args.path_mappings);
        self.state = SessionState::Attached(RunState::Running);
        Ok(ResponseBody::Attach)
    }

    fn configuration_done(&mut self, command: &str) -> Result<ResponseBody, AdapterError> {
        debug!("Received ConfigurationDone request");
        self.require(command, |state| {
            matches!(state, SessionState::Initialized | SessionState::Attached(_))
        })?;

        self.start_debuggee();
        Ok(ResponseBody::ConfigurationDone)
    }

    fn start_debuggee(&mut self) {
        match self.executor.start() {
            Ok(true) => info!("Debuggee running"),
            Ok(false) => {}
            Err(e) => error!(error = %e, "Failed to spawn debuggee thread"),
        }
    }

    fn set_breakpoints(&mut self, command: &str, args: SetBreakpointsArguments) -> Result<ResponseBody, AdapterError> {
        debug!(?args, "Received SetBreakpoints request");
        self.require(command, |state| {
            matches!(state, SessionState::Initialized | SessionState::Attached(_))
        })?;

        let path = args
            .source
            .path
            .clone()
            .or_else(|| args.source.name.clone())
            .ok_or_else(|| AdapterError::ProtocolError("setBreakpoints needs a source path".to_string()))?;

        let entries = write(&self.breakpoints).set_breakpoints(&path, &requested_lines(&args));
        let breakpoints = entries
            .iter()
            .map(|bp| types::Breakpoint {
                id: Some(bp.id),
                verified: true,
                line: Some(bp.line),
                source: Some(args.source.clone()),
                ..Default::default()
            })
            .collect();

        Ok(ResponseBody::SetBreakpoints(SetBreakpointsResponse { breakpoints }))
    }

    fn threads(&mut self, command: &str) -> Result<ResponseBody, AdapterError> {
        debug!("Received Threads request");
        self.require(command, |state| state != SessionState::Uninitialized)?;

        Ok(ResponseBody::Threads(ThreadsResponse {
            threads: vec![types::Thread {
                id: THREAD_ID,
                name: THREAD_NAME.to_string(),
            }],
        }))
    }

    fn stack_trace(&mut self, command: &str, args: StackTraceArguments) -> Result<ResponseBody, AdapterError> {
        debug!(?args, "Received StackTrace request");
        self.require(command, |state| matches!(state, SessionState::Attached(_)))?;

        let frames = self.executor.frames();
        let start = args.start_frame.unwrap_or(0).max(0) as usize;
        let levels = match args.levels {
            Some(levels) if levels > 0 => levels as usize,
            _ => frames.len(),
        };

        let stack_frames = frames
            .iter()
            .enumerate()
            .skip(start)
            .take(levels)
            .map(|(id, frame)| types::StackFrame {
                id: id as i64,
                name: frame.function.clone(),
                source: Some(self.source(frame)),
                line: i64::from(frame.line),
                column: 1,
                ..Default::default()
            })
            .collect();

        Ok(ResponseBody::StackTrace(StackTraceResponse {
            stack_frames,
            total_frames: Some(frames.len() as i64),
        }))
    }

    fn source(&self, frame: &Frame) -> types::Source {
        let path = self.source_map.to_local(&frame.source);
        types::Source {
            name: Some(file_name(&path).to_string()),
            path: Some(path),
            source_reference: None,
            presentation_hint: None,
            origin: None,
            sources: None,
            adapter_data: None,
            checksums: None,
        }
    }

    fn scopes(&mut self, command: &str, args: ScopesArguments) -> Result<ResponseBody, AdapterError> {
        debug!(?args, "Received Scopes request");
        self.require(command, |state| matches!(state, SessionState::Attached(_)))?;

        let frame = usize::try_from(args.frame_id)
            .ok()
            .and_then(|id| self.executor.frames().get(id));
        let scopes = match frame {
            Some(frame) => [ScopeKind::Locals, ScopeKind::Globals]
                .into_iter()
                .filter_map(|kind| ScopeRef::new(args.frame_id, kind))
                .map(|scope| {
                    let namespace = if scope.kind.is_global() {
                        &frame.globals
                    } else {
                        &frame.locals
                    };
                    types::Scope {
                        name: scope.kind.to_string(),
                        presentation_hint: None,
                        variables_reference: scope.encode(),
                        named_variables: Some(read(namespace).len() as i64),
                        indexed_variables: None,
                        expensive: false,
                        source: None,
                        line: None,
                        column: None,
                        end_line: None,
                        end_column: None,
                    }
                })
                .collect(),
            None => Vec::new(),
        };

        Ok(ResponseBody::Scopes(ScopesResponse { scopes }))
    }

    fn variables(&mut self, command: &str, args: VariablesArguments) -> Result<ResponseBody, AdapterError> {
        debug!(?args, "Received Variables request");
        self.require(command, |state| matches!(state, SessionState::Attached(_)))?;

        let variables = inspector::variables(args.variables_reference, self.executor.frames(), &mut self.cache)
            .into_iter()
            .map(types::Variable::from)
            .collect();

        Ok(ResponseBody::Variables(VariablesResponse { variables }))
    }

    fn set_variable(&mut self, command: &str, args: SetVariableArguments) -> Result<ResponseBody, AdapterError> {
        debug!(?args, "Received SetVariable request");
        self.require(command, |state| state == SessionState::Attached(RunState::Stopped))?;

        let info = self.mutator.set_variable(
            args.variables_reference,
            &args.name,
            &args.value,
            self.executor.frames(),
            &mut self.cache,
        )?;

        let (named_variables, indexed_variables) = info.child_counts();
        Ok(ResponseBody::SetVariable(SetVariableResponse {
            value: info.value,
            type_field: Some(info.type_name),
            variables_reference: Some(info.reference),
            named_variables: named_variables.map(|n| n as i32),
            indexed_variables: indexed_variables.map(|n| n as i32),
        }))
    }

    fn continue_(&mut self, command: &str, args: ContinueArguments) -> Result<ResponseBody, AdapterError> {
        debug!(?args, "Received Continue request");
        self.require(command, |state| matches!(state, SessionState::Attached(_)))?;

        if self.state == SessionState::Attached(RunState::Stopped) {
            self.cache.clear();
            if !self.executor.resume() {
                warn!("Debuggee was not waiting for a command");
            }
        } else {
            self.start_debuggee();
        }

        self.state = SessionState::Attached(RunState::Running);
        Ok(ResponseBody::Continue(ContinueResponse {
            all_threads_continued: Some(true),
        }))
    }

    fn evaluate(&mut self, command: &str, args: EvaluateArguments) -> Result<ResponseBody, AdapterError> {
        debug!(?args, "Received Evaluate request");
        self.require(command, |state| matches!(state, SessionState::Attached(_)))?;

        let expression = args.expression.trim();
        let value = if is_identifier(expression) {
            let frame = usize::try_from(args.frame_id.unwrap_or(0))
                .ok()
                .and_then(|id| self.executor.frames().get(id))
                .ok_or_else(|| AdapterError::EvaluationError("No frame is available".to_string()))?;
            frame
                .lookup(expression)
                .ok_or_else(|| AdapterError::EvaluationError(format!("Name \"{}\" is not defined", expression)))?
        } else {
            parse_literal(expression).map_err(|e| AdapterError::EvaluationError(e.to_string()))?
        };

        let info = VariableInfo::describe(expression, &value, &mut self.cache);
        let (named_variables, indexed_variables) = info.child_counts();
        Ok(ResponseBody::Evaluate(EvaluateResponse {
            result: info.value,
            type_field: Some(info.type_name),
            presentation_hint: None,
            variables_reference: info.reference,
            named_variables,
            indexed_variables,
            memory_reference: None,
        }))
    }

    fn disconnect(&mut self, args: DisconnectArgs) -> Result<ResponseBody, AdapterError> {
        debug!(?args, "Received Disconnect request");

        if args.terminate_debuggee == Some(true) {
            self.executor.terminate();
        } else {
            self.executor.detach();
        }
        self.cache.clear();
        self.state = SessionState::Terminated;
        Ok(ResponseBody::Disconnect)
    }

    fn handle_debugger_message(&mut self, message: DebuggerMessage) -> Result<(), AdapterError> {
        match message {
            DebuggerMessage::BreakpointHit {
                thread_id,
                line,
                breakpoint_id,
                frames,
            } => {
                if !matches!(self.state, SessionState::Attached(_)) {
                    debug!(line, state = %self.state, "Releasing debuggee stopped outside a session");
                    self.executor.detach();
                    return Ok(());
                }

                debug!(line, "Sending stopped event for breakpoint");
                self.executor.on_breakpoint_hit(frames);
                self.state = SessionState::Attached(RunState::Stopped);

                self.outbound.send_event(Event::Stopped(StoppedEventBody {
                    reason: types::StoppedEventReason::Breakpoint,
                    description: Some(format!("Breakpoint hit at line {}", line)),
                    thread_id: Some(thread_id),
                    preserve_focus_hint: None,
                    text: None,
                    all_threads_stopped: Some(true),
                    hit_breakpoint_ids: Some(vec![breakpoint_id]),
                }))?;
            }
            DebuggerMessage::Terminated { exit_code } => {
                if self.state == SessionState::Terminated {
                    return Ok(());
                }
                info!(exit_code, "Debuggee exited");
                self.state = SessionState::Terminated;
                self.outbound
                    .send_event(Event::Exited(ExitedEventBody { exit_code }))?;
                self.outbound.send_event(Event::Terminated(None))?;
            }
        }
        Ok(())
    }

    fn on_client_closed(&mut self) {
        info!("Client disconnected, detaching debuggee");
        self.executor.detach();
        self.state = SessionState::Terminated;
    }

    fn forward_logs(&mut self) -> Result<(), AdapterError> {
        if self.state == SessionState::Terminated {
            return Ok(());
        }
        let lines: Vec<String> = match &self.log_rx {
            Some(log_rx) => log_rx.try_iter().collect(),
            None => return Ok(()),
        };

        for line in lines {
            self.outbound.send_event(Event::Output(OutputEventBody {
                output: line,
                category: Some(types::OutputEventCategory::Console),
                group: None,
                variables_reference: None,
                source: None,
                line: None,
                column: None,
                data: None,
            }))?;
        }
        Ok(())
    }
}

/// Deserializes request arguments, treating absent arguments as `{}`.
fn parse_arguments<T: DeserializeOwned>(command: &str, arguments: Value) -> Result<T, AdapterError> {
    let arguments = match arguments {
        Value::Null => Value::Object(Default::default()),
        arguments => arguments,
    };
    serde_json::from_value(arguments).map_err(|source| AdapterError::InvalidArguments {
        command: command.to_string(),
        source,
    })
}

/// Lines of a `setBreakpoints` request, from `breakpoints` or the legacy
/// `lines` field.
#[allow(deprecated)]
fn requested_lines(args: &SetBreakpointsArguments) -> Vec<i64> {
    match (&args.breakpoints, &args.lines) {
        (Some(breakpoints), _) => breakpoints.iter().map(|bp| bp.line).collect(),
        (None, Some(lines)) => lines.clone(),
        (None, None) => Vec::new(),
    }
}

fn is_identifier(expression: &str) -> bool {
    let mut chars = expression.chars();
    let starts_well = chars.next().is_some_and(|c| c.is_alphabetic() || c == '_');
    starts_well
        && chars.all(|c| c.is_alphanumeric() || c == '_')
        && !matches!(expression, "None" | "True" | "False" | "null" | "true" | "false")
}
