use mpdbg_runtime::Frame;
use serde::Deserialize;
use serde_json::Value;

/// The debuggee runs on a single logical thread.
pub const THREAD_ID: i64 = 1;
pub const THREAD_NAME: &str = "MainThread";

/// Messages sent from the debuggee thread to the dispatcher
#[derive(Debug, Clone)]
pub enum DebuggerMessage {
    /// A breakpoint was hit; the debuggee waits for a [`DapCommand`]
    BreakpointHit {
        thread_id: i64,
        line: u32,
        breakpoint_id: i64,
        /// Innermost first
        frames: Vec<Frame>,
    },
    /// The entry point returned or failed
    Terminated { exit_code: i64 },
}

/// Messages sent from the dispatcher to a debuggee stopped at a breakpoint
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DapCommand {
    /// Resume until the next breakpoint
    Continue,
    /// Resume and stop tracing for the rest of the run
    Detach,
    /// Unwind the debuggee
    Terminate,
}

/// A request as read off the wire, before its arguments are interpreted.
#[derive(Deserialize, Debug, Clone)]
pub struct IncomingRequest {
    pub seq: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub command: String,
    #[serde(default)]
    pub arguments: Value,
}

/// Attach arguments for DAP attach configuration
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct AttachArgs {
    /// Module path of the debuggee, overriding the adapter's default.
    pub module: Option<String>,
    /// Entry point to start, overriding the adapter's default.
    pub entry_point: Option<String>,
    pub path_mappings: Vec<PathMapping>,
    pub just_my_code: Option<bool>,
    pub log_to_file: Option<bool>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PathMapping {
    pub local_root: String,
    pub remote_root: String,
}

/// Fields of `disconnect` the adapter acts on.
#[derive(Deserialize, Debug, Clone, Copy, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct DisconnectArgs {
    pub terminate_debuggee: Option<bool>,
}
