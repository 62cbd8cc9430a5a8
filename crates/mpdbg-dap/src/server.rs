use std::io::{BufReader, BufWriter};
use std::net::{TcpListener, TcpStream};

use crossbeam_channel::Receiver;
use miette::IntoDiagnostic;
use mpdbg_runtime::ProgramRegistry;
use tracing::info;

use crate::config::AdapterConfig;
use crate::log;
use crate::session::Session;
use crate::transport::{FrameWriter, spawn_reader};

/// Runs the adapter: accepts one client on the configured address, or dials
/// out to it with `connect`, and serves a single session.
pub fn start(config: AdapterConfig) -> miette::Result<()> {
    let log_rx = log::init(config.console_log);
    info!(version = env!("CARGO_PKG_VERSION"), "Starting mpdbg debug adapter");

    let stream = if config.connect {
        info!(address = %config.address(), "Connecting to client");
        TcpStream::connect(config.address()).into_diagnostic()?
    } else {
        let listener = TcpListener::bind(config.address()).into_diagnostic()?;
        info!(address = %listener.local_addr().into_diagnostic()?, "Waiting for client");
        let (stream, peer) = listener.accept().into_diagnostic()?;
        info!(%peer, "Client connected");
        stream
    };

    run_session(stream, config, ProgramRegistry::with_builtin_modules(), log_rx)
}

/// Accepts one client on `listener` and serves its session.
pub fn serve(listener: &TcpListener, config: AdapterConfig, registry: ProgramRegistry) -> miette::Result<()> {
    let (stream, peer) = listener.accept().into_diagnostic()?;
    info!(%peer, "Client connected");
    run_session(stream, config, registry, None)
}

/// Serves one session over `stream` until the client disconnects or the
/// debuggee ends.
pub fn run_session(
    stream: TcpStream,
    config: AdapterConfig,
    registry: ProgramRegistry,
    log_rx: Option<Receiver<String>>,
) -> miette::Result<()> {
    stream.set_nodelay(true).into_diagnostic()?;
    let inbound = spawn_reader(BufReader::new(stream.try_clone().into_diagnostic()?)).into_diagnostic()?;
    let sink = FrameWriter::new(BufWriter::new(stream));

    let mut session = Session::new(config, registry, inbound, sink);
    if let Some(log_rx) = log_rx {
        session = session.with_console_log(log_rx);
    }
    let result = session.run();
    session.wait_released();
    result.into_diagnostic()
}
