use std::io::{self, Write};

use crossbeam_channel::{Receiver, Sender};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

const DEFAULT_FILTER: &str = "mpdbg_dap=info,mpdbg_runtime=info";

/// Log writer whose lines end up in the client's debug console.
#[derive(Clone)]
pub struct DebugConsoleWriter {
    sender: Sender<String>,
}

impl DebugConsoleWriter {
    pub fn new() -> (Self, Receiver<String>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { sender: tx }, rx)
    }
}

impl Write for DebugConsoleWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let message = String::from_utf8_lossy(buf).into_owned();
        // Once the session is gone there is nobody to show the line to.
        let _ = self.sender.send(message);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for DebugConsoleWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Installs the global subscriber. Logs go to stderr, or to the returned
/// receiver when `console_log` is set. `RUST_LOG` overrides the filter.
pub fn init(console_log: bool) -> Option<Receiver<String>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if console_log {
        let (writer, log_rx) = DebugConsoleWriter::new();
        builder.with_ansi(false).with_writer(writer).try_init().ok()?;
        Some(log_rx)
    } else {
        let _ = builder.with_writer(io::stderr).try_init();
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_written_lines_reach_receiver() {
        let (mut writer, rx) = DebugConsoleWriter::new();
        writer.write_all(b"INFO attached\n").unwrap();
        writer.flush().unwrap();
        assert_eq!(rx.try_recv().unwrap(), "INFO attached\n");
    }

    #[test]
    fn test_write_after_receiver_dropped_succeeds() {
        let (writer, rx) = DebugConsoleWriter::new();
        drop(rx);
        let mut made = writer.make_writer();
        assert_eq!(made.write(b"lost").unwrap(), 4);
    }
}
