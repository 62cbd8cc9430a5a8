//! Content-Length framed JSON messages over a byte stream.
use std::io::{self, BufRead, Read, Write};
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use dap::events::Event;
use dap::responses::Response;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::error::TransportError;

const CONTENT_LENGTH: &str = "content-length";

/// Largest payload accepted from a client; larger frames are skipped.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Items produced by the reader thread.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Message(Value),
    Closed,
}

pub struct FrameReader<R> {
    reader: R,
    max_len: usize,
}

impl<R: BufRead> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            max_len: MAX_FRAME_LEN,
        }
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    /// Reads one complete frame. Returns `Ok(None)` when the peer closed the
    /// stream between frames.
    pub fn read_frame(&mut self) -> Result<Option<Value>, TransportError> {
        let mut content_length: Option<Result<usize, String>> = None;
        let mut header_lines = 0;

        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line)? == 0 {
                return if header_lines == 0 {
                    Ok(None)
                } else {
                    Err(TransportError::Closed)
                };
            }
            header_lines += 1;

            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                if header_lines == 1 {
                    // stray separator between frames
                    header_lines = 0;
                    continue;
                }
                break;
            }

            if let Some((name, value)) = line.split_once(':')
                && name.trim().eq_ignore_ascii_case(CONTENT_LENGTH)
            {
                let value = value.trim();
                content_length = Some(value.parse().map_err(|_| value.to_string()));
            }
        }

        let len = match content_length {
            Some(Ok(len)) => len,
            Some(Err(raw)) => return Err(TransportError::InvalidHeader(raw)),
            None => return Err(TransportError::MissingContentLength),
        };

        if len > self.max_len {
            let skipped = io::copy(&mut (&mut self.reader).take(len as u64), &mut io::sink())?;
            if skipped < len as u64 {
                return Err(TransportError::Closed);
            }
            return Err(TransportError::InvalidHeader(format!(
                "Content-Length {} exceeds {} bytes",
                len, self.max_len
            )));
        }

        let mut payload = vec![0u8; len];
        self.reader.read_exact(&mut payload).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => TransportError::Closed,
            _ => TransportError::Io(e),
        })?;

        serde_json::from_slice(&payload)
            .map(Some)
            .map_err(TransportError::MalformedPayload)
    }
}

/// Reads frames on a background thread so the dispatcher can poll without
/// blocking. Malformed frames are logged and dropped.
pub fn spawn_reader<R>(reader: R) -> io::Result<Receiver<Inbound>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = crossbeam_channel::unbounded();
    thread::Builder::new()
        .name("dap-reader".to_string())
        .spawn(move || read_loop(FrameReader::new(reader), tx))?;
    Ok(rx)
}

fn read_loop<R: BufRead>(mut frames: FrameReader<R>, tx: Sender<Inbound>) {
    loop {
        match frames.read_frame() {
            Ok(Some(message)) => {
                if tx.send(Inbound::Message(message)).is_err() {
                    return;
                }
            }
            Ok(None) => {
                info!("Client closed the connection");
                break;
            }
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "Dropping malformed frame");
            }
            Err(e) => {
                info!(error = %e, "Stopped reading from client");
                break;
            }
        }
    }
    let _ = tx.send(Inbound::Closed);
}

/// Destination for fully formed outbound messages.
pub trait MessageSink: Send {
    fn send_message(&mut self, message: Value) -> Result<(), TransportError>;
}

pub struct FrameWriter<W> {
    writer: W,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write + Send> MessageSink for FrameWriter<W> {
    fn send_message(&mut self, message: Value) -> Result<(), TransportError> {
        let payload = serde_json::to_vec(&message).map_err(TransportError::Encode)?;
        let mut frame = format!("Content-Length: {}\r\n\r\n", payload.len()).into_bytes();
        frame.extend_from_slice(&payload);
        self.writer.write_all(&frame)?;
        self.writer.flush()?;
        Ok(())
    }
}

impl MessageSink for Sender<Value> {
    fn send_message(&mut self, message: Value) -> Result<(), TransportError> {
        self.send(message).map_err(|_| TransportError::Closed)
    }
}

/// Stamps outbound messages with their type and sequence number.
pub struct Outbound<S> {
    sink: S,
    seq: i64,
}

impl<S: MessageSink> Outbound<S> {
    pub fn new(sink: S) -> Self {
        Self { sink, seq: 0 }
    }

    pub fn respond(&mut self, command: &str, response: Response) -> Result<(), TransportError> {
        let mut message = serde_json::to_value(&response).map_err(TransportError::Encode)?;
        if let Some(object) = message.as_object_mut() {
            object
                .entry("command")
                .or_insert_with(|| Value::String(command.to_string()));
        }
        self.send("response", message)
    }

    pub fn respond_error(
        &mut self,
        request_seq: i64,
        command: &str,
        error: &str,
    ) -> Result<(), TransportError> {
        self.send(
            "response",
            json!({
                "request_seq": request_seq,
                "success": false,
                "command": command,
                "message": error,
            }),
        )
    }

    pub fn send_event(&mut self, event: Event) -> Result<(), TransportError> {
        let message = serde_json::to_value(&event).map_err(TransportError::Encode)?;
        self.send("event", message)
    }

    fn send(&mut self, kind: &str, mut message: Value) -> Result<(), TransportError> {
        self.seq += 1;
        if let Some(object) = message.as_object_mut() {
            object.insert("seq".to_string(), json!(self.seq));
            object.insert("type".to_string(), json!(kind));
        }
        self.sink.send_message(message)
    }
}
