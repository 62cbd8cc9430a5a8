use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection closed")]
    Closed,
    #[error("Missing Content-Length header")]
    MissingContentLength,
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
    #[error("Malformed payload: {0}")]
    MalformedPayload(serde_json::Error),
    #[error("Failed to encode message: {0}")]
    Encode(serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Whether the stream is still in sync after this error, so the next
    /// frame can be read.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TransportError::MissingContentLength
                | TransportError::InvalidHeader(_)
                | TransportError::MalformedPayload(_)
        )
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum MutationError {
    #[error("Name \"{0}\" not found")]
    NameNotFound(String),
    #[error("Invalid literal: {0}")]
    InvalidLiteral(String),
    #[error("Cannot modify a {0}")]
    Immutable(&'static str),
    #[error("Variable reference {0} is not valid")]
    InvalidReference(i64),
}

#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
    #[error("Unsupported command: {0}")]
    UnsupportedCommand(String),
    #[error("Protocol error: {0}")]
    ProtocolError(String),
    #[error("Invalid arguments for \"{command}\": {source}")]
    InvalidArguments {
        command: String,
        source: serde_json::Error,
    },
    #[error("Request \"{command}\" is not valid while {state}")]
    InvalidState { command: String, state: String },
    #[error("Evaluation error: {0}")]
    EvaluationError(String),
    #[error(transparent)]
    Mutation(#[from] MutationError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}
