//! Error types for wirecall.

use thiserror::Error;

/// Main error type for all client, server and protocol operations.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Service path is not of the form `Object.Method`.
    #[error("Format error: {0}")]
    Format(String),

    /// Dial, accept or bind failure.
    #[error("Connection error: {0}")]
    Connection(String),

    /// I/O error on the underlying stream (including short reads).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame is corrupt: bad magic, unknown enum code, inconsistent lengths.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Payload serialization/deserialization failure.
    #[error("Codec error: {0}")]
    Codec(String),

    /// Payload compression/decompression failure.
    #[error("Compression error: {0}")]
    Compression(String),

    /// The client was closed locally.
    #[error("Client is closed")]
    ClientClosed,

    /// No response arrived: the connection dropped or the peer shut down.
    #[error("Server unavailable")]
    ServerUnavailable,

    /// The call did not complete before its deadline.
    #[error("Call timed out")]
    Timeout,

    /// The remote handler returned an error in its error slot.
    #[error("Remote error: {0}")]
    Remote(String),

    /// No handler registered under the object name.
    #[error("Service not registered: {0}")]
    UnknownService(String),

    /// Method name not present in the target service.
    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    /// A service name was registered twice.
    #[error("Service already registered: {0}")]
    AlreadyRegistered(String),

    /// A handler panicked while serving a request.
    #[error("Handler panicked: {0}")]
    HandlerPanic(String),

    /// Invalid configuration value.
    #[error("Config error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for RpcError {
    fn from(err: serde_json::Error) -> Self {
        RpcError::Codec(err.to_string())
    }
}

impl From<rmp_serde::encode::Error> for RpcError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        RpcError::Codec(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for RpcError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        RpcError::Codec(err.to_string())
    }
}

/// Result type alias using RpcError.
pub type Result<T> = std::result::Result<T, RpcError>;
