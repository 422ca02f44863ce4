//! Reactor Error Types
//!
//! Comprehensive error handling for all reactor server operations.

use std::io;
use thiserror::Error;

/// Main error type for reactor operations.
#[derive(Error, Debug)]
pub enum ReactorError {
    /// IO error during socket operations.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Invalid configuration supplied to `Server::init`.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// `Server::start` called on an already-started server.
    #[error("server already started")]
    AlreadyStarted,

    /// `Server::run` or `Server::stop` called on a server that was never started.
    #[error("server not started")]
    NotStarted,

    /// `send_message` or a write was attempted on a closed connection.
    #[error("connection closed")]
    ConnectionClosed,

    /// `decode` reported malformed framing.
    #[error("protocol framing error: {0}")]
    Protocol(String),

    /// `send_message` targeted a connection the server does not know about.
    #[error("unknown connection")]
    UnknownConnection,
}

/// Result type alias for reactor operations.
pub type Result<T> = std::result::Result<T, ReactorError>;

impl ReactorError {
    /// Create a protocol framing error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error merely reports a recoverable, locally-handled
    /// condition (e.g. a lifecycle misuse) rather than a fatal I/O failure.
    #[must_use]
    pub const fn is_lifecycle(&self) -> bool {
        matches!(self, Self::AlreadyStarted | Self::NotStarted)
    }
}
