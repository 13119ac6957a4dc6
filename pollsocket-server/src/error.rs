//! Error handling for the WebSocket server
//!
//! Failures fall into three groups. Protocol errors (malformed handshake or
//! frame) close one connection. Transport errors (a read or write failing on
//! an established connection) close one connection and invoke the "error"
//! callback. Setup errors (bind failure, readiness primitive failure) end
//! `Server::run`.

use pollsocket_core::error::{ConfigError, Error};
use std::io;

/// Server-specific errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Malformed handshake or frame
    #[error("Protocol error: {0}")]
    Protocol(#[from] Error),

    /// Read or write failure on an established connection
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Process-fatal failure
    #[error("Setup error: {0}")]
    Setup(#[from] SetupError),

    /// The connection was already closed
    #[error("Connection closed")]
    Closed,
}

impl ServerError {
    /// True for errors that terminate the event loop
    pub fn is_fatal(&self) -> bool {
        matches!(self, ServerError::Setup(_))
    }

    /// True for errors that are reported through the "error" callback
    pub fn is_reported(&self) -> bool {
        matches!(self, ServerError::Transport(_) | ServerError::Setup(_))
    }

    /// Copy of this error; I/O sources keep their kind and message
    pub(crate) fn replicate(&self) -> ServerError {
        match self {
            ServerError::Config(e) => ServerError::Config(e.clone()),
            ServerError::Protocol(e) => ServerError::Protocol(match e {
                Error::Protocol(e) => Error::Protocol(e.clone()),
                Error::Frame(e) => Error::Frame(e.clone()),
                Error::Config(e) => Error::Config(e.clone()),
            }),
            ServerError::Transport(e) => ServerError::Transport(match e {
                TransportError::Read(e) => TransportError::Read(copy_io(e)),
                TransportError::Write(e) => TransportError::Write(copy_io(e)),
                TransportError::Eof => TransportError::Eof,
                TransportError::Accept(e) => TransportError::Accept(copy_io(e)),
            }),
            ServerError::Setup(e) => ServerError::Setup(match e {
                SetupError::Bind { address, source } => SetupError::Bind {
                    address: address.clone(),
                    source: copy_io(source),
                },
                SetupError::Listener(e) => SetupError::Listener(copy_io(e)),
                SetupError::Poll(e) => SetupError::Poll(copy_io(e)),
                SetupError::Signals(e) => SetupError::Signals(copy_io(e)),
            }),
            ServerError::Closed => ServerError::Closed,
        }
    }
}

fn copy_io(e: &io::Error) -> io::Error {
    io::Error::new(e.kind(), e.to_string())
}

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Reading from the connection failed
    #[error("Read failed: {0}")]
    Read(#[source] io::Error),

    /// Writing to the connection failed
    #[error("Write failed: {0}")]
    Write(#[source] io::Error),

    /// The peer closed the stream without a CLOSE frame
    #[error("Connection reset by peer")]
    Eof,

    /// Accepting a new connection failed
    #[error("Accept failed: {0}")]
    Accept(#[source] io::Error),
}

/// Setup errors
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    /// The listening socket could not be bound
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    /// The listening socket could not be prepared
    #[error("Failed to configure listener: {0}")]
    Listener(#[source] io::Error),

    /// The readiness primitive could not be created or failed while waiting
    #[error("Readiness poll failed: {0}")]
    Poll(#[source] io::Error),

    /// Signal listeners could not be installed
    #[error("Failed to install signal handlers: {0}")]
    Signals(#[source] io::Error),
}

/// Result type alias for server operations
pub type ServerResult<T> = std::result::Result<T, ServerError>;
