//! Error types for PollSocket
//!
//! Errors raised while decoding frames or negotiating the upgrade handshake.
//! The server crate wraps these into its own taxonomy.

#![allow(missing_docs)]

use std::fmt;
use thiserror::Error;

/// Result type alias for PollSocket core operations
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error type for codec and handshake operations
#[derive(Error, Debug)]
pub enum Error {
    /// Protocol errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Frame errors
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// True when more input may turn this error into a successful decode
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Error::Frame(FrameError::InsufficientData { .. }))
    }
}

/// Handshake level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A line that is neither a request line nor a header line
    #[error("Malformed handshake line: {0:?}")]
    MalformedLine(String),

    /// The request is not valid UTF-8
    #[error("Handshake request is not valid UTF-8")]
    InvalidUtf8,

    /// The header block did not terminate within the read limit
    #[error("Handshake request too large: {size} bytes (max: {max})")]
    RequestTooLarge { size: usize, max: usize },

    /// The peer closed before sending a full header block
    #[error("Handshake request truncated after {0} bytes")]
    Truncated(usize),
}

/// Frame parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Insufficient data to parse frame
    #[error("Insufficient data: need {needed} bytes, have {have}")]
    InsufficientData { needed: usize, have: usize },

    /// Declared payload exceeds the configured limit
    #[error("Frame too large: {size} bytes (max: {max})")]
    TooLarge { size: u64, max: usize },

    /// Invalid opcode
    #[error("Invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    /// Client frame without a masking key
    #[error("Client frames must be masked")]
    Unmasked,

    /// Server frame carrying a masking key
    #[error("Server frames must not be masked")]
    UnexpectedMask,

    /// Reserved bits set
    #[error("Reserved bits set in frame")]
    ReservedBitsSet,

    /// Control frames cannot be fragmented
    #[error("Control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// Control frame payload above 125 bytes
    #[error("Control frame payload too large: {0} bytes")]
    ControlFrameTooLarge(u64),
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    Validation(String),
}

/// WebSocket close codes as defined in RFC 6455
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    /// Normal closure
    Normal,
    /// Going away
    Away,
    /// Protocol error
    ProtocolError,
    /// Unsupported data
    Unsupported,
    /// No status received
    NoStatus,
    /// Abnormal closure
    Abnormal,
    /// Invalid frame payload data
    InvalidPayload,
    /// Policy violation
    PolicyViolation,
    /// Message too big
    TooBig,
    /// Mandatory extension
    MandatoryExtension,
    /// Internal server error
    Internal,
    /// Service restart
    ServiceRestart,
    /// Try again later
    TryAgainLater,
    /// Bad gateway
    BadGateway,
    /// TLS handshake failure
    TlsHandshake,
    /// Application-specific close code (3000-4999)
    Application(u16),
}

impl CloseCode {
    /// Create a CloseCode from a u16
    ///
    /// Codes that are not valid on the wire map to [`CloseCode::ProtocolError`].
    pub fn from(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::Away,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::Unsupported,
            1005 => CloseCode::NoStatus,
            1006 => CloseCode::Abnormal,
            1007 => CloseCode::InvalidPayload,
            1008 => CloseCode::PolicyViolation,
            1009 => CloseCode::TooBig,
            1010 => CloseCode::MandatoryExtension,
            1011 => CloseCode::Internal,
            1012 => CloseCode::ServiceRestart,
            1013 => CloseCode::TryAgainLater,
            1014 => CloseCode::BadGateway,
            1015 => CloseCode::TlsHandshake,
            code if (3000..=4999).contains(&code) => CloseCode::Application(code),
            _ => CloseCode::ProtocolError,
        }
    }

    /// Read the status code at the head of a CLOSE payload
    pub fn from_payload(payload: &[u8]) -> Option<Self> {
        match payload {
            [hi, lo, ..] => Some(Self::from(u16::from_be_bytes([*hi, *lo]))),
            _ => None,
        }
    }

    /// Get the numeric value of the close code
    pub fn code(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::Away => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::Unsupported => 1003,
            CloseCode::NoStatus => 1005,
            CloseCode::Abnormal => 1006,
            CloseCode::InvalidPayload => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::TooBig => 1009,
            CloseCode::MandatoryExtension => 1010,
            CloseCode::Internal => 1011,
            CloseCode::ServiceRestart => 1012,
            CloseCode::TryAgainLater => 1013,
            CloseCode::BadGateway => 1014,
            CloseCode::TlsHandshake => 1015,
            CloseCode::Application(code) => *code,
        }
    }

    /// Codes that must never be put on the wire
    pub fn is_reserved(&self) -> bool {
        matches!(
            self,
            CloseCode::NoStatus | CloseCode::Abnormal | CloseCode::TlsHandshake
        )
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}
