//! WebSocket protocol constants and utilities
//!
//! This module contains the protocol definitions from RFC 6455 used by the
//! codec and the handshake, plus the HTTP status-line table the server needs
//! to reject non-WebSocket requests.

/// WebSocket opcodes as defined in RFC 6455 Section 5.2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Continuation frame
    Continuation = 0x0,
    /// Text frame
    Text = 0x1,
    /// Binary frame
    Binary = 0x2,
    /// Close frame
    Close = 0x8,
    /// Ping frame
    Ping = 0x9,
    /// Pong frame
    Pong = 0xA,
}

impl Opcode {
    /// Create an Opcode from the low nibble of a frame header
    ///
    /// Reserved opcodes (0x3-0x7, 0xB-0xF) yield `None`.
    pub fn from(value: u8) -> Option<Self> {
        match value {
            0x0 => Some(Opcode::Continuation),
            0x1 => Some(Opcode::Text),
            0x2 => Some(Opcode::Binary),
            0x8 => Some(Opcode::Close),
            0x9 => Some(Opcode::Ping),
            0xA => Some(Opcode::Pong),
            _ => None,
        }
    }

    /// Get the numeric value of the opcode
    pub fn value(&self) -> u8 {
        *self as u8
    }

    /// Check if this is a control opcode
    pub fn is_control(&self) -> bool {
        matches!(self, Opcode::Close | Opcode::Ping | Opcode::Pong)
    }

    /// Check if this is a data opcode
    pub fn is_data(&self) -> bool {
        matches!(self, Opcode::Text | Opcode::Binary | Opcode::Continuation)
    }
}

/// WebSocket protocol constants
pub mod constants {
    use std::time::Duration;

    /// WebSocket magic string for accept calculation
    pub const WEBSOCKET_MAGIC: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

    /// WebSocket protocol version
    pub const WEBSOCKET_VERSION: &str = "13";

    /// Largest handshake request accepted, pipelined frame bytes included
    pub const MAX_HANDSHAKE_SIZE: usize = 65535;

    /// Bytes requested from the transport per read
    pub const READ_CHUNK_SIZE: usize = 65536;

    /// Maximum frame payload size (default)
    pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024; // 16MB

    /// Default readiness poll interval
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

    /// Default handshake timeout
    pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

    /// Default connection limit
    pub const DEFAULT_MAX_CONNECTIONS: usize = 10_000;

    /// Largest payload a control frame may carry
    pub const MAX_CONTROL_PAYLOAD: u64 = 125;

    /// Line separator used by HTTP/1.1
    pub const CRLF: &str = "\r\n";

    /// Marker that ends an HTTP header block
    pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";
}

/// Frame header bit positions and masks
pub mod frame {
    /// FIN bit position
    pub const FIN_BIT: u8 = 0x80;

    /// RSV1 bit position
    pub const RSV1_BIT: u8 = 0x40;

    /// RSV2 bit position
    pub const RSV2_BIT: u8 = 0x20;

    /// RSV3 bit position
    pub const RSV3_BIT: u8 = 0x10;

    /// Opcode mask
    pub const OPCODE_MASK: u8 = 0x0F;

    /// MASK bit position
    pub const MASK_BIT: u8 = 0x80;

    /// Payload length mask for 7-bit length
    pub const PAYLOAD_LEN_MASK: u8 = 0x7F;

    /// Largest length that fits the 7-bit field
    pub const PAYLOAD_LEN_INLINE_MAX: usize = 125;

    /// Extended payload length (16-bit) marker
    pub const PAYLOAD_LEN_16: u8 = 126;

    /// Extended payload length (64-bit) marker
    pub const PAYLOAD_LEN_64: u8 = 127;

    /// Masking key length
    pub const MASKING_KEY_LEN: usize = 4;
}

/// HTTP header names in their normalised form
///
/// Incoming header names are rewritten to Title-Case-With-Dashes before they
/// are stored, see [`crate::handshake::normalize_header_name`].
pub mod http_header {
    /// Upgrade header
    pub const UPGRADE: &str = "Upgrade";

    /// Connection header
    pub const CONNECTION: &str = "Connection";

    /// Sec-WebSocket-Key header
    pub const SEC_WEBSOCKET_KEY: &str = "Sec-Websocket-Key";

    /// Sec-WebSocket-Accept header, as written on responses
    pub const SEC_WEBSOCKET_ACCEPT: &str = "Sec-WebSocket-Accept";
}

/// HTTP status lines
///
/// This is the one piece of the surrounding application kernel the server
/// depends on: the reason phrases for the status codes it may emit.
pub mod http_status {
    /// HTTP Switching Protocols status
    pub const SWITCHING_PROTOCOLS: u16 = 101;

    /// HTTP Bad Request status
    pub const BAD_REQUEST: u16 = 400;

    const REASONS: &[(u16, &str)] = &[
        (100, "Continue"),
        (101, "Switching Protocols"),
        (103, "Early Hints"),
        (200, "OK"),
        (201, "Created"),
        (202, "Accepted"),
        (203, "Non-Authorative Information"),
        (204, "No Content"),
        (205, "Reset Content"),
        (206, "Partial Content"),
        (300, "Multiple Choices"),
        (301, "Moved Permanently"),
        (302, "Found"),
        (303, "See Other"),
        (304, "Not Modified"),
        (305, "Use Proxy"),
        (307, "Temporary Redirect"),
        (400, "Bad Request"),
        (401, "Unauthorized"),
        (402, "Payment Required"),
        (403, "Forbidden"),
        (404, "Not Found"),
        (405, "Method Not Allowed"),
        (406, "Not Acceptable"),
        (407, "Proxy Authentication Required"),
        (408, "Request Timeout"),
        (409, "Conflict"),
        (410, "Gone"),
        (411, "Length Required"),
        (412, "Precondition Failed"),
        (413, "Request Entity Too Large"),
        (414, "Request-URI Too Long"),
        (415, "Unsupported Media Type"),
        (416, "Requested Range Not Satisfiable"),
        (417, "Expectation Failed"),
        (500, "Internal Server Error"),
        (501, "Not Implemented"),
        (502, "Bad Gateway"),
        (503, "Service Unavailable"),
        (504, "Gateway Timeout"),
        (505, "HTTP Version Not Supported"),
    ];

    /// Reason phrase for a status code
    pub fn reason(code: u16) -> Option<&'static str> {
        REASONS
            .iter()
            .find(|(known, _)| *known == code)
            .map(|(_, reason)| *reason)
    }

    /// Full HTTP/1.1 status line, without the trailing CRLF
    pub fn status_line(code: u16) -> String {
        match reason(code) {
            Some(reason) => format!("HTTP/1.1 {} {}", code, reason),
            None => format!("HTTP/1.1 {}", code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_conversion() {
        assert_eq!(Opcode::from(0x1), Some(Opcode::Text));
        assert_eq!(Opcode::from(0x3), None);
        assert_eq!(Opcode::from(0xB), None);
        assert_eq!(Opcode::Pong.value(), 0xA);
        assert!(Opcode::Ping.is_control());
        assert!(Opcode::Continuation.is_data());
        assert!(!Opcode::Close.is_data());
    }

    #[test]
    fn test_status_lines() {
        assert_eq!(
            http_status::status_line(http_status::BAD_REQUEST),
            "HTTP/1.1 400 Bad Request"
        );
        assert_eq!(
            http_status::status_line(http_status::SWITCHING_PROTOCOLS),
            "HTTP/1.1 101 Switching Protocols"
        );
        assert_eq!(http_status::reason(418), None);
        assert_eq!(http_status::status_line(418), "HTTP/1.1 418");
    }
}
