//! WebSocket handshake implementation
//!
//! Server side of the RFC 6455 opening handshake: locating the end of the
//! request head, parsing it line by line, and deciding between a
//! `101 Switching Protocols` upgrade and a rejection.

use crate::error::{Error, ProtocolError};
use crate::protocol::constants::{CRLF, HEADER_TERMINATOR, WEBSOCKET_MAGIC, WEBSOCKET_VERSION};
use crate::protocol::http_header::*;
use crate::protocol::http_status::{self, BAD_REQUEST, SWITCHING_PROTOCOLS};
use base64::{engine::general_purpose, Engine as _};
use sha1::{Digest, Sha1};
use std::collections::HashMap;

/// Upgrade request information captured at handshake time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// HTTP method, when a request line was present
    pub verb: Option<String>,
    /// Request URI, when a request line was present
    pub uri: Option<String>,
    /// HTTP headers keyed by normalised name
    pub headers: HashMap<String, String>,
}

impl HandshakeRequest {
    /// Look up a header by name, in any letter case
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&normalize_header_name(name))
            .map(String::as_str)
    }

    /// Whether a request line was parsed
    pub fn has_request_line(&self) -> bool {
        self.verb.is_some() && self.uri.is_some()
    }
}

/// Outcome of evaluating an upgrade request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Negotiation {
    /// Complete the upgrade by writing this response
    Upgrade(String),
    /// Refuse the request; write the response (if any) and close
    Reject(Option<String>),
}

/// Compute WebSocket accept key from client key
pub fn compute_accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WEBSOCKET_MAGIC.as_bytes());
    general_purpose::STANDARD.encode(hasher.finalize())
}

/// Generate a random WebSocket key, as a client would send it
pub fn generate_key() -> String {
    general_purpose::STANDARD.encode(rand::random::<[u8; 16]>())
}

/// Rewrite a header name to Title-Case-With-Dashes
///
/// `sec-websocket-key` and `SEC-WEBSOCKET-KEY` both become `Sec-Websocket-Key`.
pub fn normalize_header_name(name: &str) -> String {
    name.trim()
        .split('-')
        .map(|word| {
            let lower = word.to_ascii_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Find the end of the request head
///
/// Returns the number of bytes up to and including the blank line that
/// terminates the header block.
pub fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
        .map(|pos| pos + HEADER_TERMINATOR.len())
}

/// Parse an upgrade request head
///
/// Every CRLF-separated line must be either a request line
/// (`VERB URI HTTP/1.x`) or a header line (`Name: value`); anything else is
/// a structural failure.
pub fn parse_request(head: &[u8]) -> Result<HandshakeRequest, Error> {
    let text = std::str::from_utf8(head).map_err(|_| ProtocolError::InvalidUtf8)?;
    let mut request = HandshakeRequest::default();

    for line in text.trim().split(CRLF) {
        let line = line.trim();
        if let Some((verb, uri)) = parse_request_line(line) {
            request.verb = Some(verb.to_string());
            request.uri = Some(uri.to_string());
        } else if let Some((name, value)) = parse_header_line(line) {
            request
                .headers
                .insert(normalize_header_name(name), value.to_string());
        } else {
            return Err(ProtocolError::MalformedLine(line.to_string()).into());
        }
    }

    Ok(request)
}

fn parse_request_line(line: &str) -> Option<(&str, &str)> {
    let (rest, version) = line.rsplit_once(char::is_whitespace)?;
    let minor = version.strip_prefix("HTTP/1.")?;
    if minor.len() != 1 || !minor.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let (verb, uri) = rest.split_once(char::is_whitespace)?;
    let is_word = |c: char| c.is_ascii_alphanumeric() || c == '_';
    if verb.is_empty() || !verb.chars().all(is_word) || uri.is_empty() {
        return None;
    }
    Some((verb, uri))
}

fn parse_header_line(line: &str) -> Option<(&str, &str)> {
    let (name, value) = line.split_once(": ")?;
    if name.is_empty() || value.is_empty() {
        return None;
    }
    Some((name, value))
}

/// Decide how to answer an upgrade request
///
/// A request carrying neither `Upgrade` nor `Sec-WebSocket-Key` is not a
/// WebSocket request: it gets a 400 when a request line was seen and is
/// dropped silently otherwise. A request without a key cannot be accepted
/// either, since no accept value can be derived.
pub fn negotiate(request: &HandshakeRequest) -> Negotiation {
    let upgrade = request.header(UPGRADE);
    let key = request.header(SEC_WEBSOCKET_KEY);

    match (upgrade, key) {
        (_, Some(key)) => Negotiation::Upgrade(switching_protocols_response(key)),
        (Some(_), None) => Negotiation::Reject(Some(bad_request_response())),
        (None, None) if request.has_request_line() => {
            Negotiation::Reject(Some(bad_request_response()))
        }
        (None, None) => Negotiation::Reject(None),
    }
}

/// `101 Switching Protocols` response for the given client key
pub fn switching_protocols_response(client_key: &str) -> String {
    [
        http_status::status_line(SWITCHING_PROTOCOLS),
        format!("{}: websocket", UPGRADE),
        format!("{}: Upgrade", CONNECTION),
        format!(
            "{}: {}",
            SEC_WEBSOCKET_ACCEPT,
            compute_accept_key(client_key.trim())
        ),
        String::new(),
        String::new(),
    ]
    .join(CRLF)
}

/// `400 Bad Request` response that announces the close
pub fn bad_request_response() -> String {
    [
        http_status::status_line(BAD_REQUEST),
        format!("{}: close", CONNECTION),
        String::new(),
        String::new(),
    ]
    .join(CRLF)
}

/// Build a client upgrade request, used by tests and tooling
pub fn client_request(host: &str, uri: &str, key: &str) -> String {
    [
        format!("GET {} HTTP/1.1", uri),
        format!("Host: {}", host),
        format!("{}: websocket", UPGRADE),
        format!("{}: Upgrade", CONNECTION),
        format!("Sec-WebSocket-Key: {}", key),
        format!("Sec-WebSocket-Version: {}", WEBSOCKET_VERSION),
        String::new(),
        String::new(),
    ]
    .join(CRLF)
}
