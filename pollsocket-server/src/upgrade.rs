//! Non-blocking upgrade handshake
//!
//! An accepted socket lives here until its request head is complete. Bytes
//! are read as the socket becomes readable, so a slow client never stalls
//! the loop.

use crate::error::{ServerError, ServerResult, TransportError};
use bytes::BytesMut;
use pollsocket_core::error::ProtocolError;
use pollsocket_core::handshake::{find_head_end, parse_request};
use pollsocket_core::protocol::constants::MAX_HANDSHAKE_SIZE;
use pollsocket_core::{HandshakeRequest, TransportStream};
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, BorrowedFd};
use std::time::{Duration, Instant};

const CHUNK: usize = 8192;

/// Outcome of reading from a pending handshake
#[derive(Debug)]
pub(crate) enum Progress {
    /// The request head is not complete yet
    Pending,
    /// The head parsed; `leftover` already belongs to the frame stream
    Complete {
        request: HandshakeRequest,
        leftover: BytesMut,
    },
}

/// Accepted socket that has not completed its upgrade
#[derive(Debug)]
pub(crate) struct PendingHandshake {
    stream: Box<dyn TransportStream>,
    buffer: BytesMut,
    accepted_at: Instant,
    peer: String,
}

impl PendingHandshake {
    pub(crate) fn new(stream: Box<dyn TransportStream>) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        let peer = stream.peer_id();
        Ok(Self {
            stream,
            buffer: BytesMut::with_capacity(CHUNK),
            accepted_at: Instant::now(),
            peer,
        })
    }

    pub(crate) fn peer(&self) -> &str {
        &self.peer
    }

    pub(crate) fn fd(&self) -> BorrowedFd<'_> {
        self.stream.as_fd()
    }

    /// Instant after which the handshake is abandoned
    pub(crate) fn expires_at(&self, timeout: Duration) -> Instant {
        self.accepted_at + timeout
    }

    /// Read what is available and try to parse the request head
    pub(crate) fn poll(&mut self) -> ServerResult<Progress> {
        let mut chunk = [0u8; CHUNK];

        while find_head_end(&self.buffer).is_none() {
            let room = MAX_HANDSHAKE_SIZE - self.buffer.len();
            if room == 0 {
                return Err(ServerError::Protocol(
                    ProtocolError::RequestTooLarge {
                        size: self.buffer.len(),
                        max: MAX_HANDSHAKE_SIZE,
                    }
                    .into(),
                ));
            }

            match self.stream.read(&mut chunk[..room.min(CHUNK)]) {
                Ok(0) => {
                    return Err(ServerError::Protocol(
                        ProtocolError::Truncated(self.buffer.len()).into(),
                    ))
                }
                Ok(n) => self.buffer.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(Progress::Pending),
                Err(e) => return Err(TransportError::Read(e).into()),
            }
        }

        let Some(end) = find_head_end(&self.buffer) else {
            return Ok(Progress::Pending);
        };
        let head = self.buffer.split_to(end);
        let request = parse_request(&head)?;

        Ok(Progress::Complete {
            request,
            leftover: self.buffer.split(),
        })
    }

    /// Write an HTTP response in full
    ///
    /// Responses are small and the socket is fresh, so a send buffer that
    /// cannot take them is treated as a failure.
    pub(crate) fn respond(&mut self, response: &str) -> io::Result<()> {
        self.stream.write_all(response.as_bytes())?;
        self.stream.flush()
    }

    pub(crate) fn into_stream(self) -> Box<dyn TransportStream> {
        self.stream
    }
}
