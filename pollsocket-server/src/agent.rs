//! Per-connection state
//!
//! An [`Agent`] exists from the moment a handshake succeeds until its
//! connection is freed. It owns the socket, the request metadata captured
//! during the upgrade, the reassembly buffer for inbound frames and the
//! queue of outbound bytes that the socket has not accepted yet.

use crate::error::{ServerError, ServerResult, TransportError};
use bytes::{Buf, Bytes, BytesMut};
use pollsocket_core::error::FrameError;
use pollsocket_core::protocol::constants::{MAX_CONTROL_PAYLOAD, READ_CHUNK_SIZE};
use pollsocket_core::{CloseCode, Frame, FrameParser, HandshakeRequest, Opcode, TransportStream};
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, BorrowedFd};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepted, waiting for a complete upgrade request
    Handshaking,
    /// Upgrade completed, frames flow in both directions
    Open,
    /// Terminal; the connection is freed at the end of the loop iteration
    Closed,
}

/// Why a connection left the `Open` state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer sent a CLOSE frame
    Peer,
    /// The application closed the connection
    Local,
    /// A protocol or transport failure
    Failure,
    /// The server is shutting down
    Shutdown,
}

/// Live WebSocket connection
pub struct Agent {
    key: usize,
    id: String,
    stream: Box<dyn TransportStream>,
    request: HandshakeRequest,
    parser: FrameParser,
    outbound: BytesMut,
    state: ConnectionState,
    reason: Option<CloseReason>,
    failure: Option<ServerError>,
    sent: Vec<(Opcode, Bytes)>,
    write_interest: bool,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("key", &self.key)
            .field("id", &self.id)
            .field("uri", &self.request.uri)
            .field("state", &self.state)
            .field("buffered", &self.parser.buffered_bytes())
            .field("outbound", &self.outbound.len())
            .field("stream", &"<stream>")
            .finish()
    }
}

impl Agent {
    /// Wrap an upgraded, non-blocking stream
    ///
    /// `leftover` holds bytes that arrived after the request head and
    /// already belong to the frame stream.
    pub(crate) fn new(
        key: usize,
        stream: Box<dyn TransportStream>,
        request: HandshakeRequest,
        leftover: &[u8],
        max_frame_size: usize,
    ) -> Self {
        let mut parser = FrameParser::for_client_frames(max_frame_size);
        parser.extend(leftover);

        Self {
            key,
            id: stream.peer_id(),
            stream,
            request,
            parser,
            outbound: BytesMut::new(),
            state: ConnectionState::Open,
            reason: None,
            failure: None,
            sent: Vec::new(),
            write_interest: false,
        }
    }

    /// Registry key of this connection
    pub fn key(&self) -> usize {
        self.key
    }

    /// Peer address the connection was accepted from
    pub fn id(&self) -> &str {
        &self.id
    }

    /// HTTP method of the upgrade request
    pub fn verb(&self) -> &str {
        self.request.verb.as_deref().unwrap_or_default()
    }

    /// Request URI of the upgrade request
    pub fn uri(&self) -> &str {
        self.request.uri.as_deref().unwrap_or_default()
    }

    /// Upgrade request headers, keyed by normalised name
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.request.headers
    }

    /// Look up one upgrade request header, in any letter case
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.header(name)
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether frames can still be exchanged
    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Why the connection closed, once it has
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.reason
    }

    /// Bytes of an incomplete inbound frame
    pub fn buffered_bytes(&self) -> usize {
        self.parser.buffered_bytes()
    }

    /// Bytes queued for the socket
    pub fn pending_output(&self) -> usize {
        self.outbound.len()
    }

    /// Frame `payload` with `opcode` and write it to the peer
    ///
    /// Whatever the socket does not take immediately stays queued and is
    /// written once the socket reports writability. A write failure frees
    /// the connection. Frames other than PONG and CLOSE are reported to the
    /// "send" callback.
    pub fn send(&mut self, opcode: Opcode, payload: impl Into<Bytes>) -> ServerResult<()> {
        if !self.is_open() {
            return Err(ServerError::Closed);
        }

        let payload = payload.into();
        if opcode.is_control() && payload.len() as u64 > MAX_CONTROL_PAYLOAD {
            return Err(ServerError::Protocol(
                FrameError::ControlFrameTooLarge(payload.len() as u64).into(),
            ));
        }

        Frame::new(opcode, payload.clone()).write_to(&mut self.outbound);
        self.flush()?;

        crate::log_trace!("sent {:?} frame ({} bytes) to {}", opcode, payload.len(), self.id);
        if !matches!(opcode, Opcode::Pong | Opcode::Close) {
            self.sent.push((opcode, payload));
        }
        Ok(())
    }

    /// Send a text frame
    pub fn send_text(&mut self, text: &str) -> ServerResult<()> {
        self.send(Opcode::Text, Bytes::copy_from_slice(text.as_bytes()))
    }

    /// Send a binary frame
    pub fn send_binary(&mut self, data: impl Into<Bytes>) -> ServerResult<()> {
        self.send(Opcode::Binary, data)
    }

    /// Send a CLOSE frame and free the connection
    pub fn close(&mut self, code: CloseCode) -> ServerResult<()> {
        if !self.is_open() {
            return Err(ServerError::Closed);
        }

        let result = self.send(Opcode::Close, Frame::close(Some(code.code()), None).payload);
        self.mark_closed(CloseReason::Local);
        result
    }

    /// Read what the transport has and decode one frame
    ///
    /// Returns `Ok(None)` while the buffered bytes do not form a complete
    /// frame; they are kept for the next call. A read failure or a malformed
    /// frame frees the connection.
    pub(crate) fn fetch(&mut self) -> ServerResult<Option<Frame>> {
        if !self.is_open() {
            return Err(ServerError::Closed);
        }

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        match self.stream.read(&mut chunk) {
            Ok(0) => return Err(self.fail(TransportError::Eof.into())),
            Ok(n) => self.parser.extend(&chunk[..n]),
            Err(e) if would_block(&e) => {}
            Err(e) => return Err(self.fail(TransportError::Read(e).into())),
        }

        self.next_frame()
    }

    /// Decode the next frame from bytes already buffered
    pub(crate) fn next_frame(&mut self) -> ServerResult<Option<Frame>> {
        if !self.is_open() {
            return Err(ServerError::Closed);
        }

        match self.parser.next_frame() {
            Ok(frame) => Ok(frame),
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// Answer a CLOSE frame from the peer and mark the connection closed
    pub(crate) fn acknowledge_close(&mut self, payload: &[u8]) {
        let code = CloseCode::from_payload(payload);
        crate::log_debug!("{} sent CLOSE ({:?})", self.id, code);

        let reply = match code {
            Some(code) if !code.is_reserved() => Frame::close(Some(code.code()), None).payload,
            _ => Bytes::new(),
        };
        let _ = self.send(Opcode::Close, reply);
        self.mark_closed(CloseReason::Peer);
    }

    /// Say goodbye during server shutdown
    pub(crate) fn shut_down(&mut self) {
        if self.is_open() {
            let _ = self.send(
                Opcode::Close,
                Frame::close(Some(CloseCode::Away.code()), None).payload,
            );
        }
        self.mark_closed(CloseReason::Shutdown);
    }

    /// Write queued bytes until the socket stops accepting them
    pub(crate) fn flush(&mut self) -> ServerResult<()> {
        while !self.outbound.is_empty() {
            match self.stream.write(&self.outbound) {
                Ok(0) => {
                    let e = io::Error::from(io::ErrorKind::WriteZero);
                    return Err(self.fail(TransportError::Write(e).into()));
                }
                Ok(n) => self.outbound.advance(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(self.fail(TransportError::Write(e).into())),
            }
        }

        match self.stream.flush() {
            Err(e) if !would_block(&e) => Err(self.fail(TransportError::Write(e).into())),
            _ => Ok(()),
        }
    }

    /// Report a change in write interest, if there is one
    pub(crate) fn write_interest_change(&mut self) -> Option<bool> {
        let wanted = self.is_open() && !self.outbound.is_empty();
        if wanted == self.write_interest {
            return None;
        }
        self.write_interest = wanted;
        Some(wanted)
    }

    /// Drain the frames written since the last call
    pub(crate) fn take_sent(&mut self) -> Vec<(Opcode, Bytes)> {
        std::mem::take(&mut self.sent)
    }

    /// The failure that closed the connection, if any
    pub(crate) fn take_failure(&mut self) -> Option<ServerError> {
        self.failure.take()
    }

    pub(crate) fn fd(&self) -> BorrowedFd<'_> {
        self.stream.as_fd()
    }

    /// Last-chance flush, then shut down the write half
    pub(crate) fn release_transport(&mut self) {
        if !self.outbound.is_empty() && self.failure.is_none() {
            let _ = self.flush();
        }
        let _ = self.stream.shutdown();
    }

    pub(crate) fn mark_closed(&mut self, reason: CloseReason) {
        if self.state != ConnectionState::Closed {
            self.state = ConnectionState::Closed;
            self.reason = Some(reason);
        }
    }

    /// Record `error` as the cause of closing and hand a copy back
    fn fail(&mut self, error: ServerError) -> ServerError {
        self.mark_closed(CloseReason::Failure);
        let copy = error.replicate();
        if self.failure.is_none() {
            self.failure = Some(error);
        }
        copy
    }
}

fn would_block(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}
