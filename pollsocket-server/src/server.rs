//! WebSocket server implementation
//!
//! One thread, one readiness wait per iteration. The listener and every
//! connection are registered with a level-triggered [`Poller`]; a socket is
//! read or written only after the poller reports it ready.
//!
//! Each iteration ends with a maintenance pass that reports queued "send"
//! notifications, frees closed connections, adjusts write interest and drops
//! handshakes that ran out of time. Agents never free themselves: they only
//! mark themselves closed, and the maintenance pass is the single place where
//! a connection is unregistered and "disconnect" is fired.

use crate::agent::{Agent, CloseReason, ConnectionState};
use crate::config::{interval_from_secs, ServerConfig};
use crate::error::{ServerError, ServerResult, SetupError, TransportError};
use crate::events::{Event, Events};
use crate::registry::{ConnectionTable, Slot, LISTENER_KEY};
use crate::shutdown::{self, ShutdownToken};
use crate::upgrade::Progress;
use crate::{log_debug, log_error, log_info, log_trace, log_warn};
use bytes::{Bytes, BytesMut};
use polling::{Events as Readiness, PollMode, Poller};
use pollsocket_core::handshake::{negotiate, Negotiation};
use pollsocket_core::{Frame, HandshakeRequest, Opcode, PlainContext, SecurityContext};
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::fd::AsRawFd;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Server-side state visible to callbacks
///
/// Held separately from the callback table so that a callback can borrow
/// the state while the table is borrowed to invoke it.
pub struct ServerState {
    config: ServerConfig,
    poller: Arc<Poller>,
    listener: Option<TcpListener>,
    local_addr: Option<SocketAddr>,
    connections: ConnectionTable,
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("config", &self.config)
            .field("local_addr", &self.local_addr)
            .field("connections", &self.connections.len())
            .finish()
    }
}

impl ServerState {
    /// Active configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Address the listener is bound to, while the server runs
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Open agents, optionally only those whose request URI equals `uri`
    pub fn agents<'a>(&'a self, uri: Option<&'a str>) -> impl Iterator<Item = &'a Agent> + 'a {
        self.connections
            .agents()
            .filter(move |agent| agent.is_open() && uri.map_or(true, |uri| agent.uri() == uri))
    }

    /// Open agents, mutably; see [`ServerState::agents`]
    pub fn agents_mut<'a>(
        &'a mut self,
        uri: Option<&'a str>,
    ) -> impl Iterator<Item = &'a mut Agent> + 'a {
        self.connections
            .agents_mut()
            .filter(move |agent| agent.is_open() && uri.map_or(true, |uri| agent.uri() == uri))
    }

    /// Agent registered under `key`
    pub fn agent(&self, key: usize) -> Option<&Agent> {
        self.connections.agent(key)
    }

    /// Agent registered under `key`, mutably
    pub fn agent_mut(&mut self, key: usize) -> Option<&mut Agent> {
        self.connections.agent_mut(key)
    }

    /// Registered connections, pending handshakes included
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    fn open_listener(&mut self) -> ServerResult<()> {
        let address = self.config.bind_address.clone();
        let listener = TcpListener::bind(&address).map_err(|source| SetupError::Bind {
            address: address.clone(),
            source,
        })?;
        listener
            .set_nonblocking(true)
            .map_err(SetupError::Listener)?;
        let local_addr = listener.local_addr().map_err(SetupError::Listener)?;

        // SAFETY: the listener is stored below and `close_listener` deletes it
        // from the poller before dropping it.
        unsafe {
            self.poller
                .add_with_mode(
                    listener.as_raw_fd(),
                    polling::Event::readable(LISTENER_KEY),
                    PollMode::Level,
                )
                .map_err(SetupError::Poll)?;
        }

        self.listener = Some(listener);
        self.local_addr = Some(local_addr);
        Ok(())
    }

    fn close_listener(&mut self) {
        if let Some(listener) = self.listener.take() {
            if let Err(e) = self.poller.delete(&listener) {
                log_warn!("failed to unregister listener: {}", e);
            }
        }
        self.local_addr = None;
    }
}

/// WebSocket server
pub struct Server {
    state: ServerState,
    events: Events,
    context: Box<dyn SecurityContext>,
    shutdown: ShutdownToken,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("state", &self.state)
            .field("events", &self.events)
            .field("context", &self.context)
            .finish()
    }
}

impl Server {
    /// Create a server with a plain TCP transport
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        Self::with_context(config, Box::new(PlainContext), ShutdownToken::new())
    }

    /// Create a server builder
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    fn with_context(
        config: ServerConfig,
        context: Box<dyn SecurityContext>,
        shutdown: ShutdownToken,
    ) -> ServerResult<Self> {
        config.validate()?;
        let poller = Arc::new(Poller::new().map_err(SetupError::Poll)?);

        Ok(Self {
            state: ServerState {
                config,
                poller: Arc::clone(&poller),
                listener: None,
                local_addr: None,
                connections: ConnectionTable::new(poller),
            },
            events: Events::default(),
            context,
            shutdown,
        })
    }

    /// Server state, for inspection outside callbacks
    pub fn state(&self) -> &ServerState {
        &self.state
    }

    /// Token that stops [`Server::run`] when cancelled
    pub fn shutdown_token(&self) -> ShutdownToken {
        self.shutdown.clone()
    }

    /// Whether a callback is registered for `event`
    pub fn is_registered(&self, event: Event) -> bool {
        self.events.is_registered(event)
    }

    /// Called once the listener is bound
    pub fn on_start<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnMut(&mut ServerState) + 'static,
    {
        self.events.set_start(Box::new(callback));
        self
    }

    /// Called after every connection has been freed on shutdown
    pub fn on_stop<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnMut(&mut ServerState) + 'static,
    {
        self.events.set_stop(Box::new(callback));
        self
    }

    /// Called when a handshake completes
    pub fn on_connect<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnMut(&mut Agent) + 'static,
    {
        self.events.set_connect(Box::new(callback));
        self
    }

    /// Called exactly once per agent, after it has been unregistered
    pub fn on_disconnect<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnMut(&Agent) + 'static,
    {
        self.events.set_disconnect(Box::new(callback));
        self
    }

    /// Called for every text, binary or continuation frame
    pub fn on_receive<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnMut(&mut Agent, Opcode, &Bytes) + 'static,
    {
        self.events.set_receive(Box::new(callback));
        self
    }

    /// Called for every frame written other than PONG and CLOSE
    pub fn on_send<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnMut(&mut Agent, Opcode, &Bytes) + 'static,
    {
        self.events.set_send(Box::new(callback));
        self
    }

    /// Called for each open agent when a poll interval passes
    pub fn on_idle<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnMut(&mut Agent) + 'static,
    {
        self.events.set_idle(Box::new(callback));
        self
    }

    /// Called for transport and setup failures
    pub fn on_error<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnMut(&ServerState, &ServerError) + 'static,
    {
        self.events.set_error(Box::new(callback));
        self
    }

    /// Bind, serve until shutdown, then free everything
    ///
    /// Returns `Ok(())` after a requested shutdown and the fatal error when
    /// binding or the readiness wait fails. Either way every connection is
    /// freed and "stop" has run by the time this returns, unless setup
    /// itself failed.
    ///
    /// With signal handling enabled, SIGINT and SIGTERM are captured once per
    /// shutdown token and stay captured after `run` returns: a later signal
    /// only cancels the token and no longer ends the process. The token is
    /// reset after "stop", so the server can be run again.
    pub fn run(&mut self) -> ServerResult<()> {
        if let Err(err) = self.state.open_listener() {
            return Err(self.fatal(err));
        }

        if self.state.config.handle_signals {
            if let Err(e) = shutdown::listen_for_signals(&self.shutdown) {
                self.state.close_listener();
                return Err(self.fatal(SetupError::Signals(e).into()));
            }
        }
        self.shutdown.attach(Arc::clone(&self.state.poller));

        log_info!(
            "listening on {}",
            self.state
                .local_addr
                .map_or_else(|| self.state.config.bind_address.clone(), |a| a.to_string())
        );
        self.events.start(&mut self.state);
        self.maintain();

        let result = self.event_loop();
        if let Err(ref err) = result {
            log_error!("event loop failed: {}", err);
            self.events.error(&self.state, err);
        }

        self.teardown();
        result
    }

    fn fatal(&mut self, err: ServerError) -> ServerError {
        log_error!("{}", err);
        self.events.error(&self.state, &err);
        err
    }

    fn event_loop(&mut self) -> ServerResult<()> {
        let interval = self.state.config.poll_interval;
        let handshake_timeout = self.state.config.handshake_timeout;
        let mut readiness = Readiness::new();
        let mut deadline = Instant::now() + interval;

        while !self.shutdown.is_cancelled() {
            let now = Instant::now();
            let mut timeout = deadline.saturating_duration_since(now);
            if let Some(expiry) = self.state.connections.next_expiry(handshake_timeout) {
                timeout = timeout.min(expiry.saturating_duration_since(now));
            }

            readiness.clear();
            match self.state.poller.wait(&mut readiness, Some(timeout)) {
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if !timeout.is_zero() => return Err(SetupError::Poll(e).into()),
                Err(e) => log_warn!("readiness wait failed: {}", e),
            }

            let ready: Vec<(usize, bool, bool)> = readiness
                .iter()
                .map(|ev| (ev.key, ev.readable, ev.writable))
                .collect();
            for (key, readable, writable) in ready {
                self.handle_ready(key, readable, writable);
            }
            self.maintain();

            let now = Instant::now();
            if now >= deadline {
                self.idle();
                deadline = now + interval;
            }
        }

        Ok(())
    }

    fn handle_ready(&mut self, key: usize, readable: bool, writable: bool) {
        if key == LISTENER_KEY {
            self.accept_connections();
            return;
        }

        match self.state.connections.state(key) {
            Some(ConnectionState::Handshaking) => self.advance_handshake(key),
            Some(ConnectionState::Open) => {
                if writable {
                    if let Some(agent) = self.state.connections.agent_mut(key) {
                        let _ = agent.flush();
                    }
                }
                if readable {
                    self.receive(key);
                }
            }
            _ => {}
        }
    }

    fn accept_connections(&mut self) {
        loop {
            let Some(listener) = self.state.listener.as_ref() else {
                return;
            };
            match listener.accept() {
                Ok((stream, addr)) => self.admit(stream, addr),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    let err = ServerError::from(TransportError::Accept(e));
                    log_warn!("{}", err);
                    self.events.error(&self.state, &err);
                    return;
                }
            }
        }
    }

    fn admit(&mut self, stream: TcpStream, addr: SocketAddr) {
        if self.state.connections.len() >= self.state.config.max_connections {
            log_warn!(
                "connection limit ({}) reached, dropping {}",
                self.state.config.max_connections,
                addr
            );
            return;
        }

        let stream = match self.context.wrap(stream) {
            Ok(stream) => stream,
            Err(e) => {
                let err = ServerError::from(TransportError::Accept(e));
                log_warn!("failed to wrap connection from {}: {}", addr, err);
                self.events.error(&self.state, &err);
                return;
            }
        };

        match self.state.connections.register_pending(stream) {
            Ok(key) => log_debug!("accepted {} as connection {}", addr, key),
            Err(e) => log_warn!("failed to register connection from {}: {}", addr, e),
        }
    }

    fn advance_handshake(&mut self, key: usize) {
        let Some(pending) = self.state.connections.pending_mut(key) else {
            return;
        };

        match pending.poll() {
            Ok(Progress::Pending) => {}
            Ok(Progress::Complete { request, leftover }) => {
                self.complete_handshake(key, request, leftover)
            }
            Err(err) => {
                log_debug!("dropping handshake from {}: {}", pending.peer(), err);
                if err.is_reported() {
                    self.events.error(&self.state, &err);
                }
                self.state.connections.unregister(key);
            }
        }
    }

    fn complete_handshake(&mut self, key: usize, request: HandshakeRequest, leftover: BytesMut) {
        let Some(pending) = self.state.connections.pending_mut(key) else {
            return;
        };

        match negotiate(&request) {
            Negotiation::Reject(response) => {
                if let Some(response) = response {
                    let _ = pending.respond(&response);
                }
                log_info!("rejected non-WebSocket request from {}", pending.peer());
                self.state.connections.unregister(key);
            }
            Negotiation::Upgrade(response) => {
                if let Err(e) = pending.respond(&response) {
                    log_warn!("failed to complete handshake with {}: {}", pending.peer(), e);
                    self.state.connections.unregister(key);
                    return;
                }

                let max_frame_size = self.state.config.max_frame_size;
                let Some(agent) =
                    self.state
                        .connections
                        .promote(key, request, leftover, max_frame_size)
                else {
                    return;
                };
                log_info!("{} connected to {}", agent.id(), agent.uri());
                self.events.connect(agent);
                self.drain_frames(key);
            }
        }
    }

    /// Read once, then dispatch every complete frame that is buffered
    fn receive(&mut self, key: usize) {
        let next = match self.state.connections.agent_mut(key) {
            Some(agent) if agent.is_open() => agent.fetch(),
            _ => return,
        };
        if let Ok(Some(frame)) = next {
            self.dispatch(key, frame);
            self.drain_frames(key);
        }
    }

    fn drain_frames(&mut self, key: usize) {
        loop {
            let next = match self.state.connections.agent_mut(key) {
                Some(agent) if agent.is_open() => agent.next_frame(),
                _ => return,
            };
            match next {
                Ok(Some(frame)) => self.dispatch(key, frame),
                Ok(None) | Err(_) => return,
            }
        }
    }

    fn dispatch(&mut self, key: usize, frame: Frame) {
        let Some(agent) = self.state.connections.agent_mut(key) else {
            return;
        };
        log_trace!(
            "{} sent {:?} frame ({} bytes)",
            agent.id(),
            frame.opcode,
            frame.payload_len()
        );

        match frame.opcode {
            Opcode::Ping => {
                let _ = agent.send(Opcode::Pong, frame.payload);
            }
            Opcode::Pong => {}
            Opcode::Close => agent.acknowledge_close(&frame.payload),
            Opcode::Text => {
                let payload = trim_trailing_whitespace(frame.payload);
                self.events.receive(agent, Opcode::Text, &payload);
            }
            Opcode::Binary | Opcode::Continuation => {
                self.events.receive(agent, frame.opcode, &frame.payload);
            }
        }
    }

    fn idle(&mut self) {
        log_debug!(
            "poll interval elapsed, {} open connections",
            self.state.agents(None).count()
        );
        for key in self.state.connections.keys() {
            if let Some(agent) = self.state.connections.agent_mut(key) {
                if agent.is_open() {
                    self.events.idle(agent);
                }
            }
        }
        self.maintain();
    }

    fn maintain(&mut self) {
        for key in self.state.connections.keys() {
            if let Some(agent) = self.state.connections.agent_mut(key) {
                for (opcode, payload) in agent.take_sent() {
                    self.events.send(agent, opcode, &payload);
                }
            }
        }

        for key in self.state.connections.closed_keys() {
            self.free(key);
        }

        self.state.connections.sync_write_interest();

        let now = Instant::now();
        let timeout = self.state.config.handshake_timeout;
        for key in self.state.connections.expired_keys(now, timeout) {
            if let Some(Slot::Handshaking(pending)) = self.state.connections.unregister(key) {
                log_debug!("handshake from {} timed out", pending.peer());
            }
        }
    }

    /// Unregister one connection and fire its callbacks
    fn free(&mut self, key: usize) {
        let mut agent = match self.state.connections.unregister(key) {
            Some(Slot::Open(agent)) => agent,
            _ => return,
        };
        agent.release_transport();

        if let Some(err) = agent.take_failure() {
            if err.is_reported() {
                log_warn!("{}: {}", agent.id(), err);
                self.events.error(&self.state, &err);
            } else {
                log_debug!("{}: {}", agent.id(), err);
            }
        }

        log_info!(
            "{} disconnected ({:?})",
            agent.id(),
            agent.close_reason().unwrap_or(CloseReason::Failure)
        );
        self.events.disconnect(&agent);
    }

    fn teardown(&mut self) {
        log_info!(
            "shutting down, closing {} connections",
            self.state.connections.len()
        );

        for key in self.state.connections.keys() {
            match self.state.connections.agent_mut(key) {
                Some(agent) => {
                    agent.shut_down();
                    self.free(key);
                }
                None => {
                    self.state.connections.unregister(key);
                }
            }
        }

        self.state.close_listener();
        self.shutdown.detach();
        self.events.stop(&mut self.state);
        self.shutdown.reset();
    }
}

/// Bytes stripped from the end of a text payload
const TRAILING_WHITESPACE: &[u8] = b" \t\n\r\0\x0B";

/// Drop trailing whitespace, NUL and vertical tab from a text payload
fn trim_trailing_whitespace(payload: Bytes) -> Bytes {
    let end = payload
        .iter()
        .rposition(|b| !TRAILING_WHITESPACE.contains(b))
        .map_or(0, |pos| pos + 1);
    payload.slice(..end)
}

/// Server builder
#[derive(Debug)]
pub struct ServerBuilder {
    config: ServerConfig,
    context: Option<Box<dyn SecurityContext>>,
    shutdown: Option<ShutdownToken>,
}

impl ServerBuilder {
    /// Create a new server builder
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            context: None,
            shutdown: None,
        }
    }

    /// Listen on `address` (`host:port`)
    pub fn bind(mut self, address: impl Into<String>) -> Self {
        self.config.bind_address = address.into();
        self
    }

    /// Set the poll interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Set the poll interval in fractional seconds
    pub fn poll_interval_secs(mut self, secs: f64) -> ServerResult<Self> {
        self.config.poll_interval = interval_from_secs(secs)?;
        Ok(self)
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.config.max_connections = max;
        self
    }

    /// Set maximum frame size
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.config.max_frame_size = size;
        self
    }

    /// Set handshake timeout
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Install SIGINT/SIGTERM listeners when the server runs
    pub fn handle_signals(mut self, enabled: bool) -> Self {
        self.config.handle_signals = enabled;
        self
    }

    /// Wrap accepted streams with `context`
    pub fn security_context(mut self, context: impl SecurityContext + 'static) -> Self {
        self.context = Some(Box::new(context));
        self
    }

    /// Stop the server through an existing token
    pub fn shutdown_token(mut self, token: ShutdownToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the server
    pub fn build(self) -> ServerResult<Server> {
        Server::with_context(
            self.config,
            self.context.unwrap_or_else(|| Box::new(PlainContext)),
            self.shutdown.unwrap_or_default(),
        )
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_server_builder() {
        let server = ServerBuilder::new()
            .bind("127.0.0.1:0")
            .poll_interval(Duration::from_millis(250))
            .max_connections(8)
            .max_frame_size(4096)
            .handle_signals(false)
            .build()
            .unwrap();

        let config = server.state().config();
        assert_eq!(config.bind_address, "127.0.0.1:0");
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.max_connections, 8);
        assert_eq!(config.max_frame_size, 4096);
        assert!(!config.handle_signals);
        assert!(server.state().local_addr().is_none());
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        assert!(ServerBuilder::new().max_connections(0).build().is_err());
        assert!(ServerBuilder::new().poll_interval_secs(-2.0).is_err());
        let server = ServerBuilder::new().poll_interval_secs(1.5).unwrap().build().unwrap();
        assert_eq!(server.state().config().poll_interval, Duration::from_millis(1500));
    }

    #[test]
    fn test_callback_registration() {
        let mut server = Server::builder().handle_signals(false).build().unwrap();
        assert!(!server.is_registered(Event::Receive));

        server
            .on_receive(|agent, _, payload| {
                let _ = agent.send(Opcode::Text, payload.clone());
            })
            .on_idle(|_| {});
        assert!(server.is_registered(Event::Receive));
        assert!(server.is_registered(Event::Idle));
        assert!(!server.is_registered(Event::Stop));
    }

    #[test]
    fn test_bind_failure_reports_error() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = taken.local_addr().unwrap().to_string();

        let errors = Rc::new(Cell::new(0));
        let seen = Rc::clone(&errors);
        let mut server = Server::builder()
            .bind(address)
            .handle_signals(false)
            .build()
            .unwrap();
        server.on_error(move |_, err| {
            assert!(err.is_fatal());
            seen.set(seen.get() + 1);
        });

        let err = server.run().unwrap_err();
        assert!(matches!(err, ServerError::Setup(SetupError::Bind { .. })));
        assert_eq!(errors.get(), 1);
    }

    #[test]
    fn test_cancelled_token_stops_immediately() {
        let token = ShutdownToken::new();
        token.cancel();

        let stopped = Rc::new(Cell::new(false));
        let flag = Rc::clone(&stopped);
        let mut server = Server::builder()
            .bind("127.0.0.1:0")
            .handle_signals(false)
            .shutdown_token(token)
            .build()
            .unwrap();
        server
            .on_start(|state| assert!(state.local_addr().is_some()))
            .on_stop(move |state| {
                assert_eq!(state.connection_count(), 0);
                flag.set(true);
            });

        server.run().unwrap();
        assert!(stopped.get());
        assert!(server.state().local_addr().is_none());
    }

    #[test]
    fn test_server_runs_again_after_shutdown() {
        let token = ShutdownToken::new();
        let starts = Rc::new(Cell::new(0));
        let counted = Rc::clone(&starts);
        let canceller = token.clone();
        let mut server = Server::builder()
            .bind("127.0.0.1:0")
            .handle_signals(false)
            .shutdown_token(token.clone())
            .build()
            .unwrap();
        server.on_start(move |_| {
            counted.set(counted.get() + 1);
            canceller.cancel();
        });

        server.run().unwrap();
        assert!(!token.is_cancelled());
        server.run().unwrap();
        assert_eq!(starts.get(), 2);
    }

    #[cfg(feature = "signals")]
    #[test]
    fn test_bind_failure_installs_no_signal_handlers() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut server = Server::builder()
            .bind(taken.local_addr().unwrap().to_string())
            .handle_signals(true)
            .build()
            .unwrap();

        assert!(server.run().is_err());
        assert!(shutdown::listen_for_signals(&server.shutdown_token()).unwrap());
    }

    #[test]
    fn test_trim_trailing_whitespace() {
        assert_eq!(trim_trailing_whitespace(Bytes::from_static(b"hi \r\n\t")), "hi");
        assert_eq!(trim_trailing_whitespace(Bytes::from_static(b"  lead")), "  lead");
        assert_eq!(trim_trailing_whitespace(Bytes::from_static(b" \n")), "");
        assert_eq!(trim_trailing_whitespace(Bytes::new()), "");
        assert_eq!(trim_trailing_whitespace(Bytes::from_static(b"hi\0\x0B")), "hi");
        assert_eq!(trim_trailing_whitespace(Bytes::from_static(b"hi\x0C")), "hi\x0C");
    }
}
