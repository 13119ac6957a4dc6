//! Application event callbacks
//!
//! One optional slot per event. Callbacks run synchronously on the loop
//! thread, so they carry no `Send` bound and must not block.

use crate::agent::Agent;
use crate::error::ServerError;
use crate::server::ServerState;
use bytes::Bytes;
use pollsocket_core::Opcode;
use std::fmt;

/// Callback receiving the server state (`start`, `stop`)
pub type ServerCallback = Box<dyn FnMut(&mut ServerState)>;
/// Callback receiving one agent (`connect`, `idle`)
pub type AgentCallback = Box<dyn FnMut(&mut Agent)>;
/// Callback receiving a frame (`receive`, `send`)
pub type FrameCallback = Box<dyn FnMut(&mut Agent, Opcode, &Bytes)>;
/// Callback receiving an agent that has already been unregistered
pub type DisconnectCallback = Box<dyn FnMut(&Agent)>;
/// Callback receiving a reported failure
pub type ErrorCallback = Box<dyn FnMut(&ServerState, &ServerError)>;

/// The events an application can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// The listener is bound and the loop is about to start
    Start,
    /// The loop ended and every connection has been freed
    Stop,
    /// A handshake completed and an agent was created
    Connect,
    /// An agent was freed
    Disconnect,
    /// A text, binary or continuation frame arrived
    Receive,
    /// An application frame was written
    Send,
    /// A full poll interval elapsed
    Idle,
    /// A transport or setup failure occurred
    Error,
}

impl Event {
    /// Event name as used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Event::Start => "start",
            Event::Stop => "stop",
            Event::Connect => "connect",
            Event::Disconnect => "disconnect",
            Event::Receive => "receive",
            Event::Send => "send",
            Event::Idle => "idle",
            Event::Error => "error",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Table of registered callbacks
#[derive(Default)]
pub struct Events {
    start: Option<ServerCallback>,
    stop: Option<ServerCallback>,
    connect: Option<AgentCallback>,
    disconnect: Option<DisconnectCallback>,
    receive: Option<FrameCallback>,
    send: Option<FrameCallback>,
    idle: Option<AgentCallback>,
    error: Option<ErrorCallback>,
}

impl fmt::Debug for Events {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registered: Vec<&str> = [
            Event::Start,
            Event::Stop,
            Event::Connect,
            Event::Disconnect,
            Event::Receive,
            Event::Send,
            Event::Idle,
            Event::Error,
        ]
        .into_iter()
        .filter(|event| self.is_registered(*event))
        .map(|event| event.name())
        .collect();

        f.debug_struct("Events")
            .field("registered", &registered)
            .finish()
    }
}

impl Events {
    /// Whether a callback is registered for `event`
    pub fn is_registered(&self, event: Event) -> bool {
        match event {
            Event::Start => self.start.is_some(),
            Event::Stop => self.stop.is_some(),
            Event::Connect => self.connect.is_some(),
            Event::Disconnect => self.disconnect.is_some(),
            Event::Receive => self.receive.is_some(),
            Event::Send => self.send.is_some(),
            Event::Idle => self.idle.is_some(),
            Event::Error => self.error.is_some(),
        }
    }

    pub(crate) fn set_start(&mut self, callback: ServerCallback) {
        self.start = Some(callback);
    }

    pub(crate) fn set_stop(&mut self, callback: ServerCallback) {
        self.stop = Some(callback);
    }

    pub(crate) fn set_connect(&mut self, callback: AgentCallback) {
        self.connect = Some(callback);
    }

    pub(crate) fn set_disconnect(&mut self, callback: DisconnectCallback) {
        self.disconnect = Some(callback);
    }

    pub(crate) fn set_receive(&mut self, callback: FrameCallback) {
        self.receive = Some(callback);
    }

    pub(crate) fn set_send(&mut self, callback: FrameCallback) {
        self.send = Some(callback);
    }

    pub(crate) fn set_idle(&mut self, callback: AgentCallback) {
        self.idle = Some(callback);
    }

    pub(crate) fn set_error(&mut self, callback: ErrorCallback) {
        self.error = Some(callback);
    }

    pub(crate) fn start(&mut self, state: &mut ServerState) {
        if let Some(callback) = self.start.as_mut() {
            callback(state);
        }
    }

    pub(crate) fn stop(&mut self, state: &mut ServerState) {
        if let Some(callback) = self.stop.as_mut() {
            callback(state);
        }
    }

    pub(crate) fn connect(&mut self, agent: &mut Agent) {
        if let Some(callback) = self.connect.as_mut() {
            callback(agent);
        }
    }

    pub(crate) fn disconnect(&mut self, agent: &Agent) {
        if let Some(callback) = self.disconnect.as_mut() {
            callback(agent);
        }
    }

    pub(crate) fn receive(&mut self, agent: &mut Agent, opcode: Opcode, payload: &Bytes) {
        if let Some(callback) = self.receive.as_mut() {
            callback(agent, opcode, payload);
        }
    }

    pub(crate) fn send(&mut self, agent: &mut Agent, opcode: Opcode, payload: &Bytes) {
        if let Some(callback) = self.send.as_mut() {
            callback(agent, opcode, payload);
        }
    }

    pub(crate) fn idle(&mut self, agent: &mut Agent) {
        if let Some(callback) = self.idle.as_mut() {
            callback(agent);
        }
    }

    pub(crate) fn error(&mut self, state: &ServerState, error: &ServerError) {
        if let Some(callback) = self.error.as_mut() {
            callback(state, error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_registration_overwrites() {
        let hits = Rc::new(Cell::new(0));
        let mut events = Events::default();
        assert!(!events.is_registered(Event::Idle));

        let first = Rc::clone(&hits);
        events.set_idle(Box::new(move |_| first.set(first.get() + 1)));
        let second = Rc::clone(&hits);
        events.set_idle(Box::new(move |_| second.set(second.get() + 10)));

        assert!(events.is_registered(Event::Idle));
        assert_eq!(format!("{:?}", events), "Events { registered: [\"idle\"] }");

        let (mut agent, _peer) = crate::agent::tests::agent_pair();
        events.idle(&mut agent);
        assert_eq!(hits.get(), 10);
    }

    #[test]
    fn test_unregistered_event_is_noop() {
        let (mut agent, _peer) = crate::agent::tests::agent_pair();
        let mut events = Events::default();
        events.connect(&mut agent);
        events.receive(&mut agent, Opcode::Text, &Bytes::from_static(b"x"));
        events.disconnect(&agent);
    }

    #[test]
    fn test_event_names() {
        assert_eq!(Event::Disconnect.to_string(), "disconnect");
        assert_eq!(Event::Receive.name(), "receive");
    }
}
