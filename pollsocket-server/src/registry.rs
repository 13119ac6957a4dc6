//! Connection registry
//!
//! Every socket the loop watches, apart from the listener, has exactly one
//! slot here. Adding a slot registers its descriptor with the poller and
//! removing it deletes the registration, so the two can never disagree.

use crate::agent::{Agent, ConnectionState};
use crate::upgrade::PendingHandshake;
use bytes::BytesMut;
use polling::{Event, PollMode, Poller};
use pollsocket_core::{HandshakeRequest, TransportStream};
use std::collections::BTreeMap;
use std::io;
use std::os::fd::{AsRawFd, BorrowedFd};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Poller key of the listening socket
pub(crate) const LISTENER_KEY: usize = 0;

/// One watched connection
#[derive(Debug)]
pub(crate) enum Slot {
    Handshaking(PendingHandshake),
    Open(Agent),
}

impl Slot {
    fn fd(&self) -> BorrowedFd<'_> {
        match self {
            Slot::Handshaking(pending) => pending.fd(),
            Slot::Open(agent) => agent.fd(),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        match self {
            Slot::Handshaking(_) => ConnectionState::Handshaking,
            Slot::Open(agent) => agent.state(),
        }
    }
}

/// Registered connections, keyed by their poller key
#[derive(Debug)]
pub struct ConnectionTable {
    poller: Arc<Poller>,
    slots: BTreeMap<usize, Slot>,
    next_key: usize,
}

impl ConnectionTable {
    pub(crate) fn new(poller: Arc<Poller>) -> Self {
        Self {
            poller,
            slots: BTreeMap::new(),
            next_key: LISTENER_KEY + 1,
        }
    }

    /// Number of slots, pending handshakes included
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no connection is registered
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of upgraded connections
    pub fn agent_count(&self) -> usize {
        self.agents().count()
    }

    /// Upgraded connections, in accept order
    pub fn agents(&self) -> impl Iterator<Item = &Agent> + '_ {
        self.slots.values().filter_map(|slot| match slot {
            Slot::Open(agent) => Some(agent),
            Slot::Handshaking(_) => None,
        })
    }

    /// Upgraded connections, mutably
    pub fn agents_mut(&mut self) -> impl Iterator<Item = &mut Agent> + '_ {
        self.slots.values_mut().filter_map(|slot| match slot {
            Slot::Open(agent) => Some(agent),
            Slot::Handshaking(_) => None,
        })
    }

    /// Agent registered under `key`
    pub fn agent(&self, key: usize) -> Option<&Agent> {
        match self.slots.get(&key) {
            Some(Slot::Open(agent)) => Some(agent),
            _ => None,
        }
    }

    /// Agent registered under `key`, mutably
    pub fn agent_mut(&mut self, key: usize) -> Option<&mut Agent> {
        match self.slots.get_mut(&key) {
            Some(Slot::Open(agent)) => Some(agent),
            _ => None,
        }
    }

    pub(crate) fn state(&self, key: usize) -> Option<ConnectionState> {
        self.slots.get(&key).map(Slot::state)
    }

    pub(crate) fn pending_mut(&mut self, key: usize) -> Option<&mut PendingHandshake> {
        match self.slots.get_mut(&key) {
            Some(Slot::Handshaking(pending)) => Some(pending),
            _ => None,
        }
    }

    pub(crate) fn keys(&self) -> Vec<usize> {
        self.slots.keys().copied().collect()
    }

    /// Register a freshly accepted stream as a pending handshake
    pub(crate) fn register_pending(&mut self, stream: Box<dyn TransportStream>) -> io::Result<usize> {
        let pending = PendingHandshake::new(stream)?;
        let key = self.next_key;

        // SAFETY: the descriptor is owned by the slot inserted below, and
        // `unregister` deletes it from the poller before the slot is dropped.
        unsafe {
            self.poller.add_with_mode(
                pending.fd().as_raw_fd(),
                Event::readable(key),
                PollMode::Level,
            )?;
        }

        self.next_key += 1;
        self.slots.insert(key, Slot::Handshaking(pending));
        Ok(key)
    }

    /// Turn a pending handshake into an agent
    ///
    /// The descriptor keeps its registration; only the slot changes.
    pub(crate) fn promote(
        &mut self,
        key: usize,
        request: HandshakeRequest,
        leftover: BytesMut,
        max_frame_size: usize,
    ) -> Option<&mut Agent> {
        let pending = match self.slots.remove(&key)? {
            Slot::Handshaking(pending) => pending,
            open => {
                self.slots.insert(key, open);
                return None;
            }
        };

        let agent = Agent::new(key, pending.into_stream(), request, &leftover, max_frame_size);
        self.slots.insert(key, Slot::Open(agent));
        self.agent_mut(key)
    }

    /// Remove a slot and its poller registration
    pub(crate) fn unregister(&mut self, key: usize) -> Option<Slot> {
        let slot = self.slots.remove(&key)?;
        if let Err(e) = self.poller.delete(slot.fd()) {
            crate::log_warn!("failed to unregister connection {}: {}", key, e);
        }
        Some(slot)
    }

    /// Keys of agents that are closed and waiting to be freed
    pub(crate) fn closed_keys(&self) -> Vec<usize> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.state() == ConnectionState::Closed)
            .map(|(key, _)| *key)
            .collect()
    }

    /// Watch for writability only while an agent has queued output
    pub(crate) fn sync_write_interest(&mut self) {
        for (key, slot) in self.slots.iter_mut() {
            let Slot::Open(agent) = slot else { continue };
            let Some(writable) = agent.write_interest_change() else {
                continue;
            };

            let interest = if writable {
                Event::all(*key)
            } else {
                Event::readable(*key)
            };
            if let Err(e) = self
                .poller
                .modify_with_mode(agent.fd(), interest, PollMode::Level)
            {
                crate::log_warn!("failed to update interest for {}: {}", agent.id(), e);
            }
        }
    }

    /// Earliest instant at which a pending handshake expires
    pub(crate) fn next_expiry(&self, timeout: Duration) -> Option<Instant> {
        self.slots
            .values()
            .filter_map(|slot| match slot {
                Slot::Handshaking(pending) => Some(pending.expires_at(timeout)),
                Slot::Open(_) => None,
            })
            .min()
    }

    /// Keys of pending handshakes that have run out of time
    pub(crate) fn expired_keys(&self, now: Instant, timeout: Duration) -> Vec<usize> {
        self.slots
            .iter()
            .filter(|(_, slot)| {
                matches!(slot, Slot::Handshaking(pending) if pending.expires_at(timeout) <= now)
            })
            .map(|(key, _)| *key)
            .collect()
    }
}

impl Drop for ConnectionTable {
    fn drop(&mut self) {
        for slot in self.slots.values() {
            let _ = self.poller.delete(slot.fd());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pollsocket_core::handshake::parse_request;
    use pollsocket_core::protocol::constants::DEFAULT_MAX_FRAME_SIZE;
    use std::io::Write;
    use std::os::unix::net::UnixStream;

    fn table() -> ConnectionTable {
        ConnectionTable::new(Arc::new(Poller::new().unwrap()))
    }

    fn request() -> HandshakeRequest {
        parse_request(b"GET /room HTTP/1.1\r\nSec-WebSocket-Key: abc\r\n\r\n").unwrap()
    }

    #[test]
    fn test_keys_start_after_listener() {
        let mut table = table();
        let (a, _pa) = UnixStream::pair().unwrap();
        let (b, _pb) = UnixStream::pair().unwrap();

        let first = table.register_pending(Box::new(a)).unwrap();
        let second = table.register_pending(Box::new(b)).unwrap();
        assert_eq!(first, LISTENER_KEY + 1);
        assert_eq!(second, first + 1);
        assert_eq!(table.len(), 2);
        assert_eq!(table.agent_count(), 0);
        assert_eq!(table.state(first), Some(ConnectionState::Handshaking));
    }

    #[test]
    fn test_promote_and_unregister() {
        let mut table = table();
        let (stream, _peer) = UnixStream::pair().unwrap();
        let key = table.register_pending(Box::new(stream)).unwrap();

        let agent = table
            .promote(key, request(), BytesMut::new(), DEFAULT_MAX_FRAME_SIZE)
            .unwrap();
        assert_eq!(agent.uri(), "/room");
        assert_eq!(table.state(key), Some(ConnectionState::Open));
        assert!(table.promote(key, request(), BytesMut::new(), 16).is_none());
        assert!(table.agent(key).is_some());

        assert!(matches!(table.unregister(key), Some(Slot::Open(_))));
        assert!(table.unregister(key).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_closed_keys() {
        let mut table = table();
        let (a, _pa) = UnixStream::pair().unwrap();
        let (b, _pb) = UnixStream::pair().unwrap();
        let first = table.register_pending(Box::new(a)).unwrap();
        let second = table.register_pending(Box::new(b)).unwrap();
        table.promote(first, request(), BytesMut::new(), 1024);
        table.promote(second, request(), BytesMut::new(), 1024);

        table.agent_mut(second).unwrap().mark_closed(crate::agent::CloseReason::Local);
        assert_eq!(table.closed_keys(), vec![second]);
    }

    #[test]
    fn test_expired_handshakes() {
        let mut table = table();
        let (stream, _peer) = UnixStream::pair().unwrap();
        let key = table.register_pending(Box::new(stream)).unwrap();

        let timeout = Duration::from_secs(10);
        assert!(table.expired_keys(Instant::now(), timeout).is_empty());
        assert!(table.next_expiry(timeout).is_some());
        assert_eq!(
            table.expired_keys(Instant::now() + timeout, timeout),
            vec![key]
        );
    }

    #[test]
    fn test_readable_registration_fires() {
        let poller = Arc::new(Poller::new().unwrap());
        let mut table = ConnectionTable::new(Arc::clone(&poller));
        let (stream, mut peer) = UnixStream::pair().unwrap();
        let key = table.register_pending(Box::new(stream)).unwrap();

        peer.write_all(b"GET").unwrap();
        let mut events = polling::Events::new();
        poller
            .wait(&mut events, Some(Duration::from_secs(1)))
            .unwrap();
        assert!(events.iter().any(|ev| ev.key == key && ev.readable));
    }
}
