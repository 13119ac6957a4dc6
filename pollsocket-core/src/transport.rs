//! Transport layer abstraction
//!
//! The event loop works on anything that is a readable, writable file
//! descriptor. A [`SecurityContext`] turns each accepted TCP stream into such
//! a transport, which is where an externally configured TLS layer plugs in.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::os::fd::AsFd;
use std::os::unix::net::UnixStream;

/// Byte stream owned by one connection
pub trait TransportStream: Read + Write + AsFd + fmt::Debug {
    /// Stable identifier of the remote end
    fn peer_id(&self) -> String;

    /// Switch the stream between blocking and non-blocking mode
    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()>;

    /// Shut down the write half so the peer sees end-of-stream
    fn shutdown(&self) -> io::Result<()>;
}

impl TransportStream for TcpStream {
    fn peer_id(&self) -> String {
        match self.peer_addr() {
            Ok(addr) => addr.to_string(),
            Err(_) => "unknown".to_string(),
        }
    }

    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        TcpStream::set_nonblocking(self, nonblocking)
    }

    fn shutdown(&self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Write)
    }
}

impl TransportStream for UnixStream {
    fn peer_id(&self) -> String {
        match self.peer_addr() {
            Ok(addr) => match addr.as_pathname() {
                Some(path) => path.display().to_string(),
                None => "unix:unnamed".to_string(),
            },
            Err(_) => "unknown".to_string(),
        }
    }

    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        UnixStream::set_nonblocking(self, nonblocking)
    }

    fn shutdown(&self) -> io::Result<()> {
        UnixStream::shutdown(self, Shutdown::Write)
    }
}

/// Opaque transport/security context applied to every accepted connection
pub trait SecurityContext: fmt::Debug {
    /// Wrap a freshly accepted stream
    fn wrap(&self, stream: TcpStream) -> io::Result<Box<dyn TransportStream>>;
}

/// Context that passes plain TCP streams through unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainContext;

impl SecurityContext for PlainContext {
    fn wrap(&self, stream: TcpStream) -> io::Result<Box<dyn TransportStream>> {
        Ok(Box::new(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_plain_context_keeps_peer_address() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (accepted, _) = listener.accept().unwrap();

        let stream = PlainContext.wrap(accepted).unwrap();
        assert_eq!(stream.peer_id(), client.local_addr().unwrap().to_string());
    }

    #[test]
    fn test_unix_pair_round_trip() {
        let (mut a, mut b) = UnixStream::pair().unwrap();
        a.write_all(b"ping").unwrap();
        TransportStream::shutdown(&a).unwrap();

        let mut received = Vec::new();
        b.read_to_end(&mut received).unwrap();
        assert_eq!(received, b"ping");
        assert_eq!(b.peer_id(), "unix:unnamed");
    }
}
