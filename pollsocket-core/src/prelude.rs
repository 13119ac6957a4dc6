//! Prelude module for PollSocket Core
//!
//! This module re-exports commonly used types and traits to make them
//! easily accessible for users of the library.

pub use crate::error::{CloseCode, Error, Result};
pub use crate::frame::{Frame, FrameParser, MaskPolicy};
pub use crate::handshake::{HandshakeRequest, Negotiation};
pub use crate::protocol::Opcode;
pub use crate::transport::{PlainContext, SecurityContext, TransportStream};

// Re-export commonly used external dependencies
pub use bytes::{Bytes, BytesMut};
