//! # PollSocket Core
//!
//! Protocol building blocks for the PollSocket server.
//!
//! This crate holds everything that does not depend on the event loop:
//!
//! - Error handling and types
//! - WebSocket frame encoding and incremental decoding
//! - The HTTP upgrade handshake (parsing and negotiation)
//! - Protocol constants and the HTTP status-line table
//! - The transport seam used to plug in an external security context

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

// Core modules
pub mod error;
pub mod frame;
pub mod handshake;
pub mod protocol;
pub mod transport;

// Prelude module with common imports
pub mod prelude;

// Re-export key types for convenience
pub use error::{CloseCode, Error, Result};
pub use frame::{Frame, FrameParser, MaskPolicy};
pub use handshake::{HandshakeRequest, Negotiation};
pub use protocol::Opcode;
pub use transport::{PlainContext, SecurityContext, TransportStream};
