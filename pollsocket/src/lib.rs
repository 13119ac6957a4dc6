//! # PollSocket
//!
//! A single-threaded, readiness-driven RFC 6455 WebSocket server.
//!
//! One loop thread waits on every socket at once, completes upgrade
//! handshakes without blocking, decodes frames as they arrive and hands
//! them to typed application callbacks.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pollsocket::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::builder()
//!         .bind("0.0.0.0:8080")
//!         .max_connections(10_000)
//!         .build()?;
//!
//!     server
//!         .on_receive(|agent, opcode, payload| {
//!             let _ = agent.send(opcode, payload.clone());
//!         })
//!         .on_idle(|agent| {
//!             let _ = agent.close(CloseCode::Away);
//!         });
//!
//!     server.run()?;
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

// Re-export core components
pub use pollsocket_core::*;

#[cfg(feature = "server")]
pub use pollsocket_server as server;

#[cfg(feature = "server")]
pub use pollsocket_server::{Agent, Server, ServerBuilder, ServerConfig, ServerState, ShutdownToken};

/// Prelude module with common imports
pub mod prelude {
    pub use pollsocket_core::prelude::*;

    #[cfg(feature = "server")]
    pub use pollsocket_server::prelude::*;
}
