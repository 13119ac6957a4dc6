//! PollSocket Server
//!
//! A single-threaded WebSocket server driven by one readiness wait per loop
//! iteration. Applications register typed callbacks and the loop calls them
//! as connections open, exchange frames, go idle and close.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pollsocket_server::prelude::*;
//!
//! fn main() -> ServerResult<()> {
//!     let mut server = Server::builder()
//!         .bind("0.0.0.0:8080")
//!         .poll_interval_secs(30.0)?
//!         .build()?;
//!
//!     server.on_receive(|agent, opcode, payload| {
//!         let _ = agent.send(opcode, payload.clone());
//!     });
//!
//!     server.run()
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

// Public modules
pub mod agent;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod registry;
pub mod server;
pub mod shutdown;

mod upgrade;

// Prelude module with common imports
pub mod prelude;

// Re-export key types for convenience
pub use agent::{Agent, CloseReason, ConnectionState};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult, SetupError, TransportError};
pub use events::Event;
pub use registry::ConnectionTable;
pub use server::{Server, ServerBuilder, ServerState};
pub use shutdown::{listen_for_signals, ShutdownToken};
