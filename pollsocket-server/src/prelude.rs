//! Prelude module with common imports
//!
//! This module re-exports the most commonly used types from the
//! pollsocket-server crate for ergonomic imports.

// Server types
pub use crate::agent::{Agent, CloseReason, ConnectionState};
pub use crate::config::ServerConfig;
pub use crate::error::{ServerError, ServerResult};
pub use crate::events::Event;
pub use crate::server::{Server, ServerBuilder, ServerState};
pub use crate::shutdown::ShutdownToken;

// Re-export core types
pub use pollsocket_core::prelude::*;
