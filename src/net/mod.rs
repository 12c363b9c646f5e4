//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (registry keyed by remote address + port)
//!     → Hand off to HTTP layer
//!
//! Connection States:
//!     Registered → Serving → Closed (by client, by hyper, or destroyed on stop)
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked so shutdown can destroy it

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionKey, ConnectionRegistry};
pub use listener::{ConnectionPermit, Listener, ListenerError};
