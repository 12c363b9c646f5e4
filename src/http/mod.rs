//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (lifecycle::server, ConnectInfo inserted per connection)
//!     → server.rs (request ID, tracing, panic guard; body limit inside finalize)
//!     → /finalize → setup::FinalizeOrchestrator
//!     → response.rs ({ok, ...} bodies, 404/500 bodies)
//!     → Send to client
//! ```

pub mod response;
pub mod server;

pub use response::{ErrorBody, FinalizeFailure, FinalizeSuccess};
pub use server::{setup_router, SetupState};
