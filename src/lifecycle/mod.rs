//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Context → Orchestrator → Setup router → Bind setup server
//!
//! Setup server (server.rs):
//!     Bind → Accept (register each connection) → Serve setup router
//!
//! Stop (server.rs + shutdown.rs):
//!     Shutdown fires → Stop accepting → Destroy open connections → Socket released
//!
//! Handoff (handoff.rs):
//!     Finalize succeeds → Response flushed → Stop → Settle delay → Boot main server
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Abandon setup, or shut the main server down
//! ```
//!
//! # Design Decisions
//! - Stop is forced, not a drain: idle keep-alive clients cannot hold it up
//! - Boot waits on stop completing, never on a timer alone

pub mod handoff;
pub mod server;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use handoff::{
    run_handoff, BootTarget, BoxError, HandoffError, HandoffReceiver, HandoffTiming, HandoffTrigger,
};
pub use server::{LifecycleError, ServerStatus, SetupServer};
pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
pub use startup::{start_setup, SetupStack};
