//! First-run setup subsystem.
//!
//! # Data Flow
//! ```text
//! POST /finalize
//!     → payload.rs (decode + validate)
//!     → orchestrator.rs
//!         → runtime.rs (version precondition)
//!         → dirs.rs (data directories)
//!         → snapshot.rs + secrets.rs (configuration sections, session secret)
//!         → certs.rs (key pair sealed with the session secret)
//!         → store::ConfigStore (persist sections)
//!         → seed.rs (default records)
//!     → lifecycle::handoff (stop setup listener, boot main server)
//! ```
//!
//! # Design Decisions
//! - No step runs before every precondition has passed
//! - No rollback: retries rely on replace-by-natural-key seed writes
//! - One finalize at a time; later submissions fail fast

pub mod certs;
pub mod dirs;
pub mod orchestrator;
pub mod payload;
pub mod runtime;
pub mod secrets;
pub mod seed;
pub mod snapshot;

pub use orchestrator::{Collaborators, FinalizeOrchestrator, FinalizeOutcome};
pub use payload::{AdminPassword, SetupPayload};
pub use runtime::{HostRuntime, RuntimeProbe};
pub use secrets::SessionSecret;
