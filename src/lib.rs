//! First-run setup orchestrator library.

pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod kernel;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod setup;
pub mod store;

pub use config::AppConfig;
pub use context::SetupContext;
pub use error::{SetupError, SetupResult};
pub use kernel::MainServer;
pub use lifecycle::{start_setup, SetupServer, SetupStack, Shutdown};
pub use setup::{Collaborators, FinalizeOrchestrator};
