//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → owned by SetupContext, shared via Arc
//!
//! Admin-supplied values (legacy connection string):
//!     → value.rs ($(VAR) / $(VAR:default) substitution)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod value;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::{AppConfig, ListenerConfig, ObservabilityConfig, SetupConfig, SiteConfig};
pub use value::parse_config_value;
