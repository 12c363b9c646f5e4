//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → telemetry.rs (usage events and unhandled errors)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → metrics recorder installed by the host, if any
//! ```

pub mod logging;
pub mod telemetry;

pub use telemetry::{MetricsTelemetry, TelemetrySink};
