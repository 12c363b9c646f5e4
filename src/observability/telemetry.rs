//! Usage telemetry.
//!
//! # Metrics
//! - `setup_telemetry_events_total` (counter): events by category, action
//! - `setup_unhandled_errors_total` (counter): 404/500 responses and panics

use uuid::Uuid;

/// Receives usage events and unhandled errors.
pub trait TelemetrySink: Send + Sync {
    fn send_event(&self, category: &str, action: &str);
    fn send_error(&self, message: &str);
}

/// Default sink: `metrics` counters plus a debug log line.
#[derive(Debug, Clone)]
pub struct MetricsTelemetry {
    client_id: Uuid,
}

impl MetricsTelemetry {
    pub fn new(client_id: Uuid) -> Self {
        Self { client_id }
    }
}

impl TelemetrySink for MetricsTelemetry {
    fn send_event(&self, category: &str, action: &str) {
        metrics::counter!(
            "setup_telemetry_events_total",
            "category" => category.to_string(),
            "action" => action.to_string()
        )
        .increment(1);
        tracing::debug!(client_id = %self.client_id, category, action, "Telemetry event");
    }

    fn send_error(&self, message: &str) {
        metrics::counter!("setup_unhandled_errors_total").increment(1);
        tracing::debug!(client_id = %self.client_id, message, "Telemetry error");
    }
}
