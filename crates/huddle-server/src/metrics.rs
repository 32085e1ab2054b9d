//! Metrics collection and export for Huddle.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use huddle_core::RouterStats;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

/// Metric names.
pub mod names {
    pub const CONNECTIONS_TOTAL: &str = "huddle_connections_total";
    pub const CONNECTIONS_ACTIVE: &str = "huddle_connections_active";
    pub const EVENTS_TOTAL: &str = "huddle_events_total";
    pub const FRAMES_TOTAL: &str = "huddle_frames_total";
    pub const FRAME_BYTES: &str = "huddle_frame_bytes";
    pub const PARTICIPANTS_ACTIVE: &str = "huddle_participants_active";
    pub const ROOMS_ACTIVE: &str = "huddle_rooms_active";
    pub const EVENT_LATENCY_SECONDS: &str = "huddle_event_latency_seconds";
    pub const ERRORS_TOTAL: &str = "huddle_errors_total";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(
        names::CONNECTIONS_TOTAL,
        "Total number of connections since server start"
    );
    metrics::describe_gauge!(
        names::CONNECTIONS_ACTIVE,
        "Current number of active connections"
    );
    metrics::describe_counter!(names::EVENTS_TOTAL, "Client events handled, by event name");
    metrics::describe_counter!(names::FRAMES_TOTAL, "WebSocket frames, by direction");
    metrics::describe_counter!(names::FRAME_BYTES, "Bytes of outbound frames");
    metrics::describe_gauge!(
        names::PARTICIPANTS_ACTIVE,
        "Connections that have entered a room"
    );
    metrics::describe_gauge!(names::ROOMS_ACTIVE, "Current number of occupied rooms");
    metrics::describe_histogram!(
        names::EVENT_LATENCY_SECONDS,
        "Client event handling latency in seconds"
    );
    metrics::describe_counter!(names::ERRORS_TOTAL, "Total number of errors");

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record a new connection.
pub fn record_connection() {
    counter!(names::CONNECTIONS_TOTAL).increment(1);
    gauge!(names::CONNECTIONS_ACTIVE).increment(1.0);
}

/// Record a disconnection.
pub fn record_disconnection() {
    gauge!(names::CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record an inbound client event.
pub fn record_event(event: &'static str) {
    counter!(names::FRAMES_TOTAL, "direction" => "inbound").increment(1);
    counter!(names::EVENTS_TOTAL, "event" => event).increment(1);
}

/// Record an outbound frame.
pub fn record_outbound(bytes: usize) {
    counter!(names::FRAMES_TOTAL, "direction" => "outbound").increment(1);
    counter!(names::FRAME_BYTES, "direction" => "outbound").increment(bytes as u64);
}

/// Record event handling latency.
pub fn record_latency(seconds: f64) {
    histogram!(names::EVENT_LATENCY_SECONDS).record(seconds);
}

/// Update presence gauges.
pub fn set_presence(stats: RouterStats) {
    gauge!(names::PARTICIPANTS_ACTIVE).set(stats.participant_count as f64);
    gauge!(names::ROOMS_ACTIVE).set(stats.room_count as f64);
}

/// Record an error.
pub fn record_error(error_type: &'static str) {
    counter!(names::ERRORS_TOTAL, "type" => error_type).increment(1);
}

/// Metrics guard that records disconnection on drop.
pub struct ConnectionMetricsGuard;

impl ConnectionMetricsGuard {
    /// Create a new metrics guard, recording a connection.
    #[must_use]
    pub fn new() -> Self {
        record_connection();
        Self
    }
}

impl Default for ConnectionMetricsGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectionMetricsGuard {
    fn drop(&mut self) {
        record_disconnection();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_guard() {
        // No recorder is installed; recording must still be harmless.
        let _guard = ConnectionMetricsGuard::new();
        record_event("message");
        record_outbound(42);
        set_presence(RouterStats {
            participant_count: 2,
            room_count: 1,
        });
    }
}
