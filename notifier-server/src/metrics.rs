//! Server metrics definitions
//!
//! OpenTelemetry instruments recorded by the accept loop, the connection
//! tasks and the drain procedure. They are exported only when
//! observability was initialised with an OTLP endpoint; otherwise the
//! global no-op meter makes recording free.
//!
//! # Metrics Collected
//!
//! - **connections_active**: open WebSocket connections (gauge)
//! - **connections_total**: connections accepted since start (counter)
//! - **requests_total**: calls answered, by method and status (counter)
//! - **request_duration**: handler latency in seconds (histogram)
//! - **calls_in_flight**: calls currently executing (gauge)
//! - **drain_calls**: calls observed during a drain, by outcome (counter)
//! - **errors_total**: protocol and transport errors, by type (counter)
//!
//! # Examples
//!
//! ```rust,no_run
//! use notifier_server::ServerMetrics;
//!
//! let metrics = ServerMetrics::new();
//! metrics.record_request("NotificationService.run", "success", 0.002);
//! ```

use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Histogram, Meter},
    KeyValue,
};

const METER_NAME: &str = "notifier.server";

/// Server metrics instruments, all named `notifier.server.*`
pub struct ServerMetrics {
    pub connections_active: Gauge<i64>,
    pub connections_total: Counter<u64>,
    pub requests_total: Counter<u64>,
    pub request_duration: Histogram<f64>,
    pub calls_in_flight: Gauge<i64>,
    pub drain_calls: Counter<u64>,
    pub errors_total: Counter<u64>,
}

impl ServerMetrics {
    /// Create instruments on the global meter provider
    pub fn new() -> Self {
        Self::new_with_meter(&global::meter(METER_NAME))
    }

    /// Create instruments on a specific meter
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            connections_active: meter
                .i64_gauge("notifier.server.connections.active")
                .with_description("Number of open WebSocket connections")
                .build(),
            connections_total: meter
                .u64_counter("notifier.server.connections.total")
                .with_description("Total number of connections accepted")
                .build(),
            requests_total: meter
                .u64_counter("notifier.server.requests.total")
                .with_description("Total number of calls answered")
                .build(),
            request_duration: meter
                .f64_histogram("notifier.server.request.duration")
                .with_description("Handler execution time in seconds")
                .with_unit("s")
                .build(),
            calls_in_flight: meter
                .i64_gauge("notifier.server.calls.in_flight")
                .with_description("Number of calls currently executing")
                .build(),
            drain_calls: meter
                .u64_counter("notifier.server.drain.calls")
                .with_description("Calls finished during a drain, by outcome")
                .build(),
            errors_total: meter
                .u64_counter("notifier.server.errors.total")
                .with_description("Total number of protocol and transport errors")
                .build(),
        }
    }

    pub fn record_connection(&self, active: i64) {
        self.connections_active.record(active, &[]);
        self.connections_total.add(1, &[]);
    }

    pub fn record_disconnection(&self, active: i64) {
        self.connections_active.record(active, &[]);
    }

    /// Record an answered call; `status` is `success`, `error` or `cancelled`
    pub fn record_request(&self, method: &str, status: &str, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("method", method.to_string()),
            KeyValue::new("status", status.to_string()),
        ];
        self.requests_total.add(1, attributes);
        self.request_duration.record(duration_secs, attributes);
    }

    pub fn record_in_flight(&self, count: usize) {
        self.calls_in_flight.record(count as i64, &[]);
    }

    /// Record the outcome of a drain
    pub fn record_drain(&self, completed: usize, abandoned: usize) {
        self.drain_calls
            .add(completed as u64, &[KeyValue::new("outcome", "completed")]);
        self.drain_calls
            .add(abandoned as u64, &[KeyValue::new("outcome", "abandoned")]);
    }

    pub fn record_error(&self, error_type: &str) {
        let attributes = &[KeyValue::new("error_type", error_type.to_string())];
        self.errors_total.add(1, attributes);
    }
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording_without_provider() {
        let metrics = ServerMetrics::new();

        metrics.record_connection(1);
        metrics.record_request("NotificationService.run", "success", 0.01);
        metrics.record_request("NotificationService.run", "cancelled", 5.0);
        metrics.record_in_flight(3);
        metrics.record_drain(2, 1);
        metrics.record_error("parse_error");
        metrics.record_disconnection(0);
    }
}
