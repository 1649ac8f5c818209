//! Client metrics definitions
//!
//! # Metrics Collected
//!
//! - **channel_state**: current channel state (gauge, see [`state_code`])
//! - **requests_total**: calls issued, by method and status (counter)
//! - **request_duration**: call latency in seconds (histogram)
//! - **errors_total**: failures by kind (counter)
//! - **connect_attempts**: connect attempts by outcome (counter)
//!
//! Recorded only when the client was built with
//! `ClientBuilder::with_metrics()`.

use crate::connection_state::ChannelState;
use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Histogram, Meter},
    KeyValue,
};

const METER_NAME: &str = "notifier.client";

/// Numeric encoding of a channel state for the `channel_state` gauge
pub fn state_code(state: ChannelState) -> i64 {
    match state {
        ChannelState::Idle => 0,
        ChannelState::Connecting => 1,
        ChannelState::Ready => 2,
        ChannelState::Calling => 3,
        ChannelState::Failed => 4,
    }
}

pub struct ClientMetrics {
    pub channel_state: Gauge<i64>,
    pub requests_total: Counter<u64>,
    pub request_duration: Histogram<f64>,
    pub errors_total: Counter<u64>,
    pub connect_attempts: Counter<u64>,
}

impl ClientMetrics {
    pub fn new() -> Self {
        Self::new_with_meter(&global::meter(METER_NAME))
    }

    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            channel_state: meter
                .i64_gauge("notifier.client.channel.state")
                .with_description(
                    "Channel state (0=idle, 1=connecting, 2=ready, 3=calling, 4=failed)",
                )
                .build(),
            requests_total: meter
                .u64_counter("notifier.client.requests.total")
                .with_description("Total number of calls issued")
                .build(),
            request_duration: meter
                .f64_histogram("notifier.client.request.duration")
                .with_description("Call duration in seconds")
                .with_unit("s")
                .build(),
            errors_total: meter
                .u64_counter("notifier.client.errors.total")
                .with_description("Total number of failed calls by kind")
                .build(),
            connect_attempts: meter
                .u64_counter("notifier.client.connect.attempts")
                .with_description("Connect attempts by outcome")
                .build(),
        }
    }

    pub fn update_channel_state(&self, state: ChannelState) {
        self.channel_state.record(state_code(state), &[]);
    }

    pub fn record_request(&self, method: &str, status: &str, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("method", method.to_string()),
            KeyValue::new("status", status.to_string()),
        ];
        self.requests_total.add(1, attributes);
        self.request_duration.record(duration_secs, attributes);
    }

    pub fn record_error(&self, error_type: &str) {
        let attributes = &[KeyValue::new("error_type", error_type.to_string())];
        self.errors_total.add(1, attributes);
    }

    pub fn record_connect(&self, outcome: &str) {
        self.connect_attempts
            .add(1, &[KeyValue::new("outcome", outcome.to_string())]);
    }
}

impl Default for ClientMetrics {
    fn default() -> Self {
        Self::new()
    }
}
