// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade; without an installed recorder every call is
//! a no-op.

use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Register all Parley metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!("parley_turns_total", "Inbound turns answered, by response modality");
    describe_counter!(
        "parley_turn_failures_total",
        "Turns answered with the fallback apology, by cause"
    );
    describe_counter!(
        "parley_memory_writes_total",
        "Memory extraction outcomes (stored or duplicate)"
    );
    describe_counter!("parley_call_events_total", "Telephony webhook events, by kind");
    describe_gauge!("parley_active_calls", "Outbound calls awaiting resolution");
    describe_histogram!(
        "parley_turn_latency_seconds",
        "Wall-clock time of one inbound turn in seconds"
    );
}

pub fn record_turn(modality: &str) {
    metrics::counter!("parley_turns_total", "modality" => modality.to_string()).increment(1);
}

/// Record a turn that ended in the apology; `reason` is e.g. `timeout` or `lock`.
pub fn record_turn_failure(reason: &str) {
    metrics::counter!("parley_turn_failures_total", "reason" => reason.to_string()).increment(1);
}

pub fn record_memory_write(outcome: &str) {
    metrics::counter!("parley_memory_writes_total", "outcome" => outcome.to_string())
        .increment(1);
}

pub fn record_call_event(event: &str) {
    metrics::counter!("parley_call_events_total", "event" => event.to_string()).increment(1);
}

/// Set the number of live call correlations.
pub fn set_active_calls(count: usize) {
    metrics::gauge!("parley_active_calls").set(count as f64);
}

pub fn record_turn_latency(seconds: f64) {
    metrics::histogram!("parley_turn_latency_seconds").record(seconds);
}

#[cfg(test)]
mod tests {
    use metrics_exporter_prometheus::PrometheusBuilder;

    use super::*;

    #[test]
    fn helpers_record_under_local_recorder() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            register_metrics();
            record_turn_failure("timeout");
            record_memory_write("duplicate");
            set_active_calls(3);
            record_turn_latency(0.25);
        });
        let text = handle.render();
        assert!(text.contains("parley_turn_failures_total{reason=\"timeout\"} 1"), "{text}");
        assert!(text.contains("parley_memory_writes_total{outcome=\"duplicate\"} 1"), "{text}");
        assert!(text.contains("parley_active_calls 3"), "{text}");
        assert!(text.contains("parley_turn_latency_seconds"), "{text}");
    }

    #[test]
    fn helpers_without_recorder_are_noops() {
        record_turn("text");
        set_active_calls(0);
    }
}
