//! Prometheus Metrics Module
//!
//! Exposes feed metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Frames**: inbound frames, decode failures, outbound frames sent/queued
//! - **Dispatch**: price updates routed and handler failures
//! - **Subscriptions**: subscribed symbols and invalid subscription notices
//! - **Connection**: streamer connection state
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on `TICKER_MUX_METRICS_PORT`. With the
//! port set to 0 no recorder is installed and every call here is a no-op.

use std::net::SocketAddr;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::domain::streaming::DispatchReport;

// =============================================================================
// Initialization
// =============================================================================

/// Install the Prometheus recorder and HTTP listener.
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or a recorder is
/// already installed.
pub fn init_metrics(port: u16) -> Result<(), BuildError> {
    if port == 0 {
        tracing::info!("Metrics exporter disabled");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
        .install()?;

    register_metrics();
    tracing::info!(port, "Metrics exporter listening");
    Ok(())
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Frame counters
    describe_counter!(
        "ticker_mux_frames_received_total",
        "Total frames received from the streamer"
    );
    describe_counter!(
        "ticker_mux_decode_failures_total",
        "Total inbound frames that could not be decoded"
    );
    describe_counter!(
        "ticker_mux_frames_sent_total",
        "Total frames written to the streamer"
    );
    describe_counter!(
        "ticker_mux_send_failures_total",
        "Total outbound frames dropped by reason"
    );
    describe_gauge!(
        "ticker_mux_pending_frames",
        "Frames queued until the connection opens"
    );

    // Dispatch counters
    describe_counter!(
        "ticker_mux_updates_dispatched_total",
        "Total price updates routed to handlers"
    );
    describe_counter!(
        "ticker_mux_handler_failures_total",
        "Total price handler invocations that failed or panicked"
    );

    // Subscriptions
    describe_gauge!(
        "ticker_mux_subscribed_symbols",
        "Number of symbols with at least one handler"
    );
    describe_counter!(
        "ticker_mux_invalid_subscriptions_total",
        "Total invalid subscription notices from the streamer"
    );

    // Connection
    describe_gauge!(
        "ticker_mux_connection_open",
        "1 while the streamer connection is open"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a frame received from the streamer.
pub fn record_frame_received() {
    counter!("ticker_mux_frames_received_total").increment(1);
}

/// Record an inbound frame that failed to decode.
pub fn record_decode_failure() {
    counter!("ticker_mux_decode_failures_total").increment(1);
}

/// Record a frame written to the streamer.
pub fn record_frame_sent() {
    counter!("ticker_mux_frames_sent_total").increment(1);
}

/// Record an outbound frame that was dropped.
pub fn record_send_failure(reason: &'static str) {
    counter!("ticker_mux_send_failures_total", "reason" => reason).increment(1);
}

/// Update the pending frame count.
#[allow(clippy::cast_precision_loss)]
pub fn set_pending_frames(count: usize) {
    gauge!("ticker_mux_pending_frames").set(count as f64);
}

/// Record the outcome of routing one price update.
pub fn record_dispatch(report: &DispatchReport) {
    if report.is_empty() {
        return;
    }
    counter!("ticker_mux_updates_dispatched_total").increment(1);
    if report.failed > 0 {
        counter!("ticker_mux_handler_failures_total")
            .increment(u64::try_from(report.failed).unwrap_or(u64::MAX));
    }
}

/// Update the subscribed symbol count.
#[allow(clippy::cast_precision_loss)]
pub fn set_subscribed_symbols(count: usize) {
    gauge!("ticker_mux_subscribed_symbols").set(count as f64);
}

/// Record an invalid subscription notice.
pub fn record_invalid_subscription() {
    counter!("ticker_mux_invalid_subscriptions_total").increment(1);
}

/// Update the connection state gauge.
pub fn set_connection_open(open: bool) {
    gauge!("ticker_mux_connection_open").set(if open { 1.0 } else { 0.0 });
}

// =============================================================================
// Tests
// =============================================================================
