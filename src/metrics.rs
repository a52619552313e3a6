//! Prometheus metrics for the poll loop and its two HTTP services.
//!
//! Metrics are recorded through the `metrics` facade and are no-ops unless
//! an exporter is installed with [`install_exporter`].

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use tracing::{debug, info};

// === Metric Name Constants ===

/// Poll cycles counter metric name.
pub const METRIC_CYCLES: &str = "hopper_cycles_total";
/// Failed cycles counter metric name.
pub const METRIC_CYCLE_FAILURES: &str = "hopper_cycle_failures_total";
/// Hopper level gauge metric name.
pub const METRIC_HOPPER_KG: &str = "hopper_level_kg";
/// Hopper fill percentage gauge metric name.
pub const METRIC_HOPPER_PERCENT: &str = "hopper_level_percent";
/// Controller data fetch latency metric name.
pub const METRIC_FETCH_LATENCY: &str = "stoker_fetch_latency_ms";
/// Logins counter metric name.
pub const METRIC_LOGINS: &str = "stoker_logins_total";
/// Token renewals counter metric name.
pub const METRIC_TOKEN_RENEWALS: &str = "stoker_token_renewals_total";
/// Alerts sent counter metric name.
pub const METRIC_ALERTS_SENT: &str = "hopper_alerts_sent_total";
/// Alerts failed counter metric name.
pub const METRIC_ALERTS_FAILED: &str = "hopper_alerts_failed_total";
/// Alerts suppressed counter metric name.
pub const METRIC_ALERTS_SUPPRESSED: &str = "hopper_alerts_suppressed_total";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    describe_counter!(METRIC_CYCLES, "Total number of poll cycles run");
    describe_counter!(
        METRIC_CYCLE_FAILURES,
        "Total number of poll cycles that failed, by step"
    );
    describe_gauge!(METRIC_HOPPER_KG, "Last hopper reading in kilograms");
    describe_gauge!(METRIC_HOPPER_PERCENT, "Last hopper reading as percent of capacity");
    describe_histogram!(
        METRIC_FETCH_LATENCY,
        "Controller data request latency in milliseconds"
    );
    describe_counter!(METRIC_LOGINS, "Total number of successful StokerCloud logins");
    describe_counter!(
        METRIC_TOKEN_RENEWALS,
        "Total number of logins caused by a rejected token"
    );
    describe_counter!(METRIC_ALERTS_SENT, "Total number of alerts delivered");
    describe_counter!(METRIC_ALERTS_FAILED, "Total number of alerts that failed to send");
    describe_counter!(
        METRIC_ALERTS_SUPPRESSED,
        "Total number of alerts skipped by the throttle"
    );

    debug!("Metrics initialized");
}

/// Install the Prometheus exporter with an HTTP listener on `port`.
///
/// Must be called from within a tokio runtime.
pub fn install_exporter(port: u16) -> Result<(), BuildError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    info!(%addr, "Prometheus exporter listening");
    Ok(())
}

/// Increment the cycle counter.
pub fn inc_cycles() {
    counter!(METRIC_CYCLES).increment(1);
}

/// Increment the failed cycle counter for a step.
pub fn inc_cycle_failures(step: &'static str) {
    counter!(METRIC_CYCLE_FAILURES, "step" => step).increment(1);
}

/// Record the latest reading.
pub fn set_hopper_level(kg: f64, percent: Option<f64>) {
    gauge!(METRIC_HOPPER_KG).set(kg);
    if let Some(percent) = percent {
        gauge!(METRIC_HOPPER_PERCENT).set(percent);
    }
}

/// Record controller data fetch latency.
pub fn record_fetch_latency(start: Instant) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_FETCH_LATENCY).record(latency_ms);
}

/// Increment the login counter.
pub fn inc_logins() {
    counter!(METRIC_LOGINS).increment(1);
}

/// Increment the token renewal counter.
pub fn inc_token_renewals() {
    counter!(METRIC_TOKEN_RENEWALS).increment(1);
}

/// Increment the alerts sent counter.
pub fn inc_alerts_sent() {
    counter!(METRIC_ALERTS_SENT).increment(1);
}

/// Increment the alerts failed counter.
pub fn inc_alerts_failed() {
    counter!(METRIC_ALERTS_FAILED).increment(1);
}

/// Increment the alerts suppressed counter.
pub fn inc_alerts_suppressed() {
    counter!(METRIC_ALERTS_SUPPRESSED).increment(1);
}
