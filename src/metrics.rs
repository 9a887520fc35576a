//! Prometheus metrics for gatepass.
//!
//! Exposes a standard `/metrics` endpoint that Prometheus can scrape.
//! Metrics live in the global default registry and are registered lazily on
//! first use, so tests that build many engines never double-register.

use once_cell::sync::Lazy;
use prometheus::{opts, register_counter_vec, register_int_counter, CounterVec, Encoder, IntCounter, TextEncoder};

static TOKENS_ISSUED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "gatepass_tokens_issued_total",
        "Total number of tickets issued"
    ))
    .expect("failed to register gatepass_tokens_issued_total")
});

static SCANS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        opts!("gatepass_scans_total", "Ticket scans by outcome"),
        &["outcome"]
    )
    .expect("failed to register gatepass_scans_total")
});

static STORE_ERRORS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        opts!("gatepass_store_errors_total", "Store failures by operation"),
        &["op"]
    )
    .expect("failed to register gatepass_store_errors_total")
});

pub fn record_issued(n: usize) {
    TOKENS_ISSUED.inc_by(n as u64);
}

/// `outcome` is one of `ViewResult::outcome()`.
pub fn record_scan(outcome: &str) {
    SCANS.with_label_values(&[outcome]).inc();
}

pub fn record_store_error(op: &str) {
    STORE_ERRORS.with_label_values(&[op]).inc();
}

/// Encode all registered metrics as Prometheus text format.
/// Called by the `/metrics` HTTP handler.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap_or_default();
    String::from_utf8(buffer).unwrap_or_default()
}
