//! Metrics module for usage-billing-service.
//! Prometheus metrics for metering, quota decisions and provider mirroring.

use once_cell::sync::Lazy;
use prometheus::{
    histogram_opts, opts, register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec,
    IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;

/// Database query duration histogram
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        histogram_opts!(
            "usage_billing_db_query_duration_seconds",
            "Database query duration"
        ),
        &["operation"]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Usage records accepted, by metric and write path
pub static USAGE_RECORDS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Quota decisions by metric and outcome
pub static QUOTA_DECISIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Background usage writes by outcome
pub static USAGE_WRITES_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Billing provider mirror attempts by outcome
pub static PROVIDER_SYNC_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Usage cache lookups by result
pub static CACHE_LOOKUPS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Error counter for alerting
pub static ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize all metrics. Call once at startup.
pub fn init_metrics() {
    USAGE_RECORDS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "usage_billing_usage_records_total",
                "Total usage records by metric and write path"
            ),
            &["metric", "path"]
        )
        .expect("Failed to register USAGE_RECORDS_TOTAL")
    });

    QUOTA_DECISIONS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "usage_billing_quota_decisions_total",
                "Quota checks by metric and decision"
            ),
            &["metric", "decision"]
        )
        .expect("Failed to register QUOTA_DECISIONS_TOTAL")
    });

    USAGE_WRITES_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "usage_billing_usage_writes_total",
                "Queued usage writes by outcome"
            ),
            &["outcome"]
        )
        .expect("Failed to register USAGE_WRITES_TOTAL")
    });

    PROVIDER_SYNC_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "usage_billing_provider_sync_total",
                "Billing provider usage mirror attempts by outcome"
            ),
            &["outcome"]
        )
        .expect("Failed to register PROVIDER_SYNC_TOTAL")
    });

    CACHE_LOOKUPS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!("usage_billing_cache_lookups_total", "Usage cache lookups"),
            &["result"]
        )
        .expect("Failed to register CACHE_LOOKUPS_TOTAL")
    });

    ERRORS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "usage_billing_errors_total",
                "Total errors by type for alerting"
            ),
            &["error_type", "operation"]
        )
        .expect("Failed to register ERRORS_TOTAL")
    });

    // Force initialization of lazy statics
    let _ = &*DB_QUERY_DURATION;
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub fn record_usage_operation(metric: &str, path: &str) {
    if let Some(counter) = USAGE_RECORDS_TOTAL.get() {
        counter.with_label_values(&[metric, path]).inc();
    }
}

pub fn record_quota_decision(metric: &str, decision: &str) {
    if let Some(counter) = QUOTA_DECISIONS_TOTAL.get() {
        counter.with_label_values(&[metric, decision]).inc();
    }
}

pub fn record_usage_write(outcome: &str) {
    if let Some(counter) = USAGE_WRITES_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

pub fn record_provider_sync(outcome: &str) {
    if let Some(counter) = PROVIDER_SYNC_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

pub fn record_cache_lookup(result: &str) {
    if let Some(counter) = CACHE_LOOKUPS_TOTAL.get() {
        counter.with_label_values(&[result]).inc();
    }
}

/// Record an error for alerting.
pub fn record_error(error_type: &str, operation: &str) {
    if let Some(counter) = ERRORS_TOTAL.get() {
        counter.with_label_values(&[error_type, operation]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorded_counters_show_up_in_the_export() {
        init_metrics();
        record_quota_decision("renders_2d", "allowed");
        record_provider_sync("reported");

        let text = get_metrics();
        assert!(text.contains("usage_billing_quota_decisions_total"));
        assert!(text.contains("usage_billing_provider_sync_total"));
    }
}
