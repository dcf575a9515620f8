//! Provider metrics

use crate::Result;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_gauge_vec, CounterVec,
    HistogramVec, IntGaugeVec,
};
use std::time::Duration;

lazy_static::lazy_static! {
    /// Outbound requests by outcome
    pub static ref PROVIDER_REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "pix_provider_requests_total",
        "Total outbound provider requests",
        &["provider", "operation", "outcome"]
    )
    .unwrap();

    /// Outbound request latency
    pub static ref PROVIDER_REQUEST_DURATION: HistogramVec = register_histogram_vec!(
        "pix_provider_request_duration_seconds",
        "Outbound provider request duration",
        &["provider", "operation"]
    )
    .unwrap();

    /// Last known health per provider
    pub static ref PROVIDER_HEALTHY: IntGaugeVec = register_int_gauge_vec!(
        "pix_provider_healthy",
        "Provider health (1=healthy, 0=unhealthy or unknown)",
        &["provider"]
    )
    .unwrap();
}

/// Record one outbound call. Outcome is `success` or the error code.
pub(crate) fn observe_request<T>(
    provider: &str,
    operation: &str,
    result: &Result<T>,
    elapsed: Duration,
) {
    let outcome = match result {
        Ok(_) => "success",
        Err(e) => e.code.as_str(),
    };

    PROVIDER_REQUEST_DURATION
        .with_label_values(&[provider, operation])
        .observe(elapsed.as_secs_f64());
    PROVIDER_REQUESTS_TOTAL
        .with_label_values(&[provider, operation, outcome])
        .inc();
}

/// Publish health of a provider
pub(crate) fn set_healthy(provider: &str, healthy: bool) {
    PROVIDER_HEALTHY
        .with_label_values(&[provider])
        .set(i64::from(healthy));
}
