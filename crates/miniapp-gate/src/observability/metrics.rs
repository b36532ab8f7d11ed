//! Metrics definitions for the gate.
//!
//! All metrics follow Prometheus naming conventions:
//! - `gate_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `method`: 7 values max
//! - `endpoint`: known routes plus `/other`
//! - `decision`: authenticated, anonymous, redirect, rejected
//! - `status`: bounded by verification outcomes
//! - `source`: body, header, query
//!
//! User ids and tokens are never used as label values.

use metrics::counter;
use metrics::histogram;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder and return the handle used by `/metrics`.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("gate_http_request".to_string()),
            &[
                0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `gate_http_requests_total`, `gate_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("gate_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("gate_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=399 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Known routes keep their path; everything else collapses to `/other`.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/health" => "/health",
        "/metrics" => "/metrics",
        "/api/v1/whoami" => "/api/v1/whoami",
        "/api/v1/user/selection" => "/api/v1/user/selection",
        "/api/v1/stats" => "/api/v1/stats",
        _ => "/other",
    }
}

// ============================================================================
// Auth Metrics
// ============================================================================

/// Record the terminal auth decision for a request.
///
/// Metric: `gate_auth_decisions_total`
/// Labels: `decision`
pub fn record_auth_decision(decision: &'static str) {
    counter!("gate_auth_decisions_total", "decision" => decision).increment(1);
}

/// Record an init data verification attempt.
///
/// Metric: `gate_init_data_verifications_total`
/// Labels: `status` (success, malformed, hash_mismatch, missing_secret),
/// `source` (body, header, query)
pub fn record_init_data_verification(status: &'static str, source: &'static str) {
    counter!("gate_init_data_verifications_total",
        "status" => status,
        "source" => source
    )
    .increment(1);
}

// ============================================================================
// Rate Limit Metrics
// ============================================================================

/// Record a rate limit check.
///
/// Metric: `gate_rate_limit_checks_total`
/// Labels: `outcome` (allowed, limited, degraded), `key` (user, address, anonymous)
pub fn record_rate_limit_check(outcome: &'static str, key: &'static str) {
    counter!("gate_rate_limit_checks_total",
        "outcome" => outcome,
        "key" => key
    )
    .increment(1);
}

// ============================================================================
// Profile Store Metrics
// ============================================================================

/// Record a best-effort profile upsert.
///
/// Metric: `gate_profile_upserts_total`
/// Labels: `status` (success, error)
pub fn record_profile_upsert(status: &'static str) {
    counter!("gate_profile_upserts_total", "status" => status).increment(1);
}
