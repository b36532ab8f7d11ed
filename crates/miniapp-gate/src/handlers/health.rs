//! Liveness probe.

/// Returns "OK" while the process is serving requests. Checks nothing else.
pub async fn health_check() -> &'static str {
    "OK"
}
