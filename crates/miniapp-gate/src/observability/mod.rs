//! Observability for the gate.
//!
//! Prometheus metrics plus the in-process usage counters served by
//! `/api/v1/stats`.

pub mod counters;
pub mod metrics;
