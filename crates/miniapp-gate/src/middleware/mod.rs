//! Middleware for the gate.
//!
//! Protected routes run, outermost first:
//!
//! - `capture` - buffers the body once and records [`RequestSources`]
//! - `rate_limit` - throttles by [`RateLimitKey`]
//! - `auth` - runs the [`AuthGate`] and injects the [`UserIdentity`]
//!
//! `http_metrics` wraps the whole router.
//!
//! [`RequestSources`]: crate::auth::RequestSources
//! [`RateLimitKey`]: crate::auth::RateLimitKey
//! [`AuthGate`]: crate::auth::AuthGate
//! [`UserIdentity`]: crate::auth::UserIdentity

pub mod auth;
pub mod capture;
pub mod http_metrics;
pub mod rate_limit;

pub use auth::{require_auth, AuthState};
pub use capture::{capture_sources, CaptureState};
pub use http_metrics::http_metrics_middleware;
pub use rate_limit::enforce_rate_limit;
