//! Rate limiting middleware.
//!
//! Derives the throttling key from the captured request sources and the
//! peer address. Runs before authentication, so rejected floods never reach
//! signature verification.

use crate::auth::locator::RequestSources;
use crate::auth::rate_key::derive_rate_limit_key;
use crate::errors::GateError;
use crate::services::rate_limiter::RateLimiter;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::instrument;

#[instrument(skip_all, name = "gate.middleware.rate_limit")]
pub async fn enforce_rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request,
    next: Next,
) -> Result<Response, GateError> {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let key = match req.extensions().get::<Arc<RequestSources>>() {
        Some(sources) => derive_rate_limit_key(sources, peer),
        None => derive_rate_limit_key(&RequestSources::default(), peer),
    };

    if !limiter.check(key).is_allowed() {
        tracing::warn!(target: "gate.middleware.rate_limit", key_kind = key.kind(), "Rate limit exceeded");
        return Err(GateError::RateLimitExceeded);
    }

    Ok(next.run(req).await)
}
