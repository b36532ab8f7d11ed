//! Authentication middleware for protected routes.
//!
//! Runs the [`AuthGate`] over the captured request sources and turns the
//! decision into either a response or a [`UserIdentity`] in the request
//! extensions. Anonymous Telegram clients are let through with the anonymous
//! identity; handlers decide what that identity may do.

use crate::auth::gate::{AuthDecision, AuthGate, RejectReason};
use crate::auth::identity::UserIdentity;
use crate::auth::locator::RequestSources;
use crate::errors::GateError;
use crate::observability::counters::UsageCounters;
use crate::observability::metrics::{record_auth_decision, record_profile_upsert};
use crate::services::profile_store::ProfileStore;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub gate: Arc<AuthGate>,

    /// Receives a best-effort upsert after each successful authentication.
    pub profiles: Arc<dyn ProfileStore>,

    pub counters: Arc<UsageCounters>,
}

/// Gate a protected route.
///
/// # Response
///
/// - 307 redirect to the bot when a non-Telegram client hits the app and a
///   bot username is configured
/// - 403 Forbidden for other non-Telegram clients
/// - 401 Unauthorized with `WWW-Authenticate` for invalid init data, or when
///   no bot token is configured outside public mode
/// - otherwise continues with the identity in the request extensions
#[instrument(skip_all, name = "gate.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, GateError> {
    let sources = req
        .extensions()
        .get::<Arc<RequestSources>>()
        .cloned()
        .unwrap_or_default();

    let decision = state.gate.decide(&sources);
    record_auth_decision(decision.as_label());
    state.counters.record_decision(&decision);

    let identity = match decision {
        AuthDecision::Authenticated(identity) => {
            upsert_profile(state.profiles.as_ref(), &identity).await;
            identity
        }
        AuthDecision::Anonymous => UserIdentity::anonymous(),
        AuthDecision::Redirect(target) => {
            tracing::debug!(target: "gate.middleware.auth", "Redirecting non-Telegram client to bot");
            return Ok(Redirect::temporary(&target).into_response());
        }
        AuthDecision::Rejected(RejectReason::NotTelegramClient) => {
            return Err(GateError::Forbidden(
                "Open this app from Telegram".to_string(),
            ));
        }
        AuthDecision::Rejected(reason) => {
            tracing::debug!(target: "gate.middleware.auth", reason = %reason, "Request rejected");
            return Err(GateError::InvalidInitData(
                "Invalid Telegram init data".to_string(),
            ));
        }
    };

    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}

/// Failures are logged and counted; they never fail the request.
async fn upsert_profile(profiles: &dyn ProfileStore, identity: &UserIdentity) {
    if !identity.is_authenticated() {
        return;
    }

    match profiles.upsert(identity).await {
        Ok(()) => record_profile_upsert("success"),
        Err(e) => {
            record_profile_upsert("error");
            tracing::warn!(target: "gate.middleware.auth", error = %e, "Profile upsert failed");
        }
    }
}
