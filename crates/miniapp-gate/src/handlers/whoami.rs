//! Current identity handler.

use crate::auth::identity::UserIdentity;
use axum::{Extension, Json};
use tracing::instrument;

/// Handler for GET /api/v1/whoami
///
/// Returns the identity the auth gate resolved for this request:
///
/// ```json
/// { "user_id": 12345, "username": "bob", "first_name": "Bob" }
/// ```
///
/// Anonymous Telegram clients get `{"user_id": "anonymous"}` and public mode
/// yields `{"user_id": "public"}`.
#[instrument(skip_all, name = "gate.handlers.whoami")]
pub async fn whoami(Extension(identity): Extension<UserIdentity>) -> Json<UserIdentity> {
    Json(identity)
}
