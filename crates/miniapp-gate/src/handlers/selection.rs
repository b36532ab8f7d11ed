//! Last schedule selection of a user.
//!
//! Only authenticated Telegram users have a stored selection. Anonymous and
//! public callers read an empty selection and their writes are acknowledged
//! without being stored.

use crate::auth::identity::UserIdentity;
use crate::auth::locator::RequestSources;
use crate::errors::GateError;
use crate::models::{OkResponse, SelectionRequest};
use crate::routes::AppState;
use crate::services::profile_store::Selection;
use axum::extract::State;
use axum::{Extension, Json};
use std::sync::Arc;
use tracing::instrument;

/// Handler for GET /api/v1/user/selection
///
/// ```json
/// { "last_selected_group_id": 42, "last_selected_teacher": null }
/// ```
#[instrument(skip_all, name = "gate.handlers.get_selection")]
pub async fn get_selection(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<UserIdentity>,
) -> Result<Json<Selection>, GateError> {
    let Some(user_id) = identity.id.telegram_id() else {
        return Ok(Json(Selection::default()));
    };

    let selection = state.profiles.selection(user_id).await?;
    Ok(Json(selection.unwrap_or_default()))
}

/// Handler for POST /api/v1/user/selection
///
/// Body: `{"group_id": 42, "teacher": "Ivanov I.I.", "initData": "..."}`,
/// every field optional. Responds `{"ok": true}`.
#[instrument(skip_all, name = "gate.handlers.save_selection")]
pub async fn save_selection(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<UserIdentity>,
    Extension(sources): Extension<Arc<RequestSources>>,
) -> Result<Json<OkResponse>, GateError> {
    let body = sources
        .body()
        .cloned()
        .ok_or_else(|| GateError::BadRequest("Request body must be JSON".to_string()))?;

    let request: SelectionRequest = serde_json::from_value(body).map_err(|e| {
        tracing::debug!(target: "gate.handlers.selection", error = %e, "Invalid selection body");
        GateError::BadRequest("Invalid selection body".to_string())
    })?;

    let Some(user_id) = identity.id.telegram_id() else {
        tracing::debug!(target: "gate.handlers.selection", "Selection not stored for unauthenticated caller");
        return Ok(Json(OkResponse::ok()));
    };

    state
        .profiles
        .save_selection(
            user_id,
            Selection {
                last_selected_group_id: request.group_id,
                last_selected_teacher: request.teacher,
            },
        )
        .await?;
    state.counters.record_selection(request.group_id);

    Ok(Json(OkResponse::ok()))
}
