//! Request and response bodies of the HTTP API.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/v1/user/selection`.
///
/// `initData` may also travel here; the gate consumes it during
/// authentication and the handler ignores it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SelectionRequest {
    #[serde(default)]
    pub group_id: Option<i64>,

    #[serde(default)]
    pub teacher: Option<String>,

    #[serde(default, rename = "initData")]
    pub init_data: Option<String>,
}

/// Acknowledgement for write endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}
