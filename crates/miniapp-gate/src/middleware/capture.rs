//! Request source capture.
//!
//! Buffers the body exactly once (bounded by `MAX_BODY_BYTES`), decodes the
//! query string, and stores an `Arc<RequestSources>` in the request
//! extensions. The body is put back so handlers can still read it.

use crate::auth::locator::RequestSources;
use crate::errors::GateError;
use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;
use url::form_urlencoded;

#[derive(Debug, Clone, Copy)]
pub struct CaptureState {
    pub max_body_bytes: usize,
}

#[instrument(skip_all, name = "gate.middleware.capture")]
pub async fn capture_sources(
    State(state): State<CaptureState>,
    req: Request,
    next: Next,
) -> Result<Response, GateError> {
    let (parts, body) = req.into_parts();

    let bytes = to_bytes(body, state.max_body_bytes).await.map_err(|e| {
        tracing::debug!(target: "gate.middleware.capture", error = %e, "Failed to buffer request body");
        GateError::PayloadTooLarge(state.max_body_bytes)
    })?;

    // Only POST bodies are inspected for init data.
    let json = if parts.method == Method::POST && !bytes.is_empty() {
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::debug!(target: "gate.middleware.capture", "Request body is not JSON");
                None
            }
        }
    } else {
        None
    };

    let query = parts
        .uri
        .query()
        .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    let sources = RequestSources::new(parts.headers.clone(), json, query);

    let mut req = Request::from_parts(parts, Body::from(bytes));
    req.extensions_mut().insert(Arc::new(sources));

    Ok(next.run(req).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{middleware, routing::any, Extension, Json, Router};
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;

    async fn echo(Extension(sources): Extension<Arc<RequestSources>>, body: String) -> Json<Value> {
        Json(json!({
            "body_init_data": sources.body_field("initData"),
            "query_init_data": sources.query_param("tgWebAppData"),
            "header": sources.header("x-telegram-initdata"),
            "raw_body": body,
        }))
    }

    fn app(limit: usize) -> Router {
        Router::new().route("/", any(echo)).layer(middleware::from_fn_with_state(
            CaptureState {
                max_body_bytes: limit,
            },
            capture_sources,
        ))
    }

    async fn call(app: Router, request: axum::http::Request<Body>) -> (u16, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status().as_u16();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_post_json_body_is_captured_and_restored() {
        let body = r#"{"initData":"a=1&hash=ff"}"#;
        let request = axum::http::Request::post("/")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();

        let (status, json) = call(app(1024), request).await;
        assert_eq!(status, 200);
        assert_eq!(json["body_init_data"], "a=1&hash=ff");
        assert_eq!(json["raw_body"], body);
    }

    #[tokio::test]
    async fn test_query_and_headers_are_captured() {
        let request = axum::http::Request::get("/?tgWebAppData=a%3D1%26hash%3Dff&x=2")
            .header("x-telegram-initdata", "b=2")
            .body(Body::empty())
            .unwrap();

        let (_, json) = call(app(1024), request).await;
        assert_eq!(json["query_init_data"], "a=1&hash=ff");
        assert_eq!(json["header"], "b=2");
        assert_eq!(json["body_init_data"], Value::Null);
    }

    #[tokio::test]
    async fn test_get_body_is_not_parsed() {
        let request = axum::http::Request::get("/")
            .body(Body::from(r#"{"initData":"a=1"}"#))
            .unwrap();

        let (_, json) = call(app(1024), request).await;
        assert_eq!(json["body_init_data"], Value::Null);
    }

    #[tokio::test]
    async fn test_non_json_body_is_tolerated() {
        let request = axum::http::Request::post("/")
            .body(Body::from("initData=a%3D1"))
            .unwrap();

        let (status, json) = call(app(1024), request).await;
        assert_eq!(status, 200);
        assert_eq!(json["body_init_data"], Value::Null);
        assert_eq!(json["raw_body"], "initData=a%3D1");
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let request = axum::http::Request::post("/")
            .body(Body::from(vec![b'a'; 64]))
            .unwrap();

        let (status, json) = call(app(16), request).await;
        assert_eq!(status, 413);
        assert_eq!(json["error"]["code"], "PAYLOAD_TOO_LARGE");
    }
}
