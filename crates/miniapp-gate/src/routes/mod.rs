//! HTTP routes for the gate.
//!
//! Defines the Axum router and application state.

use crate::auth::gate::AuthGate;
use crate::config::Config;
use crate::handlers;
use crate::middleware::{
    capture_sources, enforce_rate_limit, http_metrics_middleware, require_auth, AuthState,
    CaptureState,
};
use crate::observability::counters::UsageCounters;
use crate::services::profile_store::ProfileStore;
use crate::services::rate_limiter::RateLimiter;
use axum::{
    http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Request timeout applied to every route.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Auth gate built from the configuration snapshot.
    pub gate: Arc<AuthGate>,

    pub rate_limiter: Arc<RateLimiter>,

    pub profiles: Arc<dyn ProfileStore>,

    pub counters: Arc<UsageCounters>,
}

impl AppState {
    pub fn new(config: Config, profiles: Arc<dyn ProfileStore>) -> Self {
        let gate = Arc::new(AuthGate::from_config(&config));
        let rate_limiter = Arc::new(RateLimiter::new(
            config.rate_limit_per_second,
            config.rate_limit_per_hour,
        ));

        Self {
            config,
            gate,
            rate_limiter,
            profiles,
            counters: Arc::new(UsageCounters::new()),
        }
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe (simple "OK") - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `/api/v1/stats` - Usage counters - public
/// - `/api/v1/whoami` - Resolved identity - gated
/// - `/api/v1/user/selection` - Read/save last selection - gated
///
/// Gated routes run body capture, then rate limiting, then the auth gate.
/// Every route gets CORS, TraceLayer, a 30 second timeout and the HTTP
/// metrics middleware (outermost).
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let auth_state = Arc::new(AuthState {
        gate: Arc::clone(&state.gate),
        profiles: Arc::clone(&state.profiles),
        counters: Arc::clone(&state.counters),
    });
    let capture_state = CaptureState {
        max_body_bytes: state.config.max_body_bytes,
    };
    let cors = cors_layer(&state.config.cors_allowed_origins);

    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/v1/stats", get(handlers::get_stats))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // route_layer order: the last one added runs first.
    let protected_routes = Router::new()
        .route("/api/v1/whoami", get(handlers::whoami))
        .route(
            "/api/v1/user/selection",
            get(handlers::get_selection).post(handlers::save_selection),
        )
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.rate_limiter),
            enforce_rate_limit,
        ))
        .route_layer(middleware::from_fn_with_state(
            capture_state,
            capture_sources,
        ))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer (innermost)
    // 2. TraceLayer
    // 3. CorsLayer, answers preflights before any gate runs
    // 4. http_metrics_middleware (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(middleware::from_fn(http_metrics_middleware))
}

/// CORS restricted to the configured origins. Unparseable origins are
/// skipped with a warning.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(target: "gate.routes", origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            HeaderName::from_static("telegram-init-data"),
            HeaderName::from_static("x-telegram-web-app-data"),
            HeaderName::from_static("x-init-data"),
            HeaderName::from_static("x-telegram-initdata"),
        ])
}
