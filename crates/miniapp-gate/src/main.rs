//! Mini App Gate
//!
//! Entry point for the Telegram Mini App authentication gate.

use miniapp_gate::config::Config;
use miniapp_gate::observability::metrics::init_metrics_recorder;
use miniapp_gate::routes::{self, AppState};
use miniapp_gate::services::InMemoryProfileStore;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "miniapp_gate=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Mini App Gate");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        allow_public = config.allow_public,
        bot_username = ?config.bot_username,
        rate_limit_per_second = config.rate_limit_per_second,
        rate_limit_per_hour = config.rate_limit_per_hour,
        drain_secs = config.drain_period.as_secs(),
        "Configuration loaded successfully"
    );

    if config.allow_public {
        warn!("ALLOW_PUBLIC is enabled, init data is not verified");
    } else if config.bot_token.is_none() {
        warn!("BOT_TOKEN is not set, every request with init data will be rejected");
    }

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    let bind_address = config.bind_address.clone();
    let drain_period = config.drain_period;

    let state = Arc::new(AppState::new(config, Arc::new(InMemoryProfileStore::new())));
    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Mini App Gate listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(drain_period))
    .await?;

    info!("Mini App Gate shutdown complete");

    Ok(())
}

/// Which signal asked the process to stop.
#[derive(Debug, Clone, Copy)]
enum StopSignal {
    Interrupt,
    Terminate,
}

async fn wait_for_stop_signal() -> StopSignal {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(target: "gate.shutdown", error = %e, "Cannot listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(target: "gate.shutdown", error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => StopSignal::Interrupt,
        _ = terminate => StopSignal::Terminate,
    }
}

/// Resolves once a stop signal has arrived and `drain` has elapsed, letting
/// in-flight requests finish before the listener closes.
async fn shutdown_signal(drain: Duration) {
    let received = wait_for_stop_signal().await;
    info!(target: "gate.shutdown", signal = ?received, "Stop signal received");

    if drain.is_zero() {
        return;
    }

    warn!(
        target: "gate.shutdown",
        drain_secs = drain.as_secs(),
        "Draining in-flight requests"
    );
    tokio::time::sleep(drain).await;
    info!(target: "gate.shutdown", "Drain period complete");
}
