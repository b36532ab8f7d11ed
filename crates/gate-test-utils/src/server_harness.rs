//! Test server harness for E2E testing
//!
//! Provides `TestGateServer` for spawning real gate instances in tests.

use metrics_exporter_prometheus::PrometheusBuilder;
use miniapp_gate::config::Config;
use miniapp_gate::routes::{self, AppState};
use miniapp_gate::services::{InMemoryProfileStore, ProfileStore};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Test harness for spawning the gate in E2E tests.
///
/// # Example
/// ```rust,ignore
/// let server = TestGateServer::spawn(&[("ALLOW_PUBLIC", "true")]).await?;
/// let response = reqwest::get(format!("{}/health", server.url())).await?;
/// assert_eq!(response.status(), 200);
/// ```
pub struct TestGateServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    profiles: Option<Arc<InMemoryProfileStore>>,
    _handle: JoinHandle<()>,
}

impl TestGateServer {
    /// Spawn a server with an in-memory profile store.
    ///
    /// `vars` are applied on top of an otherwise empty environment, so
    /// defaults apply for anything not given.
    pub async fn spawn(vars: &[(&str, &str)]) -> Result<Self, anyhow::Error> {
        let profiles = Arc::new(InMemoryProfileStore::new());
        let mut server = Self::spawn_with_store(vars, profiles.clone()).await?;
        server.profiles = Some(profiles);
        Ok(server)
    }

    /// Spawn a server backed by the given profile store.
    pub async fn spawn_with_store(
        vars: &[(&str, &str)],
        profiles: Arc<dyn ProfileStore>,
    ) -> Result<Self, anyhow::Error> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let state = Arc::new(AppState::new(config, profiles));

        // Local recorder; the global one can only be installed once per process.
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

        let app = routes::build_routes(state.clone(), metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            state,
            profiles: None,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shared application state, e.g. for reading usage counters.
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// The in-memory store, when spawned via [`TestGateServer::spawn`].
    pub fn profiles(&self) -> Option<&Arc<InMemoryProfileStore>> {
        self.profiles.as_ref()
    }
}

impl Drop for TestGateServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}
