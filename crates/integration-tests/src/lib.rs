//! Integration tests for the pre-registration landing page.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p prelaunch-integration-tests
//! ```
//!
//! Each test spawns its own server on an ephemeral port, backed by an
//! in-memory store, so tests run in parallel without shared state. Rate
//! limiter budgets are per server as well.

use std::net::SocketAddr;
use std::sync::Arc;

use prelaunch_web::AppState;
use prelaunch_web::config::RateLimitConfig;
use prelaunch_web::store::InMemoryStore;
use reqwest::{Client, Response};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Static assets shipped with the web crate.
const STATIC_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../web/static");

/// A running server plus handles to its store and state.
pub struct TestServer {
    pub base_url: String,
    pub store: Arc<InMemoryStore>,
    pub state: AppState,
    pub client: Client,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Spawn a server with an empty store and default rate limits.
    pub async fn spawn() -> Self {
        Self::spawn_with(InMemoryStore::new(), RateLimitConfig::default()).await
    }

    /// Spawn a server around `store` with the given limits.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot bind to an ephemeral port.
    pub async fn spawn_with(store: InMemoryStore, limits: RateLimitConfig) -> Self {
        let store = Arc::new(store);
        let state = AppState::new(store.clone(), limits, STATIC_DIR);
        let app = prelaunch_web::app(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Listener has no address");

        let handle = tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("Test server error");
        });

        Self {
            base_url: format!("http://{addr}"),
            store,
            state,
            client: Client::new(),
            handle,
        }
    }

    /// Absolute URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// `GET path`.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed")
    }

    /// `POST /api/pre-register` from the loopback address.
    pub async fn pre_register(&self, email: &str, source: Option<&str>) -> Response {
        self.pre_register_from(None, email, source).await
    }

    /// `POST /api/pre-register` as client `ip` (sent as `X-Forwarded-For`).
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn pre_register_from(
        &self,
        ip: Option<&str>,
        email: &str,
        source: Option<&str>,
    ) -> Response {
        let mut body = json!({ "email": email });
        if let Some(source) = source {
            body["source"] = json!(source);
        }

        let mut request = self.client.post(self.url("/api/pre-register")).json(&body);
        if let Some(ip) = ip {
            request = request.header("x-forwarded-for", ip);
        }
        request.send().await.expect("POST request failed")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
