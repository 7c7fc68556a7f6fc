//! Server lifecycle controller.
//!
//! [`MockServer`] owns start/stop semantics for the interception adapter
//! and resolution engine pair, and rebuilds handlers whenever the
//! configuration store publishes a new revision. Instances are explicitly
//! constructed and caller-owned; there is no process-wide singleton.

use crate::adapter::{InterceptAdapter, Transport};
use crate::config::MockConfig;
use crate::engine::{Engine, RebuildReport};
use crate::store::ConfigStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Lifecycle states. Transitions happen under one lock, so observers
/// never see a half-installed server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// The mocking subsystem: store + engine + adapter under one lifecycle.
pub struct MockServer {
    store: Arc<ConfigStore>,
    engine: Arc<Engine>,
    adapter: Arc<InterceptAdapter>,
    state: Mutex<ServerState>,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
    /// Distinguishes "never started" from "stopped after running" in
    /// update_handlers diagnostics.
    ever_ran: AtomicBool,
    /// Handed to the refresh task so it never keeps the server alive.
    self_ref: Weak<MockServer>,
}

impl MockServer {
    /// Build a server over a store and the real transport. The adapter is
    /// configured from the store's current settings; it starts detached.
    pub async fn new(store: Arc<ConfigStore>, transport: Arc<dyn Transport>) -> Arc<Self> {
        let engine = Arc::new(Engine::new());
        let settings = store.settings().await;
        let adapter = Arc::new(InterceptAdapter::new(
            engine.clone(),
            transport,
            &settings,
        ));
        Arc::new_cyclic(|self_ref| Self {
            store,
            engine,
            adapter,
            state: Mutex::new(ServerState::Stopped),
            refresh_task: Mutex::new(None),
            ever_ran: AtomicBool::new(false),
            self_ref: self_ref.clone(),
        })
    }

    /// Start intercepting.
    ///
    /// Installs the adapter, builds the handler lookup from the current
    /// store snapshot, and spawns the rebuild-on-change task. Calling
    /// start on a running server is a warn-level no-op. Concurrent calls
    /// serialize on the state lock, so exactly one performs the work.
    ///
    /// The returned report carries per-API configuration errors so they
    /// surface synchronously to the caller.
    pub async fn start(&self) -> RebuildReport {
        let mut state = self.state.lock().await;
        if *state == ServerState::Running {
            warn!("mock server already running, ignoring start");
            return RebuildReport::default();
        }
        *state = ServerState::Starting;

        self.adapter.install();
        let report = self.rebuild_from_store().await;

        let server = self.self_ref.clone();
        let mut revisions = self.store.subscribe();
        let task = tokio::spawn(async move {
            while revisions.changed().await.is_ok() {
                let Some(server) = server.upgrade() else { break };
                let report = server.update_handlers().await;
                debug!(%report, "handlers refreshed after configuration change");
            }
        });
        *self.refresh_task.lock().await = Some(task);

        *state = ServerState::Running;
        self.ever_ran.store(true, Ordering::SeqCst);
        info!(%report, "mock server started");
        report
    }

    /// Stop intercepting.
    ///
    /// Uninstalls the adapter and discards the handler lookup. Responses
    /// already suspended on a simulated delay complete against their
    /// captured snapshots; new requests pass through immediately. Calling
    /// stop on a stopped server is a warn-level no-op.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        if *state == ServerState::Stopped {
            warn!("mock server already stopped, ignoring stop");
            return;
        }
        *state = ServerState::Stopping;

        if let Some(task) = self.refresh_task.lock().await.take() {
            task.abort();
        }
        self.adapter.uninstall();
        self.engine.clear().await;

        *state = ServerState::Stopped;
        info!("mock server stopped");
    }

    /// Rebuild handlers from the current store snapshot.
    ///
    /// A no-op unless the server is running; the diagnostic distinguishes
    /// a server that never started from one that was stopped.
    pub async fn update_handlers(&self) -> RebuildReport {
        let state = self.state.lock().await;
        if *state != ServerState::Running {
            if self.ever_ran.load(Ordering::SeqCst) {
                debug!("mock server stopped; configuration change takes effect on restart");
            } else {
                debug!("mock server never started; no handlers are active");
            }
            return RebuildReport::default();
        }

        // Rebuild under the state lock so a concurrent stop() cannot
        // interleave and leave stale handlers behind.
        let report = self.rebuild_from_store().await;
        for (api_id, error) in &report.errors {
            warn!(api_id = %api_id, %error, "mock API skipped");
        }
        report
    }

    async fn rebuild_from_store(&self) -> RebuildReport {
        let config = self.store.snapshot().await;
        self.engine
            .rebuild(&config.apis, &config.settings.base_path)
            .await
    }

    /// Whether the server is currently intercepting.
    pub async fn is_running(&self) -> bool {
        *self.state.lock().await == ServerState::Running
    }

    pub async fn state(&self) -> ServerState {
        *self.state.lock().await
    }

    /// Number of APIs currently contributing a handler.
    pub async fn handler_count(&self) -> usize {
        self.engine.handler_count().await
    }

    /// Current configuration snapshot, for display surfaces.
    pub async fn get_config(&self) -> MockConfig {
        self.store.snapshot().await
    }

    /// The store backing this server.
    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    /// The interception adapter, the boundary handed to the HTTP client.
    pub fn adapter(&self) -> &Arc<InterceptAdapter> {
        &self.adapter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{HttpRequest, HttpResponse, NoopTransport};
    use crate::config::{HttpMethod, ServerSettings, UnhandledPolicy};
    use crate::error::InterceptError;
    use crate::store::{ApiDraft, CaseDraft};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Duration;

    struct PassThrough;

    #[async_trait]
    impl Transport for PassThrough {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, InterceptError> {
            Ok(HttpResponse {
                status: 599,
                headers: HashMap::new(),
                body: json!("real network"),
            })
        }
    }

    async fn server_with_store() -> (Arc<MockServer>, Arc<ConfigStore>) {
        let store = Arc::new(ConfigStore::new(MockConfig::default()));
        let server = MockServer::new(store.clone(), Arc::new(PassThrough)).await;
        (server, store)
    }

    async fn add_mock(store: &ConfigStore, path: &str, body: serde_json::Value) -> String {
        let api = store
            .create_api(ApiDraft {
                name: String::new(),
                description: String::new(),
                method: HttpMethod::Get,
                path: path.to_string(),
                is_enabled: true,
            })
            .await
            .unwrap();
        store
            .add_case(
                &api.id,
                CaseDraft {
                    body,
                    is_active: true,
                    ..CaseDraft::default()
                },
            )
            .await
            .unwrap();
        api.id
    }

    /// Wait until the refresh task has applied pending store changes.
    async fn settle(server: &MockServer, expected_handlers: usize) {
        for _ in 0..100 {
            if server.handler_count().await == expected_handlers {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "handler count never reached {expected_handlers}, is {}",
            server.handler_count().await
        );
    }

    #[tokio::test]
    async fn test_start_installs_handlers_from_store() {
        let (server, store) = server_with_store().await;
        add_mock(&store, "/api/users/:id", json!({"ok": true})).await;

        let report = server.start().await;
        assert_eq!(report.installed, 1);
        assert!(server.is_running().await);

        let response = server
            .adapter()
            .handle(HttpRequest::new(HttpMethod::Get, "/api/users/42"))
            .await
            .unwrap();
        assert_eq!(response.body, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_start_twice_is_noop() {
        let (server, store) = server_with_store().await;
        add_mock(&store, "/a", json!(1)).await;

        server.start().await;
        assert_eq!(server.handler_count().await, 1);

        // Second start must not reinstall or disturb anything.
        server.start().await;
        assert!(server.is_running().await);
        assert_eq!(server.handler_count().await, 1);
        assert!(server.adapter().is_installed());
    }

    #[tokio::test]
    async fn test_stop_when_stopped_is_noop() {
        let (server, _) = server_with_store().await;
        assert_eq!(server.state().await, ServerState::Stopped);
        server.stop().await;
        assert_eq!(server.state().await, ServerState::Stopped);
    }

    #[tokio::test]
    async fn test_stop_uninstalls_and_clears() {
        let (server, store) = server_with_store().await;
        add_mock(&store, "/a", json!(1)).await;
        server.start().await;
        assert_eq!(server.handler_count().await, 1);

        server.stop().await;
        assert!(!server.is_running().await);
        assert!(!server.adapter().is_installed());
        assert_eq!(server.handler_count().await, 0);

        // Requests pass through once stopped.
        let response = server
            .adapter()
            .handle(HttpRequest::new(HttpMethod::Get, "/a"))
            .await
            .unwrap();
        assert_eq!(response.status, 599);
    }

    #[tokio::test]
    async fn test_update_handlers_before_start_leaves_count_zero() {
        let (server, store) = server_with_store().await;
        add_mock(&store, "/a", json!(1)).await;

        let report = server.update_handlers().await;
        assert_eq!(report.installed, 0);
        assert_eq!(server.handler_count().await, 0);
    }

    #[tokio::test]
    async fn test_store_changes_rebuild_handlers_while_running() {
        let (server, store) = server_with_store().await;
        server.start().await;
        assert_eq!(server.handler_count().await, 0);

        let api_id = add_mock(&store, "/a", json!(1)).await;
        settle(&server, 1).await;

        store.set_enabled(&api_id, false).await.unwrap();
        settle(&server, 0).await;

        store.set_enabled(&api_id, true).await.unwrap();
        settle(&server, 1).await;
        let response = server
            .adapter()
            .handle(HttpRequest::new(HttpMethod::Get, "/a"))
            .await
            .unwrap();
        assert_eq!(response.body, json!(1));
    }

    #[tokio::test]
    async fn test_changes_while_stopped_apply_on_restart() {
        let (server, store) = server_with_store().await;
        server.start().await;
        server.stop().await;

        add_mock(&store, "/later", json!("later")).await;
        assert_eq!(server.handler_count().await, 0);

        let report = server.start().await;
        assert_eq!(report.installed, 1);
        let response = server
            .adapter()
            .handle(HttpRequest::new(HttpMethod::Get, "/later"))
            .await
            .unwrap();
        assert_eq!(response.body, json!("later"));
    }

    #[tokio::test]
    async fn test_concurrent_starts_install_once() {
        let (server, store) = server_with_store().await;
        add_mock(&store, "/a", json!(1)).await;

        let (a, b) = tokio::join!(server.start(), server.start());
        // One call does the work, the other is the warn no-op.
        assert_eq!(a.installed + b.installed, 1);
        assert!(server.is_running().await);
        assert_eq!(server.handler_count().await, 1);
    }

    #[tokio::test]
    async fn test_error_policy_rejects_unmatched_while_running() {
        let store = Arc::new(ConfigStore::new(MockConfig {
            apis: Vec::new(),
            settings: ServerSettings {
                on_unhandled: UnhandledPolicy::Error,
                ..ServerSettings::default()
            },
        }));
        let server = MockServer::new(store, Arc::new(NoopTransport)).await;
        server.start().await;

        let err = server
            .adapter()
            .handle(HttpRequest::new(HttpMethod::Get, "/nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, InterceptError::Unhandled { .. }));
    }

    #[tokio::test]
    async fn test_start_reports_malformed_entries() {
        let store = Arc::new(ConfigStore::new(MockConfig::default()));
        add_mock(&store, "/good", json!(1)).await;
        // Malformed template goes in through the raw config path, as a
        // hand-edited persistence file would.
        let mut config = store.snapshot().await;
        config.apis.push(crate::config::MockApi {
            id: "bad".to_string(),
            name: String::new(),
            description: String::new(),
            method: HttpMethod::Get,
            path: "/api/:".to_string(),
            cases: vec![crate::config::MockResponseCase {
                id: "c".to_string(),
                name: String::new(),
                description: String::new(),
                status: 200,
                headers: HashMap::new(),
                body: json!(null),
                delay: None,
                is_active: true,
            }],
            active_case: None,
            is_enabled: true,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        });
        let store = Arc::new(ConfigStore::new(config));
        let server = MockServer::new(store, Arc::new(PassThrough)).await;

        let report = server.start().await;
        assert_eq!(report.installed, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].0, "bad");

        // The good entry still resolves.
        let response = server
            .adapter()
            .handle(HttpRequest::new(HttpMethod::Get, "/good"))
            .await
            .unwrap();
        assert_eq!(response.body, json!(1));
    }
}
