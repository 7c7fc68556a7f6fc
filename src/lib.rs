//! mocklet - development-time HTTP mocking
//!
//! Intercepts outgoing HTTP requests at the client boundary and returns
//! configurable, user-defined responses instead of hitting a real backend.
//!
//! # Features
//!
//! - **Path Matching**: exact paths plus `:param` segments (`/users/:id`)
//! - **Response Cases**: several response variants per API, one active
//! - **Latency Simulation**: per-case non-blocking delays
//! - **Pass-Through**: unmatched requests proceed to the real network
//!   (or are rejected, per policy)
//! - **Live Reload**: handlers rebuild automatically on configuration edits
//!
//! # Example
//!
//! ```no_run
//! use mocklet::{ApiDraft, CaseDraft, ConfigStore, HttpMethod, MockConfig, MockServer};
//! use mocklet::adapter::{HttpRequest, NoopTransport};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(ConfigStore::new(MockConfig::default()));
//!     let api = store
//!         .create_api(ApiDraft {
//!             name: "users".into(),
//!             description: String::new(),
//!             method: HttpMethod::Get,
//!             path: "/api/users/:id".into(),
//!             is_enabled: true,
//!         })
//!         .await?;
//!     store
//!         .add_case(
//!             &api.id,
//!             CaseDraft {
//!                 body: serde_json::json!({"id": 42, "name": "Jane"}),
//!                 is_active: true,
//!                 ..CaseDraft::default()
//!             },
//!         )
//!         .await?;
//!
//!     let server = MockServer::new(store, Arc::new(NoopTransport)).await;
//!     server.start().await;
//!
//!     let response = server
//!         .adapter()
//!         .handle(HttpRequest::new(HttpMethod::Get, "/api/users/42"))
//!         .await?;
//!     assert_eq!(response.status, 200);
//!
//!     server.stop().await;
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod config;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod server;
pub mod store;

pub use adapter::{HttpRequest, HttpResponse, InterceptAdapter, NoopTransport, Transport};
pub use config::{HttpMethod, MockApi, MockConfig, MockResponseCase, ServerSettings, UnhandledPolicy};
pub use engine::{Engine, RebuildReport, ResolvedHandler};
pub use error::{ConfigError, InterceptError, StoreError};
pub use server::{MockServer, ServerState};
pub use store::{ApiDraft, CaseDraft, ConfigStore};
