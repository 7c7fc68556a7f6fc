//! Interception adapter at the HTTP client boundary.
//!
//! Wraps the real transport behind the [`Transport`] trait. Every request
//! is evaluated against the resolution engine; on a hit the adapter
//! fabricates a response (after the case's simulated latency), on a miss
//! it applies the configured unhandled-request policy.

use crate::config::{HttpMethod, ServerSettings, UnhandledPolicy};
use crate::engine::Engine;
use crate::error::InterceptError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// An outgoing HTTP request as seen at the client boundary.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Absolute URL or bare path; origin and query string are stripped
    /// before matching.
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<serde_json::Value>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
        }
    }
}

/// A response, fabricated or real.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: serde_json::Value,
}

/// The real HTTP transport the adapter sits in front of.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, InterceptError>;
}

/// Transport for mock-only deployments: every forwarded request fails,
/// making accidental network fallthrough visible.
#[derive(Debug, Default)]
pub struct NoopTransport;

#[async_trait]
impl Transport for NoopTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, InterceptError> {
        Err(InterceptError::Transport(format!(
            "no backing transport configured for {} {}",
            request.method, request.url
        )))
    }
}

/// Sits between the HTTP client and its transport, substituting fabricated
/// responses for requests the engine resolves.
pub struct InterceptAdapter {
    engine: Arc<Engine>,
    transport: Arc<dyn Transport>,
    policy: UnhandledPolicy,
    log_matches: bool,
    log_unmatched: bool,
    installed: AtomicBool,
}

impl InterceptAdapter {
    pub fn new(
        engine: Arc<Engine>,
        transport: Arc<dyn Transport>,
        settings: &ServerSettings,
    ) -> Self {
        Self {
            engine,
            transport,
            policy: settings.on_unhandled,
            log_matches: settings.log_matches,
            log_unmatched: settings.log_unmatched,
            installed: AtomicBool::new(false),
        }
    }

    /// Attach the adapter. Idempotent: a redundant call is a warn-level
    /// no-op, never an error or a duplicate attachment.
    pub fn install(&self) {
        if self.installed.swap(true, Ordering::SeqCst) {
            warn!("interception adapter already installed, ignoring");
        } else {
            debug!("interception adapter installed");
        }
    }

    /// Detach the adapter, restoring pure pass-through behavior.
    /// Idempotent in the same way as [`install`](Self::install).
    pub fn uninstall(&self) {
        if self.installed.swap(false, Ordering::SeqCst) {
            debug!("interception adapter uninstalled");
        } else {
            warn!("interception adapter not installed, ignoring");
        }
    }

    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::SeqCst)
    }

    /// Evaluate one outgoing request.
    ///
    /// While not installed, requests always pass through unmodified. The
    /// engine is consulted before any suspension, and the resolved handler
    /// is an owned snapshot, so an uninstall during a simulated delay
    /// cannot invalidate a response already being fabricated.
    pub async fn handle(&self, request: HttpRequest) -> Result<HttpResponse, InterceptError> {
        if !self.is_installed() {
            return self.transport.send(request).await;
        }

        let path = request_path(&request.url);
        match self.engine.resolve(request.method, path).await {
            Some(resolved) => {
                if self.log_matches {
                    info!(
                        api_id = %resolved.api_id,
                        case_id = %resolved.case_id,
                        method = %request.method,
                        path = %path,
                        status = resolved.status,
                        "request matched mock"
                    );
                }
                if resolved.delay_ms > 0 {
                    debug!(
                        api_id = %resolved.api_id,
                        delay_ms = resolved.delay_ms,
                        "applying simulated latency"
                    );
                    tokio::time::sleep(Duration::from_millis(resolved.delay_ms)).await;
                }
                Ok(HttpResponse {
                    status: resolved.status,
                    headers: resolved.headers,
                    body: resolved.body,
                })
            }
            None => {
                if self.log_unmatched {
                    debug!(
                        method = %request.method,
                        path = %path,
                        "no mock matched"
                    );
                }
                match self.policy {
                    UnhandledPolicy::Bypass => self.transport.send(request).await,
                    UnhandledPolicy::Error => Err(InterceptError::Unhandled {
                        method: request.method,
                        path: path.to_string(),
                    }),
                }
            }
        }
    }
}

/// Strip the origin (`scheme://host[:port]`) and query string from a URL,
/// leaving only the path component the matcher operates on.
fn request_path(url: &str) -> &str {
    let without_origin = match url.find("://") {
        Some(scheme_end) => {
            let rest = &url[scheme_end + 3..];
            match rest.find('/') {
                Some(path_start) => &rest[path_start..],
                None => "/",
            }
        }
        None => url,
    };
    without_origin
        .split_once('?')
        .map_or(without_origin, |(path, _)| path)
}
