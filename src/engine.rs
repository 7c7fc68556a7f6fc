//! Handler resolution engine.
//!
//! Translates the current API definitions into a request-time lookup of
//! (method, compiled path pattern) handlers, and answers whether a given
//! request has a mock. The lookup is replaced wholesale on every rebuild
//! (an `Arc` swap), so an in-flight resolution never observes a torn view.

use crate::config::{is_allowed_status, HttpMethod, MockApi};
use crate::error::ConfigError;
use crate::matcher::{self, PathPattern};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// One installed (method, pattern) -> response-case binding.
struct Handler {
    api_id: String,
    method: HttpMethod,
    pattern: PathPattern,
    case: CaseSnapshot,
}

/// Immutable copy of the active case taken at rebuild time.
///
/// Delayed responses complete against this snapshot even if the store
/// mutates or the server stops while they are pending.
#[derive(Debug, Clone)]
struct CaseSnapshot {
    case_id: String,
    status: u16,
    headers: HashMap<String, String>,
    body: serde_json::Value,
    delay_ms: u64,
}

/// A successfully resolved handler, owned by the caller.
#[derive(Debug, Clone)]
pub struct ResolvedHandler {
    pub api_id: String,
    pub case_id: String,
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: serde_json::Value,
    /// Simulated latency in milliseconds (0 = respond immediately).
    pub delay_ms: u64,
    /// Values captured for `:name` segments in the matched template.
    pub path_params: HashMap<String, String>,
}

/// Outcome of a rebuild: how many handlers were installed, how many APIs
/// were skipped as a normal transient state (disabled or no active case),
/// and the per-API errors for malformed definitions.
#[derive(Debug, Default)]
pub struct RebuildReport {
    pub installed: usize,
    pub skipped: usize,
    pub errors: Vec<(String, ConfigError)>,
}

impl fmt::Display for RebuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} handler(s) installed, {} skipped, {} error(s)",
            self.installed,
            self.skipped,
            self.errors.len()
        )
    }
}

/// Request-time lookup over the registered handlers.
pub struct Engine {
    handlers: RwLock<Arc<Vec<Handler>>>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Rebuild the lookup from scratch.
    ///
    /// Registers one handler per enabled API with a resolved active case.
    /// Disabled APIs and APIs without an active case are skipped silently;
    /// malformed definitions are recorded per-API and skipped, so one bad
    /// entry never disables the rest. The new handler list replaces the
    /// old one in a single swap.
    pub async fn rebuild(&self, apis: &[MockApi], base_path: &str) -> RebuildReport {
        let mut handlers = Vec::new();
        let mut report = RebuildReport::default();

        for api in apis {
            if !api.is_enabled {
                debug!(api_id = %api.id, "skipping disabled API");
                report.skipped += 1;
                continue;
            }
            let Some(case) = api.resolved_active_case() else {
                debug!(api_id = %api.id, "skipping API with no active case");
                report.skipped += 1;
                continue;
            };
            if !is_allowed_status(case.status) {
                report
                    .errors
                    .push((api.id.clone(), ConfigError::DisallowedStatus(case.status)));
                continue;
            }
            match matcher::compile(base_path, &api.path) {
                Ok(pattern) => {
                    handlers.push(Handler {
                        api_id: api.id.clone(),
                        method: api.method,
                        pattern,
                        case: CaseSnapshot {
                            case_id: case.id.clone(),
                            status: case.status,
                            headers: case.headers.clone(),
                            body: case.body.clone(),
                            delay_ms: case.delay.unwrap_or(0),
                        },
                    });
                    report.installed += 1;
                }
                Err(e) => {
                    report.errors.push((api.id.clone(), e));
                }
            }
        }

        *self.handlers.write().await = Arc::new(handlers);
        report
    }

    /// Drop all registered handlers.
    pub async fn clear(&self) {
        *self.handlers.write().await = Arc::new(Vec::new());
    }

    /// Find the handler for a request, if any.
    ///
    /// Handlers are tested in registration order and the first match wins,
    /// deterministically, even when templates overlap. `None` means the
    /// request should proceed to the real network.
    pub async fn resolve(&self, method: HttpMethod, path: &str) -> Option<ResolvedHandler> {
        let handlers = Arc::clone(&*self.handlers.read().await);
        for handler in handlers.iter() {
            if handler.method != method {
                continue;
            }
            if let Some(path_params) = handler.pattern.matches(path) {
                return Some(ResolvedHandler {
                    api_id: handler.api_id.clone(),
                    case_id: handler.case.case_id.clone(),
                    status: handler.case.status,
                    headers: handler.case.headers.clone(),
                    body: handler.case.body.clone(),
                    delay_ms: handler.case.delay_ms,
                    path_params,
                });
            }
        }
        None
    }

    /// Number of APIs currently contributing a handler. Observability only.
    pub async fn handler_count(&self) -> usize {
        self.handlers.read().await.len()
    }
}
