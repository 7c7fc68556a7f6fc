//! Configuration store: the sole owner of mock API definitions.
//!
//! All creation, mutation, and deletion goes through the store's CRUD
//! operations; every mutation stamps `updated_at` on the owning API and
//! bumps a revision published on a watch channel so the lifecycle
//! controller can rebuild handlers. The resolution engine only ever sees
//! disposable snapshots taken from here.

use crate::config::{
    HttpMethod, MockApi, MockConfig, MockResponseCase, ServerSettings,
};
use crate::error::StoreError;
use crate::matcher;
use chrono::Utc;
use rand::Rng;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::{watch, RwLock};
use tracing::debug;

/// Fields the caller provides when creating or updating an API.
/// Everything else (id, timestamps, cases) is owned by the store.
#[derive(Debug, Clone)]
pub struct ApiDraft {
    pub name: String,
    pub description: String,
    pub method: HttpMethod,
    pub path: String,
    pub is_enabled: bool,
}

/// Fields the caller provides when creating or updating a response case.
#[derive(Debug, Clone)]
pub struct CaseDraft {
    pub name: String,
    pub description: String,
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Value,
    pub delay: Option<u64>,
    pub is_active: bool,
}

impl Default for CaseDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            status: 200,
            headers: HashMap::new(),
            body: Value::Null,
            delay: None,
            is_active: false,
        }
    }
}

/// Thread-safe store of mock definitions with change notification.
pub struct ConfigStore {
    inner: RwLock<MockConfig>,
    revision: watch::Sender<u64>,
}

impl ConfigStore {
    pub fn new(config: MockConfig) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: RwLock::new(config),
            revision,
        }
    }

    /// Subscribe to configuration changes. Only the latest revision is
    /// retained, so rapid successive edits coalesce into one rebuild.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Full configuration snapshot (display/persistence surface).
    pub async fn snapshot(&self) -> MockConfig {
        self.inner.read().await.clone()
    }

    pub async fn apis(&self) -> Vec<MockApi> {
        self.inner.read().await.apis.clone()
    }

    pub async fn settings(&self) -> ServerSettings {
        self.inner.read().await.settings.clone()
    }

    pub async fn get_api(&self, id: &str) -> Option<MockApi> {
        self.inner.read().await.apis.iter().find(|a| a.id == id).cloned()
    }

    /// Create a new API definition. Validates the draft (path template
    /// compiles, no empty path) before anything is stored.
    pub async fn create_api(&self, draft: ApiDraft) -> Result<MockApi, StoreError> {
        matcher::compile("", &draft.path)?;

        let now = Utc::now();
        let api = MockApi {
            id: generate_id("api"),
            name: draft.name,
            description: draft.description,
            method: draft.method,
            path: draft.path,
            cases: Vec::new(),
            active_case: None,
            is_enabled: draft.is_enabled,
            created_at: now,
            updated_at: now,
        };

        let mut inner = self.inner.write().await;
        inner.apis.push(api.clone());
        drop(inner);

        debug!(api_id = %api.id, path = %api.path, "API created");
        self.bump();
        Ok(api)
    }

    /// Replace the editable fields of an API. Id, cases, and the active
    /// case selection are untouched.
    pub async fn update_api(&self, id: &str, draft: ApiDraft) -> Result<MockApi, StoreError> {
        matcher::compile("", &draft.path)?;

        let mut inner = self.inner.write().await;
        let api = find_api(&mut inner.apis, id)?;
        api.name = draft.name;
        api.description = draft.description;
        api.method = draft.method;
        api.path = draft.path;
        api.is_enabled = draft.is_enabled;
        api.updated_at = Utc::now();
        let updated = api.clone();
        drop(inner);

        self.bump();
        Ok(updated)
    }

    pub async fn delete_api(&self, id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let before = inner.apis.len();
        inner.apis.retain(|a| a.id != id);
        if inner.apis.len() == before {
            return Err(StoreError::UnknownApi(id.to_string()));
        }
        drop(inner);

        debug!(api_id = %id, "API deleted");
        self.bump();
        Ok(())
    }

    pub async fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let api = find_api(&mut inner.apis, id)?;
        api.is_enabled = enabled;
        api.updated_at = Utc::now();
        drop(inner);

        self.bump();
        Ok(())
    }

    /// Add a response case to an API.
    pub async fn add_case(
        &self,
        api_id: &str,
        draft: CaseDraft,
    ) -> Result<MockResponseCase, StoreError> {
        let case = MockResponseCase {
            id: generate_id("case"),
            name: draft.name,
            description: draft.description,
            status: draft.status,
            headers: draft.headers,
            body: draft.body,
            delay: draft.delay,
            is_active: draft.is_active,
        };
        case.validate()?;

        let mut inner = self.inner.write().await;
        let api = find_api(&mut inner.apis, api_id)?;
        api.cases.push(case.clone());
        api.updated_at = Utc::now();
        drop(inner);

        self.bump();
        Ok(case)
    }

    /// Replace the editable fields of a case.
    pub async fn update_case(
        &self,
        api_id: &str,
        case_id: &str,
        draft: CaseDraft,
    ) -> Result<MockResponseCase, StoreError> {
        if !crate::config::is_allowed_status(draft.status) {
            return Err(crate::error::ConfigError::DisallowedStatus(draft.status).into());
        }

        let mut inner = self.inner.write().await;
        let api = find_api(&mut inner.apis, api_id)?;
        let case = api
            .cases
            .iter_mut()
            .find(|c| c.id == case_id)
            .ok_or_else(|| StoreError::UnknownCase {
                api_id: api_id.to_string(),
                case_id: case_id.to_string(),
            })?;
        case.name = draft.name;
        case.description = draft.description;
        case.status = draft.status;
        case.headers = draft.headers;
        case.body = draft.body;
        case.delay = draft.delay;
        case.is_active = draft.is_active;
        api.updated_at = Utc::now();
        let updated = case.clone();
        drop(inner);

        self.bump();
        Ok(updated)
    }

    /// Delete a case. If it was the API's selected active case, the
    /// reference is cleared and resolution falls back to the flag.
    pub async fn delete_case(&self, api_id: &str, case_id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let api = find_api(&mut inner.apis, api_id)?;
        let before = api.cases.len();
        api.cases.retain(|c| c.id != case_id);
        if api.cases.len() == before {
            return Err(StoreError::UnknownCase {
                api_id: api_id.to_string(),
                case_id: case_id.to_string(),
            });
        }
        if api.active_case.as_deref() == Some(case_id) {
            api.active_case = None;
        }
        api.updated_at = Utc::now();
        drop(inner);

        self.bump();
        Ok(())
    }

    /// Select which case an API returns, or clear the selection.
    pub async fn set_active_case(
        &self,
        api_id: &str,
        case_id: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let api = find_api(&mut inner.apis, api_id)?;
        if let Some(case_id) = case_id {
            if !api.cases.iter().any(|c| c.id == case_id) {
                return Err(StoreError::UnknownCase {
                    api_id: api_id.to_string(),
                    case_id: case_id.to_string(),
                });
            }
            api.active_case = Some(case_id.to_string());
        } else {
            api.active_case = None;
        }
        api.updated_at = Utc::now();
        drop(inner);

        self.bump();
        Ok(())
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }
}

fn find_api<'a>(apis: &'a mut [MockApi], id: &str) -> Result<&'a mut MockApi, StoreError> {
    apis.iter_mut()
        .find(|a| a.id == id)
        .ok_or_else(|| StoreError::UnknownApi(id.to_string()))
}

/// Random, collision-unlikely id for store-created definitions.
fn generate_id(prefix: &str) -> String {
    let suffix: u64 = rand::thread_rng().gen();
    format!("{prefix}-{suffix:016x}")
}
