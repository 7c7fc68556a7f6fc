//! Mock definitions and server settings.
//!
//! Field names serialize in camelCase so that configuration produced by
//! editor/persistence collaborators (a JSON array of API definitions) is
//! accepted as-is.

use crate::error::ConfigError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Status codes a response case may use.
pub const ALLOWED_STATUS_CODES: &[u16] = &[
    200, 201, 202, 204, 301, 302, 304, 400, 401, 403, 404, 405, 409, 410, 422, 429, 500, 501, 502,
    503, 504,
];

/// Returns true if `status` is in the allowed set.
pub fn is_allowed_status(status: u16) -> bool {
    ALLOWED_STATUS_CODES.contains(&status)
}

/// HTTP methods a mock API can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Head,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Head => "HEAD",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "PATCH" => Ok(HttpMethod::Patch),
            "OPTIONS" => Ok(HttpMethod::Options),
            "HEAD" => Ok(HttpMethod::Head),
            other => Err(format!("unknown HTTP method `{other}`")),
        }
    }
}

/// One logical mock endpoint definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockApi {
    /// Unique stable identifier, assigned at creation, immutable.
    pub id: String,

    /// Display name, no behavioral effect.
    #[serde(default)]
    pub name: String,

    /// Display description, no behavioral effect.
    #[serde(default)]
    pub description: String,

    /// HTTP method this API answers.
    pub method: HttpMethod,

    /// Path template; `:name` segments match exactly one non-empty
    /// non-slash run of characters.
    pub path: String,

    /// Response cases; order matters only for display.
    #[serde(default)]
    pub cases: Vec<MockResponseCase>,

    /// Id of the currently selected case; when absent, the first case
    /// with `is_active` wins instead.
    #[serde(default)]
    pub active_case: Option<String>,

    /// Disabled APIs are invisible to the resolution engine.
    #[serde(default = "default_true")]
    pub is_enabled: bool,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl MockApi {
    /// Resolve the single active case for this API.
    ///
    /// Two-step resolution: the `active_case` id reference wins; if it is
    /// unset or dangling, fall back to the first case flagged `is_active`.
    /// `None` means the API contributes no handler, which is a normal
    /// transient configuration state, not an error.
    pub fn resolved_active_case(&self) -> Option<&MockResponseCase> {
        self.active_case
            .as_deref()
            .and_then(|id| self.cases.iter().find(|c| c.id == id))
            .or_else(|| self.cases.iter().find(|c| c.is_active))
    }

    /// Validate everything detectable without compiling the path template.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path.is_empty() {
            return Err(ConfigError::EmptyPath);
        }
        let mut seen = Vec::with_capacity(self.cases.len());
        for case in &self.cases {
            case.validate()?;
            if seen.contains(&case.id.as_str()) {
                return Err(ConfigError::DuplicateCaseId(case.id.clone()));
            }
            seen.push(&case.id);
        }
        Ok(())
    }
}

/// One possible response for a mock API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockResponseCase {
    /// Unique within the parent API.
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// HTTP status code, restricted to [`ALLOWED_STATUS_CODES`].
    #[serde(default = "default_status")]
    pub status: u16,

    /// Headers merged into the fabricated response.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// JSON payload returned verbatim.
    #[serde(default)]
    pub body: serde_json::Value,

    /// Simulated latency in milliseconds before the response is delivered.
    #[serde(default)]
    pub delay: Option<u64>,

    /// Fallback selector used when the parent API has no `active_case`.
    #[serde(default)]
    pub is_active: bool,
}

fn default_status() -> u16 {
    200
}

impl MockResponseCase {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_allowed_status(self.status) {
            return Err(ConfigError::DisallowedStatus(self.status));
        }
        Ok(())
    }
}

/// What to do with a request no handler matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnhandledPolicy {
    /// Forward the request to the real transport.
    #[default]
    Bypass,
    /// Reject the request instead of forwarding it.
    Error,
}

/// Server-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSettings {
    /// Prefix prepended to every API path when handlers are compiled.
    #[serde(default)]
    pub base_path: String,

    /// Policy for requests no handler matches.
    #[serde(default)]
    pub on_unhandled: UnhandledPolicy,

    /// Log matched requests.
    #[serde(default = "default_true")]
    pub log_matches: bool,

    /// Log unmatched requests.
    #[serde(default = "default_true")]
    pub log_unmatched: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            base_path: String::new(),
            on_unhandled: UnhandledPolicy::Bypass,
            log_matches: true,
            log_unmatched: true,
        }
    }
}

/// Top-level configuration: API definitions plus settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockConfig {
    #[serde(default)]
    pub apis: Vec<MockApi>,

    #[serde(default)]
    pub settings: ServerSettings,
}

impl MockConfig {
    /// Load configuration from a JSON or YAML file.
    ///
    /// A bare JSON array of API definitions (the shape the persistence
    /// collaborator produces) is accepted and wrapped with default
    /// settings.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        if is_yaml {
            Ok(serde_yaml::from_str(&content)?)
        } else {
            Self::from_json_str(&content)
        }
    }

    /// Parse either a `MockConfig` object or a bare array of [`MockApi`].
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        if value.is_array() {
            let apis: Vec<MockApi> = serde_json::from_value(value)?;
            Ok(Self {
                apis,
                settings: ServerSettings::default(),
            })
        } else {
            Ok(serde_json::from_value(value)?)
        }
    }

    /// Validate every definition, reporting one problem per offending API.
    pub fn validate(&self) -> Vec<(String, ConfigError)> {
        let mut problems = Vec::new();
        for api in &self.apis {
            if let Err(e) = api.validate() {
                problems.push((api.id.clone(), e));
            }
        }
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn case(id: &str, active: bool) -> MockResponseCase {
        MockResponseCase {
            id: id.to_string(),
            name: String::new(),
            description: String::new(),
            status: 200,
            headers: HashMap::new(),
            body: json!({"ok": true}),
            delay: None,
            is_active: active,
        }
    }

    fn api(cases: Vec<MockResponseCase>, active_case: Option<&str>) -> MockApi {
        MockApi {
            id: "a1".to_string(),
            name: String::new(),
            description: String::new(),
            method: HttpMethod::Get,
            path: "/api/users/:id".to_string(),
            cases,
            active_case: active_case.map(String::from),
            is_enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_active_case_by_id_wins_over_flag() {
        let api = api(vec![case("c1", true), case("c2", false)], Some("c2"));
        assert_eq!(api.resolved_active_case().map(|c| c.id.as_str()), Some("c2"));
    }

    #[test]
    fn test_dangling_active_case_falls_back_to_flag() {
        let api = api(vec![case("c1", false), case("c2", true)], Some("gone"));
        assert_eq!(api.resolved_active_case().map(|c| c.id.as_str()), Some("c2"));
    }

    #[test]
    fn test_no_active_case_resolves_none() {
        let api = api(vec![case("c1", false)], None);
        assert!(api.resolved_active_case().is_none());
    }

    #[test]
    fn test_disallowed_status_rejected() {
        let mut c = case("c1", true);
        c.status = 299;
        assert_eq!(c.validate(), Err(ConfigError::DisallowedStatus(299)));
    }

    #[test]
    fn test_duplicate_case_ids_rejected() {
        let api = api(vec![case("c1", true), case("c1", false)], None);
        assert_eq!(
            api.validate(),
            Err(ConfigError::DuplicateCaseId("c1".to_string()))
        );
    }

    #[test]
    fn test_parse_bare_json_array() {
        let json = r#"[
          {
            "id": "users",
            "method": "GET",
            "path": "/api/users/:id",
            "cases": [
              {"id": "ok", "status": 200, "body": {"ok": true}, "isActive": true}
            ],
            "isEnabled": true
          }
        ]"#;
        let config = MockConfig::from_json_str(json).unwrap();
        assert_eq!(config.apis.len(), 1);
        assert_eq!(config.apis[0].method, HttpMethod::Get);
        assert!(config.apis[0].resolved_active_case().is_some());
        assert_eq!(config.settings.on_unhandled, UnhandledPolicy::Bypass);
    }

    #[test]
    fn test_parse_config_object_with_settings() {
        let json = r#"{
          "apis": [],
          "settings": {"basePath": "/api", "onUnhandled": "error", "logMatches": false}
        }"#;
        let config = MockConfig::from_json_str(json).unwrap();
        assert_eq!(config.settings.base_path, "/api");
        assert_eq!(config.settings.on_unhandled, UnhandledPolicy::Error);
        assert!(!config.settings.log_matches);
    }

    #[test]
    fn test_parse_yaml_config() {
        let yaml = r#"
apis:
  - id: hello
    method: GET
    path: /hello
    cases:
      - id: ok
        status: 200
        body:
          message: "Hello, World!"
        isActive: true
"#;
        let config: MockConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.apis.len(), 1);
        assert_eq!(config.apis[0].cases[0].body["message"], "Hello, World!");
    }

    #[test]
    fn test_load_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mocks.json");
        std::fs::write(&path, r#"[{"id":"a","method":"GET","path":"/a"}]"#).unwrap();
        let config = MockConfig::from_file(&path).unwrap();
        assert_eq!(config.apis.len(), 1);
        assert!(config.apis[0].is_enabled);
    }

    #[test]
    fn test_load_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mocks.yaml");
        std::fs::write(&path, "apis:\n  - id: a\n    method: GET\n    path: /a\n").unwrap();
        let config = MockConfig::from_file(&path).unwrap();
        assert_eq!(config.apis.len(), 1);
        assert_eq!(config.apis[0].path, "/a");
    }

    #[test]
    fn test_method_round_trip() {
        for m in ["GET", "POST", "PUT", "DELETE", "PATCH", "OPTIONS", "HEAD"] {
            let parsed: HttpMethod = m.parse().unwrap();
            assert_eq!(parsed.to_string(), m);
        }
        assert!("FETCH".parse::<HttpMethod>().is_err());
    }
}
