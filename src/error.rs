//! Error types for configuration, store, and interception failures.

use crate::config::HttpMethod;
use thiserror::Error;

/// Errors detected while validating or compiling a mock definition.
///
/// These are always localized to a single API: at rebuild time a bad
/// definition is recorded and skipped, it never aborts the rest of the
/// batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("path template cannot be empty")]
    EmptyPath,

    #[error("empty parameter name in path template `{template}`")]
    EmptyParamName { template: String },

    #[error("status code {0} is not in the allowed set")]
    DisallowedStatus(u16),

    #[error("duplicate case id `{0}`")]
    DuplicateCaseId(String),
}

/// Errors returned by the configuration store's CRUD operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("no API with id `{0}`")]
    UnknownApi(String),

    #[error("no case with id `{case_id}` on API `{api_id}`")]
    UnknownCase { api_id: String, case_id: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors surfaced by the interception adapter.
///
/// A resolution miss is not an error; it only becomes one when the
/// unhandled-request policy is set to reject instead of bypass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InterceptError {
    #[error("no mock handler for {method} {path} and unhandled requests are rejected")]
    Unhandled { method: HttpMethod, path: String },

    #[error("transport error: {0}")]
    Transport(String),
}
