//! Path template compilation and matching.
//!
//! Turns a declared path template plus an optional base path into a
//! matchable pattern. Templates with `:name` segments compile to anchored
//! regexes; everything else is an exact string comparison. The regex never
//! leaves this module, so the matching strategy stays swappable.
//!
//! Matching is case-sensitive and byte-exact: trailing slashes are not
//! normalized, and callers must strip query strings before matching.

use crate::error::ConfigError;
use regex::Regex;
use std::collections::HashMap;

/// A compiled path pattern.
#[derive(Debug, Clone)]
pub enum PathPattern {
    /// Exact full-path comparison.
    Exact(String),
    /// Anchored regex with one capture per `:name` segment.
    Params(ParamPattern),
}

/// Anchored regex plus the parameter names its captures bind, in order.
#[derive(Debug, Clone)]
pub struct ParamPattern {
    regex: Regex,
    names: Vec<String>,
}

/// Compile a base path and template into a [`PathPattern`].
///
/// The base and template are joined with exactly one separating slash.
/// A `:name` segment matches one or more non-slash characters; the name is
/// everything after the colon up to the next `/`. An empty name is a
/// configuration error.
pub fn compile(base_path: &str, template: &str) -> Result<PathPattern, ConfigError> {
    if template.is_empty() {
        return Err(ConfigError::EmptyPath);
    }
    let full = join_paths(base_path, template);

    if !full.split('/').any(|seg| seg.starts_with(':')) {
        return Ok(PathPattern::Exact(full));
    }

    let mut pattern = String::from("^");
    let mut names = Vec::new();
    for (i, segment) in full.split('/').enumerate() {
        if i > 0 {
            pattern.push('/');
        }
        if let Some(name) = segment.strip_prefix(':') {
            if name.is_empty() {
                return Err(ConfigError::EmptyParamName {
                    template: template.to_string(),
                });
            }
            names.push(name.to_string());
            pattern.push_str("([^/]+)");
        } else {
            pattern.push_str(&regex::escape(segment));
        }
    }
    pattern.push('$');

    // Built from escaped literals and fixed capture groups only.
    let regex = Regex::new(&pattern).expect("escaped pattern always compiles");

    Ok(PathPattern::Params(ParamPattern { regex, names }))
}

/// Join base and template with exactly one separating slash.
fn join_paths(base: &str, template: &str) -> String {
    if base.is_empty() {
        return template.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        template.trim_start_matches('/')
    )
}

impl PathPattern {
    /// Test a request path against this pattern.
    ///
    /// Returns the captured parameters on a match (empty for exact
    /// patterns), `None` otherwise.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        match self {
            PathPattern::Exact(value) => (path == value).then(HashMap::new),
            PathPattern::Params(p) => p.regex.captures(path).map(|caps| {
                p.names
                    .iter()
                    .zip(caps.iter().skip(1))
                    .filter_map(|(name, cap)| {
                        cap.map(|m| (name.clone(), m.as_str().to_string()))
                    })
                    .collect()
            }),
        }
    }

    /// True if the pattern matches the path.
    pub fn is_match(&self, path: &str) -> bool {
        match self {
            PathPattern::Exact(value) => path == value,
            PathPattern::Params(p) => p.regex.is_match(path),
        }
    }
}
