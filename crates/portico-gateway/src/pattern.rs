//! Compiles parameterized route templates and memoizes the result

use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// A template the compiler could not turn into a matcher
#[derive(Debug, Error)]
#[error("cannot compile route template '{template}': {source}")]
pub struct MatchingError {
    pub template: String,
    #[source]
    pub source: regex::Error,
}

/// Derived matcher for a parameterized template: the anchored regex plus the
/// capture names in template order
#[derive(Debug)]
pub struct CompiledPattern {
    pub regex: Regex,
    pub names: Vec<String>,
}

/// Append-only cache of compiled patterns, keyed by the raw template string.
///
/// Templates are immutable once a plugin is installed, so entries are never
/// invalidated. Two requests racing on the same first insertion may both
/// compile; the map still converges to one entry.
pub struct PatternCache {
    compiled: RwLock<HashMap<String, Arc<CompiledPattern>>>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self {
            compiled: RwLock::new(HashMap::new()),
        }
    }

    /// Get the compiled form of a template, compiling on first use
    pub fn resolve(&self, template: &str) -> Result<Arc<CompiledPattern>, MatchingError> {
        if let Ok(cache) = self.compiled.read() {
            if let Some(pattern) = cache.get(template) {
                return Ok(pattern.clone());
            }
        }

        let pattern = Arc::new(compile(template)?);
        if let Ok(mut cache) = self.compiled.write() {
            return Ok(cache
                .entry(template.to_string())
                .or_insert(pattern)
                .clone());
        }
        Ok(pattern)
    }

    /// Number of distinct templates compiled so far
    pub fn len(&self) -> usize {
        self.compiled.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PatternCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Turn a template into an anchored regex: each `:name` segment becomes a
/// `([^/]+)` capture, everything else is matched literally.
fn compile(template: &str) -> Result<CompiledPattern, MatchingError> {
    let mut source = String::from("^");
    let mut names = Vec::new();

    for (i, segment) in template.split('/').enumerate() {
        if i > 0 {
            source.push('/');
        }
        if let Some(name) = segment.strip_prefix(':') {
            names.push(name.to_string());
            source.push_str("([^/]+)");
        } else {
            source.push_str(&regex::escape(segment));
        }
    }
    source.push('$');

    let regex = Regex::new(&source).map_err(|source| MatchingError {
        template: template.to_string(),
        source,
    })?;
    Ok(CompiledPattern { regex, names })
}
