//! Compiler configuration
//!
//! Loaded from a JSON file; every key is optional.
//!
//! ```text
//! {
//!   "all_field": "_all",
//!   "max_join_terms": 1024,
//!   "full_fidelity_joins": false,
//!   "bulk_terms_threshold": 1024,
//!   "estimate_cache_capacity": 1000,
//!   "max_rewrite_passes": 64,
//!   "invert_joins": true
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::estimate::DEFAULT_CACHE_CAPACITY;
use crate::observability::{log_event_with_fields, Event};

use super::errors::{CompileError, CompileResult};

/// Tunables for query compilation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Field name meaning "every field in the default full-text view"
    #[serde(default = "default_all_field")]
    pub all_field: String,

    /// Cap on join values materialized per shard
    #[serde(default = "default_max_join_terms")]
    pub max_join_terms: usize,

    /// Lift the join cap entirely
    #[serde(default)]
    pub full_fidelity_joins: bool,

    /// OR-arrays longer than this emit the bulk membership form
    #[serde(default = "default_bulk_terms_threshold")]
    pub bulk_terms_threshold: usize,

    /// Entries held by the shared count cache before it is cleared
    #[serde(default = "default_estimate_cache_capacity")]
    pub estimate_cache_capacity: usize,

    /// Passes any fixed-point rewrite may take before the query is rejected
    #[serde(default = "default_max_rewrite_passes")]
    pub max_rewrite_passes: usize,

    /// Allow selectivity-based join inversion
    #[serde(default = "default_invert_joins")]
    pub invert_joins: bool,
}

fn default_all_field() -> String {
    "_all".to_string()
}

fn default_max_join_terms() -> usize {
    1024
}

fn default_bulk_terms_threshold() -> usize {
    1024
}

fn default_estimate_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

fn default_max_rewrite_passes() -> usize {
    64
}

fn default_invert_joins() -> bool {
    true
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            all_field: default_all_field(),
            max_join_terms: default_max_join_terms(),
            full_fidelity_joins: false,
            bulk_terms_threshold: default_bulk_terms_threshold(),
            estimate_cache_capacity: default_estimate_cache_capacity(),
            max_rewrite_passes: default_max_rewrite_passes(),
            invert_joins: default_invert_joins(),
        }
    }
}

impl CompilerConfig {
    /// Reads and validates a config file
    pub fn load(path: &Path) -> CompileResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CompileError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| CompileError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;

        let path_text = path.display().to_string();
        log_event_with_fields(Event::ConfigLoaded, &[("path", path_text.as_str())]);
        Ok(config)
    }

    /// Rejects unusable limits
    pub fn validate(&self) -> CompileResult<()> {
        if self.all_field.trim().is_empty() {
            return Err(CompileError::Config("all_field must not be empty".into()));
        }
        if self.max_join_terms == 0 {
            return Err(CompileError::Config("max_join_terms must be positive".into()));
        }
        if self.bulk_terms_threshold == 0 {
            return Err(CompileError::Config("bulk_terms_threshold must be positive".into()));
        }
        if self.estimate_cache_capacity == 0 {
            return Err(CompileError::Config("estimate_cache_capacity must be positive".into()));
        }
        if self.max_rewrite_passes == 0 {
            return Err(CompileError::Config("max_rewrite_passes must be positive".into()));
        }
        Ok(())
    }

    /// Join cap passed to the store, `None` when unbounded
    pub fn join_term_limit(&self) -> Option<usize> {
        if self.full_fidelity_joins {
            None
        } else {
            Some(self.max_join_terms)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = CompilerConfig::default();
        assert_eq!(config.all_field, "_all");
        assert_eq!(config.max_join_terms, 1024);
        assert_eq!(config.estimate_cache_capacity, 1000);
        assert_eq!(config.join_term_limit(), Some(1024));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"full_fidelity_joins": true, "all_field": "everything"}}"#).unwrap();

        let config = CompilerConfig::load(file.path()).unwrap();
        assert_eq!(config.all_field, "everything");
        assert_eq!(config.join_term_limit(), None);
        assert_eq!(config.max_rewrite_passes, 64);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_rewrite_passes": 0}}"#).unwrap();
        assert!(matches!(CompilerConfig::load(file.path()), Err(CompileError::Config(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = CompilerConfig::load(Path::new("/nonexistent/aerosearch.json")).unwrap_err();
        assert!(err.to_string().contains("aerosearch.json"));
    }
}
