//! Policy index configuration loading and validation

use crate::error::{AuthzError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable overriding `build_timeout_ms`
pub const ENV_BUILD_TIMEOUT_MS: &str = "AUTHZ_BUILD_TIMEOUT_MS";

/// Environment variable overriding `max_parallel_builds`
pub const ENV_MAX_PARALLEL_BUILDS: &str = "AUTHZ_MAX_PARALLEL_BUILDS";

/// Policy index manager configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct IndexConfig {
    /// Upper bound for fetching edges and building one namespace
    #[serde(default = "default_build_timeout")]
    pub build_timeout_ms: u64,

    /// Concurrent namespace builds during `initialize`
    #[serde(default = "default_max_parallel_builds")]
    pub max_parallel_builds: usize,

    /// Channel name carrying invalidation messages
    #[serde(default = "default_invalidation_channel")]
    pub invalidation_channel: String,

    /// Buffered invalidation messages per subscriber
    #[serde(default = "default_invalidation_capacity")]
    pub invalidation_capacity: usize,
}

fn default_build_timeout() -> u64 { 30_000 }
fn default_max_parallel_builds() -> usize { num_cpus::get().max(1) }
fn default_invalidation_channel() -> String { "authz.policy.invalidate".to_string() }
fn default_invalidation_capacity() -> usize { 1024 }

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            build_timeout_ms: default_build_timeout(),
            max_parallel_builds: default_max_parallel_builds(),
            invalidation_channel: default_invalidation_channel(),
            invalidation_capacity: default_invalidation_capacity(),
        }
    }
}

impl IndexConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| AuthzError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| AuthzError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `AUTHZ_*` environment overrides
    pub fn apply_env_overrides(mut self) -> Result<Self> {
        if let Ok(value) = std::env::var(ENV_BUILD_TIMEOUT_MS) {
            self.build_timeout_ms = value.parse().map_err(|_| {
                AuthzError::Config(format!("{} must be an integer, got '{}'", ENV_BUILD_TIMEOUT_MS, value))
            })?;
        }

        if let Ok(value) = std::env::var(ENV_MAX_PARALLEL_BUILDS) {
            self.max_parallel_builds = value.parse().map_err(|_| {
                AuthzError::Config(format!("{} must be an integer, got '{}'", ENV_MAX_PARALLEL_BUILDS, value))
            })?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.build_timeout_ms == 0 {
            return Err(AuthzError::Config("build_timeout_ms must be greater than zero".to_string()));
        }

        if self.max_parallel_builds == 0 {
            return Err(AuthzError::Config("max_parallel_builds must be at least 1".to_string()));
        }

        if self.invalidation_capacity == 0 {
            return Err(AuthzError::Config("invalidation_capacity must be at least 1".to_string()));
        }

        if self.invalidation_channel.trim().is_empty() {
            return Err(AuthzError::Config("invalidation_channel must not be empty".to_string()));
        }

        Ok(())
    }

    pub fn build_timeout(&self) -> Duration {
        Duration::from_millis(self.build_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = IndexConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.build_timeout(), Duration::from_secs(30));
        assert!(config.max_parallel_builds >= 1);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = IndexConfig::from_toml("build_timeout_ms = 500\n").unwrap();

        assert_eq!(config.build_timeout_ms, 500);
        assert_eq!(config.invalidation_channel, "authz.policy.invalidate");
        assert_eq!(config.invalidation_capacity, 1024);
    }

    #[test]
    fn test_zero_parallelism_rejected() {
        let result = IndexConfig::from_toml("max_parallel_builds = 0\n");
        assert!(matches!(result, Err(AuthzError::Config(_))));
    }

    #[test]
    fn test_unparseable_toml_rejected() {
        let result = IndexConfig::from_toml("build_timeout_ms = \"soon\"\n");
        assert!(matches!(result, Err(AuthzError::Config(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_parallel_builds = 3").unwrap();
        writeln!(file, "invalidation_channel = \"iam.reload\"").unwrap();

        let config = IndexConfig::from_file(file.path()).unwrap();
        assert_eq!(config.max_parallel_builds, 3);
        assert_eq!(config.invalidation_channel, "iam.reload");
    }

    #[test]
    fn test_file_parse_error_names_path_once() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "build_timeout_ms = \"soon\"").unwrap();

        let message = IndexConfig::from_file(file.path()).unwrap_err().to_string();
        assert!(message.starts_with("Configuration error: "));
        assert!(message.contains(&file.path().display().to_string()));
        assert_eq!(message.matches("Configuration error").count(), 1);
    }

    #[test]
    fn test_missing_file() {
        let result = IndexConfig::from_file("/nonexistent/authz.toml");
        assert!(matches!(result, Err(AuthzError::Io(_))));
    }
}
