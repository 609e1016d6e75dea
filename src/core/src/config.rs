use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{PullError, Result};

/// Default bound on a whole pull: 20 minutes.
pub const DEFAULT_TIMEOUT_SECS: u64 = 20 * 60;

/// Default staging directory, relative to the current directory.
pub const DEFAULT_WORK_DIR: &str = "./work";

/// Pull configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullConfig {
    /// Root under which store locations are derived
    pub cache_dir: PathBuf,

    /// Staging directory for fetched blobs (created by locate if missing)
    pub work_dir: PathBuf,

    /// Bound on the whole pipeline in seconds (0 = unlimited)
    pub timeout_secs: u64,

    /// Restrict discovery to this artifact type (None = any)
    pub artifact_type: Option<String>,

    /// Hash staged blobs and compare against their sha256 digest
    pub verify_digests: bool,
}

impl Default for PullConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            work_dir: PathBuf::from(DEFAULT_WORK_DIR),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            artifact_type: None,
            verify_digests: false,
        }
    }
}

impl PullConfig {
    /// Defaults overridden by `A3S_PULL_CACHE_DIR`, `A3S_PULL_WORK_DIR`
    /// and `A3S_PULL_TIMEOUT` (seconds).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(dir) = lookup("A3S_PULL_CACHE_DIR").filter(|v| !v.is_empty()) {
            config.cache_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("A3S_PULL_WORK_DIR").filter(|v| !v.is_empty()) {
            config.work_dir = PathBuf::from(dir);
        }
        if let Some(secs) = lookup("A3S_PULL_TIMEOUT").filter(|v| !v.is_empty()) {
            config.timeout_secs = secs.trim().parse().map_err(|_| {
                PullError::ConfigError(format!("A3S_PULL_TIMEOUT is not a number: {:?}", secs))
            })?;
        }

        Ok(config)
    }

    /// Timeout as a duration, `None` when unlimited.
    pub fn timeout(&self) -> Option<std::time::Duration> {
        (self.timeout_secs > 0).then(|| std::time::Duration::from_secs(self.timeout_secs))
    }
}

/// Platform cache directory, falling back to the system temp dir.
fn default_cache_dir() -> PathBuf {
    dirs::cache_dir().unwrap_or_else(std::env::temp_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PullConfig::default();
        assert_eq!(config.work_dir, PathBuf::from("./work"));
        assert_eq!(config.timeout_secs, 1200);
        assert!(config.artifact_type.is_none());
        assert!(!config.verify_digests);
    }

    #[test]
    fn test_env_overrides() {
        let config = PullConfig::from_lookup(lookup_from(&[
            ("A3S_PULL_CACHE_DIR", "/var/cache/a3s"),
            ("A3S_PULL_WORK_DIR", "/tmp/staging"),
            ("A3S_PULL_TIMEOUT", "30"),
        ]))
        .unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/var/cache/a3s"));
        assert_eq!(config.work_dir, PathBuf::from("/tmp/staging"));
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_empty_env_values_ignored() {
        let config = PullConfig::from_lookup(lookup_from(&[("A3S_PULL_WORK_DIR", "")])).unwrap();
        assert_eq!(config.work_dir, PathBuf::from(DEFAULT_WORK_DIR));
    }

    #[test]
    fn test_invalid_timeout() {
        let result = PullConfig::from_lookup(lookup_from(&[("A3S_PULL_TIMEOUT", "soon")]));
        assert!(matches!(result, Err(PullError::ConfigError(_))));
    }

    #[test]
    fn test_timeout_zero_is_unlimited() {
        let config = PullConfig {
            timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.timeout().is_none());
        assert_eq!(
            PullConfig::default().timeout(),
            Some(std::time::Duration::from_secs(1200))
        );
    }
}
