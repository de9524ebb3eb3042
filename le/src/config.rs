//! Configuration for leader election

use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Result, eyre};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default election namespace
pub const DEFAULT_NAMESPACE: &str = "/election";

/// Default candidacy marker prefix
pub const DEFAULT_PREFIX: &str = "c_";

/// What the watch dispatcher does when a triggered re-election fails
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "policy")]
pub enum DispatchFailurePolicy {
    /// Stay undetermined until somebody calls `re_elect` again
    #[default]
    Undetermined,
    /// Re-run the election a bounded number of times with a fixed pause
    Retry {
        #[serde(rename = "max-attempts")]
        max_attempts: u32,
        #[serde(rename = "delay-ms")]
        delay_ms: u64,
    },
}

impl DispatchFailurePolicy {
    /// Pause between retries, if retrying at all
    pub fn retry_delay(&self) -> Option<Duration> {
        match self {
            DispatchFailurePolicy::Undetermined => None,
            DispatchFailurePolicy::Retry { delay_ms, .. } => Some(Duration::from_millis(*delay_ms)),
        }
    }
}

/// Leader election configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionConfig {
    /// Parent path under which candidacy markers are created
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Name prefix for this process's marker
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Channel buffer size for election commands
    #[serde(default = "default_command_buffer", rename = "command-buffer")]
    pub command_buffer: usize,

    /// Behaviour when a watch-triggered re-election fails
    #[serde(default, rename = "dispatch-failure")]
    pub dispatch_failure: DispatchFailurePolicy,
}

fn default_namespace() -> String {
    debug!("default_namespace: called");
    DEFAULT_NAMESPACE.to_string()
}

fn default_prefix() -> String {
    debug!("default_prefix: called");
    DEFAULT_PREFIX.to_string()
}

fn default_command_buffer() -> usize {
    debug!("default_command_buffer: called");
    64
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            prefix: default_prefix(),
            command_buffer: default_command_buffer(),
            dispatch_failure: DispatchFailurePolicy::default(),
        }
    }
}

impl ElectionConfig {
    /// Load config from file, or use defaults
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        debug!(?path, "ElectionConfig::load: called");
        if let Some(config_path) = path {
            let config = Self::from_file(config_path)?;
            config.validate()?;
            return Ok(config);
        }

        // Try default locations
        let default_paths = [
            dirs::config_dir().map(|p| p.join("leaderelect").join("config.yml")),
            Some(PathBuf::from("leaderelect.yml")),
        ];

        for path in default_paths.iter().flatten() {
            if path.exists() {
                debug!(path = %path.display(), "ElectionConfig::load: found config");
                let config = Self::from_file(path)?;
                config.validate()?;
                return Ok(config);
            }
        }

        Ok(ElectionConfig::default())
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ElectionConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the election cannot work with
    pub fn validate(&self) -> Result<()> {
        coordstore::path::validate(&self.namespace).map_err(|e| eyre!("Invalid namespace: {}", e))?;
        if self.prefix.contains('/') {
            return Err(eyre!("Marker prefix '{}' must not contain '/'", self.prefix));
        }
        if self.command_buffer == 0 {
            return Err(eyre!("command-buffer must be greater than zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = ElectionConfig::default();
        assert_eq!(config.namespace, "/election");
        assert_eq!(config.prefix, "c_");
        assert_eq!(config.command_buffer, 64);
        assert_eq!(config.dispatch_failure, DispatchFailurePolicy::Undetermined);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: ElectionConfig = serde_yaml::from_str("namespace: /services/scheduler\n").unwrap();
        assert_eq!(config.namespace, "/services/scheduler");
        assert_eq!(config.prefix, "c_");
        assert_eq!(config.dispatch_failure, DispatchFailurePolicy::Undetermined);
    }

    #[test]
    fn test_retry_policy_yaml() {
        let yaml = "dispatch-failure:\n  policy: retry\n  max-attempts: 3\n  delay-ms: 250\n";
        let config: ElectionConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            config.dispatch_failure,
            DispatchFailurePolicy::Retry {
                max_attempts: 3,
                delay_ms: 250
            }
        );
        assert_eq!(config.dispatch_failure.retry_delay(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = ElectionConfig {
            namespace: "election".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ElectionConfig {
            prefix: "a/b".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ElectionConfig {
            command_buffer: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yml");
        let config = ElectionConfig {
            namespace: "/jobs/election".to_string(),
            dispatch_failure: DispatchFailurePolicy::Retry {
                max_attempts: 5,
                delay_ms: 100,
            },
            ..Default::default()
        };

        config.save(&path).unwrap();
        let loaded = ElectionConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("absent.yml");
        assert!(ElectionConfig::load(Some(&path)).is_err());
    }
}
