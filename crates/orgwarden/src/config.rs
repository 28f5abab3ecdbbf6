use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use orgwarden_policy::EnforcerOptions;

use crate::error::{RootError, RootResult};

/// Engine behaviour knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnforcerConfig {
    /// Seed the owner role edges into every loaded snapshot. The policy
    /// file is only written by `orgwarden bootstrap`.
    #[serde(default = "default_bootstrap_owner_role")]
    pub bootstrap_owner_role: bool,
}

fn default_bootstrap_owner_role() -> bool {
    true
}

impl Default for EnforcerConfig {
    fn default() -> Self {
        Self {
            bootstrap_owner_role: default_bootstrap_owner_role(),
        }
    }
}

impl From<&EnforcerConfig> for EnforcerOptions {
    fn from(config: &EnforcerConfig) -> Self {
        EnforcerOptions {
            bootstrap_owner_role: config.bootstrap_owner_role,
        }
    }
}

/// Top-level configuration for the orgwarden binary.
///
/// Loaded from a TOML file (typically `~/.orgwarden/config.toml`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootConfig {
    /// Path to the CSV policy file.
    #[serde(default = "default_policy_file")]
    pub policy_file: PathBuf,

    /// Create an empty policy file instead of failing when it is missing.
    #[serde(default)]
    pub create_if_missing: bool,

    #[serde(default)]
    pub enforcer: EnforcerConfig,
}

fn default_policy_file() -> PathBuf {
    dirs_or_default(".orgwarden/policy.csv")
}

/// Returns `$HOME/<suffix>` if HOME is available, otherwise `./<suffix>`.
fn dirs_or_default(suffix: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(suffix))
        .unwrap_or_else(|_| PathBuf::from(suffix))
}

impl Default for RootConfig {
    fn default() -> Self {
        Self {
            policy_file: default_policy_file(),
            create_if_missing: false,
            enforcer: EnforcerConfig::default(),
        }
    }
}

impl RootConfig {
    /// Load configuration from a TOML file. If the file does not exist,
    /// returns a default configuration.
    pub fn load(path: &Path) -> RootResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file missing, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(RootError::Io)?;
        let config: RootConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> RootResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| RootError::Config(format!("TOML serialize error: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(RootError::Io)?;
        }
        std::fs::write(path, contents).map_err(RootError::Io)?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> RootResult<()> {
        if self.policy_file.as_os_str().is_empty() {
            return Err(RootError::Config("policy_file must not be empty".into()));
        }
        if self.policy_file.is_dir() {
            return Err(RootError::Config(format!(
                "policy_file '{}' is a directory",
                self.policy_file.display()
            )));
        }
        Ok(())
    }

    pub fn enforcer_options(&self) -> EnforcerOptions {
        EnforcerOptions::from(&self.enforcer)
    }

    /// Return the path to the default config file location.
    pub fn default_config_path() -> PathBuf {
        dirs_or_default(".orgwarden/config.toml")
    }
}
