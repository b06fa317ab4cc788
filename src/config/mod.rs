// ABOUTME: Configuration types and parsing for reimage.yml.
// ABOUTME: Handles YAML parsing, env var interpolation, and conversion to runtime and update settings.

mod env_value;
mod init;

pub use env_value::EnvValue;
pub use init::init_config;

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::runtime::{RuntimeConfig, RuntimeType};
use crate::update::UpdateSettings;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "reimage.yml";
pub const CONFIG_FILENAME_ALT: &str = "reimage.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".reimage/config.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Engine flavor; auto-detected when omitted.
    #[serde(default)]
    pub runtime: Option<RuntimeType>,

    /// Control socket path; auto-detected when omitted.
    #[serde(default)]
    pub socket: Option<EnvValue>,

    /// Policy for every engine call of an update.
    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub prune: PruneConfig,

    /// Also replace stopped containers of the old image.
    #[serde(default = "default_include_stopped")]
    pub include_stopped: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            runtime: None,
            socket: None,
            retry: RetryPolicy::default(),
            prune: PruneConfig::default(),
            include_stopped: default_include_stopped(),
        }
    }
}

/// Pruning of dangling images after a complete update.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PruneConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_prune_retries")]
    pub retries: u32,

    #[serde(default = "default_prune_delay", with = "humantime_serde")]
    pub delay: Duration,
}

impl Default for PruneConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            retries: default_prune_retries(),
            delay: default_prune_delay(),
        }
    }
}

impl PruneConfig {
    /// Policy to prune with, or `None` when pruning is off.
    pub fn policy(&self) -> Option<RetryPolicy> {
        self.enabled
            .then(|| RetryPolicy::new(self.retries, self.delay))
    }
}

fn default_include_stopped() -> bool {
    true
}

fn default_prune_retries() -> u32 {
    1
}

fn default_prune_delay() -> Duration {
    Duration::from_secs(2)
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading config");
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Like `discover`, but a missing file means defaults.
    pub fn discover_or_default(dir: &Path) -> Result<Self> {
        match Self::discover(dir) {
            Err(Error::ConfigNotFound(_)) => Ok(Self::default()),
            other => other,
        }
    }

    /// Runtime selection with the socket resolved from the environment.
    pub fn runtime_config(&self) -> Result<RuntimeConfig> {
        let socket = self.socket.as_ref().map(EnvValue::resolve).transpose()?;
        if socket.as_deref().is_some_and(|s| s.trim().is_empty()) {
            return Err(Error::InvalidConfig("socket path is empty".to_string()));
        }
        Ok(RuntimeConfig {
            runtime: self.runtime,
            socket,
        })
    }

    pub fn update_settings(&self) -> UpdateSettings {
        UpdateSettings {
            retry: self.retry,
            prune: self.prune.policy(),
            include_stopped: self.include_stopped,
        }
    }
}
