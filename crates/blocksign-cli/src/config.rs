//! CLI configuration: TOML file plus environment variable overrides.
//!
//! Priority: environment variables > config file > defaults.

use anyhow::{Context, Result};
use blocksign_client::{DEFAULT_API_VERSION, DEFAULT_HOSTNAME};
use blocksign_core::crypto::DEFAULT_PIN_ITERATIONS;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub client: ClientSection,

    #[serde(default)]
    pub security: SecuritySection,

    #[serde(default)]
    pub log: LogSection,
}

/// Remote API settings
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientSection {
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// API version (1 or 2)
    #[serde(default = "default_version")]
    pub version: u32,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            hostname: default_hostname(),
            version: default_version(),
        }
    }
}

impl fmt::Debug for ClientSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSection")
            .field("api_key", &"<redacted>")
            .field("hostname", &self.hostname)
            .field("version", &self.version)
            .finish()
    }
}

/// PIN settings
#[derive(Clone, Serialize, Deserialize)]
pub struct SecuritySection {
    /// Secret PIN; prefer `BLOCKSIGN_PIN` over writing it to disk
    #[serde(default)]
    pub pin: Option<String>,

    #[serde(default = "default_iterations")]
    pub pbkdf2_iterations: u32,
}

impl Default for SecuritySection {
    fn default() -> Self {
        Self {
            pin: None,
            pbkdf2_iterations: default_iterations(),
        }
    }
}

impl fmt::Debug for SecuritySection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecuritySection")
            .field("pin", &self.pin.as_ref().map(|_| "<redacted>"))
            .field("pbkdf2_iterations", &self.pbkdf2_iterations)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSection {
    /// error, warn, info, debug, trace
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_hostname() -> String {
    DEFAULT_HOSTNAME.to_string()
}

fn default_version() -> u32 {
    DEFAULT_API_VERSION
}

fn default_iterations() -> u32 {
    DEFAULT_PIN_ITERATIONS
}

fn default_log_level() -> String {
    "warn".to_string()
}

const LOG_LEVELS: &[&str] = &["off", "error", "warn", "info", "debug", "trace"];

impl CliConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: CliConfig =
            toml::from_str(&contents).with_context(|| "Failed to parse TOML config")?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `BLOCKSIGN_API_KEY`
    /// - `BLOCKSIGN_PIN`
    /// - `BLOCKSIGN_HOSTNAME`
    /// - `BLOCKSIGN_API_VERSION`
    /// - `BLOCKSIGN_LOG_LEVEL`
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("BLOCKSIGN_API_KEY") {
            self.client.api_key = v;
        }
        if let Some(v) = lookup("BLOCKSIGN_PIN") {
            self.security.pin = Some(v);
        }
        if let Some(v) = lookup("BLOCKSIGN_HOSTNAME") {
            self.client.hostname = v;
        }
        if let Some(v) = lookup("BLOCKSIGN_API_VERSION") {
            if let Ok(version) = v.parse::<u32>() {
                self.client.version = version;
            }
        }
        if let Some(v) = lookup("BLOCKSIGN_LOG_LEVEL") {
            self.log.level = v;
        }
    }

    /// Validate that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.client.hostname.is_empty(),
            "client.hostname must not be empty"
        );
        anyhow::ensure!(
            matches!(self.client.version, 1 | 2),
            "client.version must be 1 or 2, got {}",
            self.client.version
        );
        anyhow::ensure!(
            self.security.pbkdf2_iterations >= 2,
            "security.pbkdf2_iterations must be >= 2"
        );
        if let Some(ref pin) = self.security.pin {
            anyhow::ensure!(!pin.is_empty(), "security.pin must not be empty when set");
        }
        anyhow::ensure!(
            LOG_LEVELS.contains(&self.log.level.to_lowercase().as_str()),
            "log.level must be one of {}",
            LOG_LEVELS.join(", ")
        );
        Ok(())
    }

    /// The PIN, or an error naming where to set it.
    pub fn pin(&self) -> Result<&str> {
        self.security
            .pin
            .as_deref()
            .context("No Secret PIN configured (set security.pin or BLOCKSIGN_PIN)")
    }
}
