// Centralized configuration for ChatBridge

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::pipeline::StagingLayout;
use crate::validation::{ValidationError, ValidationResult};

/// ChatBridge configuration with support for a TOML file and environment overrides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatbridgeConfig {
    /// Base directory for staging data (default: ~/ChatBridge)
    pub staging_dir: PathBuf,

    /// Seconds between device polls
    pub poll_interval_secs: u64,

    /// Upper bound for a single detection tool run
    pub detection_timeout_secs: u64,

    /// Upper bound for pulling the source backup
    pub backup_timeout_secs: u64,

    /// Upper bound for restoring onto the target device
    pub restore_timeout_secs: u64,

    /// Pause after each stage so progress stays visible (0 disables)
    pub stage_delay_ms: u64,

    /// How long the completed state stays visible before running clears
    pub settle_delay_ms: u64,
}

impl Default for ChatbridgeConfig {
    fn default() -> Self {
        let staging_dir = dirs::home_dir()
            .map(|home| home.join("ChatBridge"))
            .unwrap_or_else(|| PathBuf::from("/tmp/chatbridge"));

        Self {
            staging_dir,
            poll_interval_secs: 3,
            detection_timeout_secs: 10,
            backup_timeout_secs: 30 * 60,
            restore_timeout_secs: 60 * 60,
            stage_delay_ms: 1000,
            settle_delay_ms: 2000,
        }
    }
}

impl ChatbridgeConfig {
    /// Create a configuration from defaults, the user config file and the environment
    ///
    /// Supported environment variables:
    /// - CHATBRIDGE_STAGING_DIR: Override staging directory
    /// - CHATBRIDGE_POLL_INTERVAL_SECS: Override device poll interval
    /// - CHATBRIDGE_DETECTION_TIMEOUT_SECS: Override detection timeout
    /// - CHATBRIDGE_BACKUP_TIMEOUT_SECS: Override source backup timeout
    /// - CHATBRIDGE_RESTORE_TIMEOUT_SECS: Override target restore timeout
    /// - CHATBRIDGE_STAGE_DELAY_MS: Override per-stage delay
    /// - CHATBRIDGE_SETTLE_DELAY_MS: Override completion settle delay
    pub fn new() -> anyhow::Result<Self> {
        let mut config = match Self::default_config_path() {
            Some(path) if path.exists() => Self::load_from_file(&path)?,
            _ => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.ensure_valid("environment")?;
        Ok(config)
    }

    /// Load from an explicit TOML file, then apply environment overrides
    pub fn with_file(path: &Path) -> anyhow::Result<Self> {
        let mut config = Self::load_from_file(path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.ensure_valid("environment")?;
        Ok(config)
    }

    /// Location of the per-user config file
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("chatbridge").join("config.toml"))
    }

    /// Load configuration from a TOML file; missing keys keep their defaults
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: ChatbridgeConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.ensure_valid(&path.display().to_string())?;
        Ok(config)
    }

    /// Serialize the configuration as TOML
    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Apply overrides from a key lookup (normally the process environment)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("CHATBRIDGE_STAGING_DIR") {
            self.staging_dir = PathBuf::from(dir);
        }

        let numeric = [
            ("CHATBRIDGE_POLL_INTERVAL_SECS", &mut self.poll_interval_secs),
            (
                "CHATBRIDGE_DETECTION_TIMEOUT_SECS",
                &mut self.detection_timeout_secs,
            ),
            ("CHATBRIDGE_BACKUP_TIMEOUT_SECS", &mut self.backup_timeout_secs),
            (
                "CHATBRIDGE_RESTORE_TIMEOUT_SECS",
                &mut self.restore_timeout_secs,
            ),
            ("CHATBRIDGE_STAGE_DELAY_MS", &mut self.stage_delay_ms),
            ("CHATBRIDGE_SETTLE_DELAY_MS", &mut self.settle_delay_ms),
        ];

        for (key, field) in numeric {
            if let Some(raw) = lookup(key) {
                match raw.trim().parse::<u64>() {
                    Ok(value) => *field = value,
                    Err(_) => log::warn!("Ignoring {key}={raw:?}: not a whole number"),
                }
            }
        }
    }

    /// Check every field, collecting all problems
    pub fn validate(&self) -> ValidationResult {
        let mut errors = Vec::new();

        if !(1..=3600).contains(&self.poll_interval_secs) {
            errors.push(ValidationError::new(
                "poll_interval_secs",
                "Poll interval must be between 1 and 3600 seconds",
            ));
        }

        for (field, value) in [
            ("detection_timeout_secs", self.detection_timeout_secs),
            ("backup_timeout_secs", self.backup_timeout_secs),
            ("restore_timeout_secs", self.restore_timeout_secs),
        ] {
            if value == 0 {
                errors.push(ValidationError::new(field, "Timeout must be greater than zero"));
            }
        }

        if !self.staging_dir.is_absolute() {
            errors.push(ValidationError::new(
                "staging_dir",
                "Staging directory must be an absolute path",
            ));
        } else if self
            .staging_dir
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            errors.push(ValidationError::new(
                "staging_dir",
                "Staging directory cannot contain '..'",
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn ensure_valid(&self, origin: &str) -> anyhow::Result<()> {
        self.validate().map_err(|errors| {
            let joined = errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            anyhow::anyhow!("Invalid configuration in {}: {}", origin, joined)
        })
    }

    pub fn staging_layout(&self) -> StagingLayout {
        StagingLayout::new(&self.staging_dir)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn detection_timeout(&self) -> Duration {
        Duration::from_secs(self.detection_timeout_secs)
    }

    pub fn backup_timeout(&self) -> Duration {
        Duration::from_secs(self.backup_timeout_secs)
    }

    pub fn restore_timeout(&self) -> Duration {
        Duration::from_secs(self.restore_timeout_secs)
    }

    pub fn stage_delay(&self) -> Duration {
        Duration::from_millis(self.stage_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}
