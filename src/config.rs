use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::notifications::NotificationSetting;
use crate::polling::PollingTiers;
use crate::service::ServiceOptions;

/// Configuration file structure for cipewatch.
///
/// Configuration files are loaded from the current directory, the user config
/// directory, or a specified path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Where CIPE snapshots come from
    #[serde(default)]
    pub source: SourceConfig,

    /// Notification preferences
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Polling intervals per tier
    #[serde(default)]
    pub polling: PollingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourceConfig {
    /// JSON feed document re-read on every poll
    pub snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NotificationConfig {
    /// Which notifications to show: all, errors or none
    #[serde(default)]
    pub setting: NotificationSetting,

    /// How long a failed CIPE waits for an AI fix before the failure is reported
    #[serde(default = "default_ai_fix_wait_secs")]
    pub ai_fix_wait_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PollingConfig {
    /// Interval after an authentication error
    #[serde(default = "default_sleep_secs")]
    pub sleep_secs: u64,

    /// Interval when nothing is running
    #[serde(default = "default_cold_secs")]
    pub cold_secs: u64,

    /// Interval while a CIPE is in progress
    #[serde(default = "default_hot_secs")]
    pub hot_secs: u64,

    /// Interval while an AI fix is in the works
    #[serde(default = "default_ai_fix_secs")]
    pub ai_fix_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            setting: NotificationSetting::default(),
            ai_fix_wait_secs: default_ai_fix_wait_secs(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            sleep_secs: default_sleep_secs(),
            cold_secs: default_cold_secs(),
            hot_secs: default_hot_secs(),
            ai_fix_secs: default_ai_fix_secs(),
        }
    }
}

/// Upper bound for the AI fix wait window: one week.
const MAX_AI_FIX_WAIT_SECS: i64 = 7 * 24 * 60 * 60;

/// Shortest polling interval. Zero would re-read the source in a busy loop.
const MIN_INTERVAL_SECS: u64 = 1;

fn default_ai_fix_wait_secs() -> u64 {
    5 * 60
}

fn default_sleep_secs() -> u64 {
    60 * 60
}

fn default_cold_secs() -> u64 {
    3 * 60
}

fn default_hot_secs() -> u64 {
    10
}

fn default_ai_fix_secs() -> u64 {
    3
}

impl PollingConfig {
    pub fn tiers(&self) -> PollingTiers {
        let interval = |secs: u64| Duration::from_secs(secs.max(MIN_INTERVAL_SECS));
        PollingTiers {
            sleep: interval(self.sleep_secs),
            cold: interval(self.cold_secs),
            hot: interval(self.hot_secs),
            ai_fix: interval(self.ai_fix_secs),
        }
    }

    fn intervals(&self) -> [(&'static str, u64); 4] {
        [
            ("sleep-secs", self.sleep_secs),
            ("cold-secs", self.cold_secs),
            ("hot-secs", self.hot_secs),
            ("ai-fix-secs", self.ai_fix_secs),
        ]
    }
}

impl NotificationConfig {
    /// The configured wait window, capped at one week.
    pub fn ai_fix_wait(&self) -> chrono::Duration {
        let secs = i64::try_from(self.ai_fix_wait_secs)
            .map_or(MAX_AI_FIX_WAIT_SECS, |secs| secs.min(MAX_AI_FIX_WAIT_SECS));
        chrono::Duration::seconds(secs)
    }
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./cipewatch.toml
    /// 3. ./cipewatch.json
    /// 4. ./cipewatch.yaml
    /// 5. ./cipewatch.yml
    /// 6. `<config dir>/cipewatch/config.toml`
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let candidates = [
            "cipewatch.toml",
            "cipewatch.json",
            "cipewatch.yaml",
            "cipewatch.yml",
        ];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        if let Some(path) = Self::user_config_path().filter(|path| path.exists()) {
            return Self::load_from_path(&path);
        }

        Ok(Self::default())
    }

    /// `<config dir>/cipewatch/config.toml`, if the platform has a config directory.
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("cipewatch").join("config.toml"))
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        let config: Self = match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (key, secs) in self.polling.intervals() {
            anyhow::ensure!(
                secs >= MIN_INTERVAL_SECS,
                "polling.{key} must be at least {MIN_INTERVAL_SECS} second"
            );
        }
        Ok(())
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("yaml") | Some("yml") => serde_yaml::to_string(self)?,
            _ => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn service_options(&self) -> ServiceOptions {
        ServiceOptions {
            tiers: self.polling.tiers(),
            ai_fix_wait: self.notifications.ai_fix_wait(),
            notification_setting: self.notifications.setting,
        }
    }
}
