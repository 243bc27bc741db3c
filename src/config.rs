use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::bands::BandClassifier;
use crate::models::{AlertPrefs, PostMealPrefs, RangeThresholds, ReminderSetting};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Configuration file metadata
    pub metadata: ConfigMetadata,

    /// Range classification band boundaries
    pub thresholds: RangeThresholds,

    /// Trend-derived threshold alert preferences
    pub alerts: AlertPrefs,

    /// Post-meal check preferences
    pub post_meal: PostMealPrefs,

    /// Configured reminders
    pub reminders: Vec<ReminderSetting>,
}

/// Configuration metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigMetadata {
    /// Configuration format version
    pub version: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let now = Utc::now();
        AppConfig {
            metadata: ConfigMetadata {
                version: "1.0".to_string(),
                created_at: now,
                updated_at: now,
            },
            thresholds: RangeThresholds::default(),
            alerts: AlertPrefs::default(),
            post_meal: PostMealPrefs::default(),
            reminders: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        BandClassifier::validate(&config.thresholds)
            .context("Invalid range thresholds in config")?;
        Ok(config)
    }

    /// Save configuration to a TOML file, stamping `updated_at`
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.metadata.updated_at = Utc::now();

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content =
            toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;
        Ok(())
    }

    /// Default configuration file location (`~/.glucors/config.toml`)
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".glucors")
            .join("config.toml")
    }

    /// Load from the default location, falling back to defaults when
    /// the file does not exist or does not parse
    pub fn load_or_default() -> Self {
        let path = Self::default_config_path();
        if path.exists() {
            Self::load_from_file(&path).unwrap_or_default()
        } else {
            Self::default()
        }
    }

    /// Save to the default location
    pub fn save_default(&mut self) -> Result<()> {
        self.save_to_file(Self::default_config_path())
    }

    /// Look a reminder up by id
    pub fn reminder(&self, id: &uuid::Uuid) -> Option<&ReminderSetting> {
        self.reminders.iter().find(|r| &r.id == id)
    }
}
