use std::fs;
use std::path::Path;
use std::time::Duration;

use semver::Version;
use serde::Deserialize;
use thiserror::Error;

use crate::commit::{CommitRequest, PollSettings};
use crate::reconcile::RefreshOptions;

/// Library defaults, normally loaded from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    /// Schema version assumed for trees built without a live device.
    pub schema_version: String,
    #[serde(default)]
    pub commit: CommitSettings,
    #[serde(default)]
    pub refresh: RefreshSettings,
}

/// Commit polling defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CommitSettings {
    pub interval_ms: u64,
    pub timeout_secs: u64,
    pub sync: bool,
    pub sync_all: bool,
    pub exception: bool,
}

impl Default for CommitSettings {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            timeout_secs: 600,
            sync: false,
            sync_all: false,
            exception: false,
        }
    }
}

/// Device refresh defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RefreshSettings {
    pub only_connected: bool,
    pub expand_vsys: bool,
    pub include_device_groups: bool,
    pub running_config: bool,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            only_connected: false,
            expand_vsys: true,
            include_device_groups: true,
            running_config: false,
        }
    }
}

/// Errors returned when loading settings files.
#[derive(Debug, Error)]
pub enum SettingsLoadError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid schema_version {value:?} in {path}: {source}")]
    Version {
        path: String,
        value: String,
        source: semver::Error,
    },
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, SettingsLoadError> {
        let raw = fs::read_to_string(path).map_err(|source| SettingsLoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        parse_settings(&raw, path.display().to_string())
    }

    /// Built-in defaults.
    pub fn embedded() -> Self {
        let embedded = include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/settings/default.toml"
        ));
        parse_settings(embedded, "embedded settings".to_string()).unwrap_or_else(|_| Self {
            schema_version: "8.0.0".to_string(),
            commit: CommitSettings::default(),
            refresh: RefreshSettings::default(),
        })
    }

    /// Parsed [`Settings::schema_version`].
    ///
    /// Always valid for loaded settings; falls back to 0.0.0 for values
    /// built by hand.
    pub fn version(&self) -> Version {
        Version::parse(&self.schema_version).unwrap_or_else(|_| Version::new(0, 0, 0))
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(self.commit.interval_ms),
            timeout: Duration::from_secs(self.commit.timeout_secs),
        }
    }

    /// A commit request carrying the configured sync/exception defaults.
    pub fn commit_request(&self) -> CommitRequest {
        CommitRequest {
            sync: self.commit.sync,
            sync_all: self.commit.sync_all,
            exception: self.commit.exception,
            ..CommitRequest::default()
        }
    }

    pub fn refresh_options(&self) -> RefreshOptions {
        RefreshOptions {
            only_connected: self.refresh.only_connected,
            expand_vsys: self.refresh.expand_vsys,
            include_device_groups: self.refresh.include_device_groups,
            running_config: self.refresh.running_config,
            ..RefreshOptions::default()
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::embedded()
    }
}

fn parse_settings(raw: &str, path: String) -> Result<Settings, SettingsLoadError> {
    let settings: Settings = toml::from_str(raw).map_err(|source| SettingsLoadError::Parse {
        path: path.clone(),
        source,
    })?;
    Version::parse(&settings.schema_version).map_err(|source| SettingsLoadError::Version {
        path,
        value: settings.schema_version.clone(),
        source,
    })?;
    Ok(settings)
}
