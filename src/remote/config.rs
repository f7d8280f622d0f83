//! Remote storage configuration.
//!
//! Loads and saves remote settings from `~/.stockbook/config.json`.
//! Environment variables take precedence over the file.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sync::file::atomic_write;

/// Contents of `config.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockbookConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteSettings>,
}

/// Where backups and product photos are stored remotely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSettings {
    /// Base URL of the object storage API, e.g.
    /// `https://storage.example.com/v0/b/my-bucket`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_base_url: Option<String>,
    /// Host that marks a photo URL as remote. Empty accepts any host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

/// Load configuration from `path`. A missing file is an empty config.
///
/// # Errors
///
/// Returns [`Error::Config`] if the file exists but cannot be read or parsed.
pub fn load_config_from(path: &Path) -> Result<StockbookConfig> {
    if !path.exists() {
        return Ok(StockbookConfig::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;

    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse config file: {e}")))
}

/// Save configuration to `path`.
///
/// # Errors
///
/// Returns [`Error::Config`] if the file cannot be written.
pub fn save_config_to(path: &Path, config: &StockbookConfig) -> Result<()> {
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

    atomic_write(path, content.as_bytes())
        .map_err(|e| Error::Config(format!("Failed to write config file: {e}")))
}

fn config_file() -> Result<std::path::PathBuf> {
    crate::config::config_path()
        .ok_or_else(|| Error::Config("Could not determine home directory".into()))
}

/// Load the configuration from the data root.
///
/// # Errors
///
/// Returns an error if the home directory is unknown or the file is invalid.
pub fn load_config() -> Result<StockbookConfig> {
    load_config_from(&config_file()?)
}

/// Merge `settings` into the stored remote settings. `None` fields keep the
/// stored value.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or saved.
pub fn save_remote_settings(settings: &RemoteSettings) -> Result<()> {
    let path = config_file()?;
    let mut config = load_config_from(&path)?;
    config.remote = Some(merge(settings, config.remote.unwrap_or_default()));
    save_config_to(&path, &config)
}

fn merge(new: &RemoteSettings, existing: RemoteSettings) -> RemoteSettings {
    RemoteSettings {
        storage_base_url: new.storage_base_url.clone().or(existing.storage_base_url),
        storage_domain: new.storage_domain.clone().or(existing.storage_domain),
        auth_token: new.auth_token.clone().or(existing.auth_token),
    }
}

/// Effective remote settings after applying environment overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedRemote {
    pub storage_base_url: Option<String>,
    pub storage_domain: String,
    pub auth_token: Option<String>,
}

impl ResolvedRemote {
    /// Priority: `STOCKBOOK_STORAGE_URL` / `STOCKBOOK_STORAGE_TOKEN` env
    /// vars, then the config file.
    #[must_use]
    pub fn resolve(config: &StockbookConfig) -> Self {
        let stored = config.remote.clone().unwrap_or_default();
        Self {
            storage_base_url: env_value("STOCKBOOK_STORAGE_URL").or(stored.storage_base_url),
            storage_domain: stored.storage_domain.unwrap_or_default(),
            auth_token: env_value("STOCKBOOK_STORAGE_TOKEN").or(stored.auth_token),
        }
    }

    /// Whether a remote backend is configured at all.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.storage_base_url.is_some()
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_default() {
        let temp = TempDir::new().unwrap();
        let config = load_config_from(&temp.path().join("config.json")).unwrap();
        assert_eq!(config, StockbookConfig::default());
    }

    #[test]
    fn test_round_trip_uses_camel_case() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        let config = StockbookConfig {
            remote: Some(RemoteSettings {
                storage_base_url: Some("https://storage.example.com/v0/b/shop".into()),
                storage_domain: Some("storage.example.com".into()),
                auth_token: None,
            }),
        };

        save_config_to(&path, &config).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("storageBaseUrl"));
        assert!(!raw.contains("authToken"));
        assert_eq!(load_config_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_config_from(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_merge_keeps_existing_values() {
        let existing = RemoteSettings {
            storage_base_url: Some("https://old".into()),
            storage_domain: Some("old".into()),
            auth_token: Some("secret".into()),
        };
        let update = RemoteSettings {
            storage_base_url: Some("https://new".into()),
            ..RemoteSettings::default()
        };

        let merged = merge(&update, existing);
        assert_eq!(merged.storage_base_url.as_deref(), Some("https://new"));
        assert_eq!(merged.auth_token.as_deref(), Some("secret"));
    }
}
