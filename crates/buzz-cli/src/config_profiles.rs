//! Persistent CLI configuration.

use std::fmt;
use std::path::{Path, PathBuf};

use buzz_core::config::SyncConfig;
use buzz_core::session::Credential;
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "config.json";
const TOKEN_ENV: &str = "GITHUB_TOKEN";

#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub sync: SyncConfig,
}

impl fmt::Debug for CliConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CliConfig")
            .field("version", &self.version)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("sync", &self.sync)
            .finish()
    }
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("buzz")
        .join(CONFIG_FILE_NAME)
}

pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    buzz_core::util::normalize_text_option(value)
}

impl CliConfig {
    pub fn load() -> Result<Self, String> {
        Self::load_from_path(&default_config_path())
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self {
                version: default_config_version(),
                ..Self::default()
            });
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut config = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, String> {
        let path = default_config_path();
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    /// `GITHUB_TOKEN` wins over the stored token.
    pub fn credential(&self) -> Option<Credential> {
        normalize_text_option(std::env::var(TOKEN_ENV).ok())
            .or_else(|| self.token.clone())
            .and_then(|token| Credential::new(token).ok())
    }

    /// Stored sync settings with environment overrides applied, validated.
    pub fn effective_sync(&self) -> Result<SyncConfig, String> {
        let sync = self.sync.clone().with_env_overrides();
        sync.validate().map_err(|error| error.to_string())?;
        Ok(sync)
    }

    fn normalize(&mut self) {
        self.token = normalize_text_option(self.token.take());
        self.sync.api_base_url = self.sync.api_base_url.trim().trim_end_matches('/').to_string();
    }
}
