//! Configuration management for swgate

pub mod schema;

pub use schema::{Config, UpdatePolicy};

use crate::error::{SwgateError, SwgateResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("swgate")
            .join("config.toml")
    }

    /// Get the state directory path
    pub fn state_dir() -> PathBuf {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("swgate")
    }

    /// Get the lifecycle journal path
    pub fn audit_log_path() -> PathBuf {
        Self::state_dir().join("events.log")
    }

    /// Load configuration, falling back to defaults if not exists
    pub async fn load(&self) -> SwgateResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> SwgateResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| SwgateError::io(format!("reading config from {}", path.display()), e))?;

        let config: Config = toml::from_str(&content).map_err(|e| SwgateError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::validate(&config).map_err(|reason| SwgateError::ConfigInvalid {
            path: path.to_path_buf(),
            reason,
        })?;

        Ok(config)
    }

    /// Check semantic constraints that serde cannot express
    fn validate(config: &Config) -> Result<(), String> {
        if config.app.name.trim().is_empty() {
            return Err("app.name must not be empty".to_string());
        }
        url::Url::parse(&config.app.origin)
            .map_err(|e| format!("app.origin is not a URL: {}", e))?;
        config.manifest().validate().map_err(|e| e.to_string())?;
        if let Some(fallback) = &config.cache.offline_fallback {
            if !config.cache.precache.contains(fallback) {
                return Err(format!(
                    "cache.offline_fallback {} is not in the precache manifest",
                    fallback
                ));
            }
        }
        Ok(())
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> SwgateResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            SwgateError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> SwgateResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| SwgateError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_default_when_missing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nonexistent.toml");
        let manager = ConfigManager::with_path(path);

        let config = manager.load().await.unwrap();
        assert_eq!(config.app.name, "jobboard");
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        let manager = ConfigManager::with_path(path);

        let mut config = Config::default();
        config.app.name = "market".to_string();
        config.cache.version = 3;

        manager.save(&config).await.unwrap();
        let loaded = manager.load().await.unwrap();

        assert_eq!(loaded.bucket_name().to_string(), "market-v3");
    }

    #[tokio::test]
    async fn rejects_fallback_outside_manifest() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            "[cache]\noffline_fallback = \"/offline.html\"\n",
        )
        .unwrap();

        let err = ConfigManager::with_path(path).load().await.unwrap_err();
        assert!(matches!(err, SwgateError::ConfigInvalid { .. }));
        assert!(err.to_string().contains("offline_fallback"));
    }

    #[tokio::test]
    async fn rejects_bad_origin() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[app]\norigin = \"not a url\"\n").unwrap();

        let err = ConfigManager::with_path(path).load().await.unwrap_err();
        assert!(err.to_string().contains("app.origin"));
    }
}
