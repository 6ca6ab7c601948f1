//! Configuration schema for swgate
//!
//! Configuration is stored at `~/.config/swgate/config.toml`

use crate::cache::{BucketName, PrecacheManifest};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Application identity
    pub app: AppConfig,

    /// Precache settings
    pub cache: CacheConfig,

    /// Update handshake settings
    pub update: UpdateConfig,
}

impl Config {
    /// Name of the bucket the configured version installs into
    pub fn bucket_name(&self) -> BucketName {
        BucketName::new(self.app.name.clone(), self.cache.version)
    }

    /// The configured precache manifest
    pub fn manifest(&self) -> PrecacheManifest {
        PrecacheManifest::new(self.cache.precache.clone())
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Enable the lifecycle event journal
    pub audit_log: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            audit_log: true,
        }
    }
}

/// Application identity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Application name, used as the bucket prefix
    pub name: String,

    /// Origin the app is served from
    pub origin: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "jobboard".to_string(),
            origin: "http://localhost:3000".to_string(),
        }
    }
}

/// Precache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Version token; bump on every deploy that changes the manifest
    pub version: u32,

    /// Resources that must be cached during install
    pub precache: Vec<String>,

    /// Manifest entry served when a GET misses and the network is down
    pub offline_fallback: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            version: 1,
            precache: PrecacheManifest::default().entries().to_vec(),
            offline_fallback: None,
        }
    }
}

/// How a foreground context reacts to a waiting worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum UpdatePolicy {
    /// Surface the update and wait for an explicit apply
    #[default]
    Prompt,
    /// Send the skip-waiting signal as soon as the update is found
    Immediate,
}

/// Update handshake configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Reaction to a waiting worker
    pub policy: UpdatePolicy,

    /// Delay between the update notice and the reload
    pub reload_delay_ms: u64,

    /// Text carried by the update notice
    pub notice: String,
}

impl UpdateConfig {
    /// Reload delay as a duration
    pub fn reload_delay(&self) -> Duration {
        Duration::from_millis(self.reload_delay_ms)
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            policy: UpdatePolicy::Prompt,
            reload_delay_ms: 1000,
            notice: "A new version of the app is available. Reloading...".to_string(),
        }
    }
}
