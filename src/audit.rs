//! Lifecycle event journal
//!
//! Writes JSON lines to `~/.local/state/swgate/events.log`: installs, failed
//! installs, activations, bucket garbage collection and update broadcasts.

use crate::config::{schema::Config, ConfigManager};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// File-based journal that appends JSON lines
#[derive(Debug, Clone)]
pub struct AuditLog {
    enabled: bool,
    path: PathBuf,
}

impl AuditLog {
    /// Create a journal from config
    pub fn new(config: &Config) -> Self {
        Self {
            enabled: config.general.audit_log,
            path: ConfigManager::audit_log_path(),
        }
    }

    /// Journal writing to an explicit file
    pub fn at(path: PathBuf) -> Self {
        Self {
            enabled: true,
            path,
        }
    }

    /// Journal that drops every event
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            path: PathBuf::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Log an event as a JSON line
    ///
    /// IO failures are logged and dropped; the journal never fails a lifecycle step.
    pub async fn log(&self, event: &str, data: &serde_json::Value) {
        if !self.enabled {
            return;
        }

        let entry = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event": event,
            "data": data,
        });

        let mut line = match serde_json::to_string(&entry) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to serialize journal event: {}", e);
                return;
            }
        };
        line.push('\n');

        if let Err(e) = self.append(&line).await {
            warn!("Failed to write journal: {}", e);
        }
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::disabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn writes_json_line() {
        let dir = TempDir::new().unwrap();
        let audit = AuditLog::at(dir.path().join("events.log"));

        audit
            .log(
                "worker.installed",
                &serde_json::json!({"bucket": "jobboard-v2"}),
            )
            .await;

        let content = tokio::fs::read_to_string(audit.path()).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(content.trim()).unwrap();

        assert_eq!(parsed["event"], "worker.installed");
        assert_eq!(parsed["data"]["bucket"], "jobboard-v2");
        assert!(parsed["timestamp"].is_string());
    }

    #[tokio::test]
    async fn appends_multiple_lines() {
        let dir = TempDir::new().unwrap();
        let audit = AuditLog::at(dir.path().join("nested").join("events.log"));

        audit.log("worker.installed", &serde_json::json!({})).await;
        audit.log("worker.activated", &serde_json::json!({})).await;

        let content = tokio::fs::read_to_string(audit.path()).await.unwrap();
        let lines: Vec<&str> = content.trim().lines().collect();
        assert_eq!(lines.len(), 2);
    }

    #[tokio::test]
    async fn skips_when_disabled() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.log");
        let mut config = Config::default();
        config.general.audit_log = false;
        let audit = AuditLog {
            path: path.clone(),
            ..AuditLog::new(&config)
        };

        audit.log("should.not.appear", &serde_json::json!({})).await;

        assert!(!path.exists());
    }
}
