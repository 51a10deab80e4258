//! # Portal Configuration
//!
//! YAML configuration for the portal binary. Every section and field has a
//! default, so a partial file (or none at all) is valid.
//!
//! ```yaml
//! server:
//!   bind_address: "127.0.0.1:3000"
//!   allowed_origin: "http://localhost:8080"
//!   static_dir: "frontend/dist"
//! storage:
//!   backend: sqlite            # or "memory"
//!   database_url: "sqlite:attendance.db"
//!   session_file: "session.json"
//!   seed_demo_data: true
//! realtime:
//!   max_reconnect_attempts: 5
//!   base_retry_delay_ms: 2000
//!   highlight_duration_ms: 2000
//!   conflict_policy: last_arrival_wins
//! attendance:
//!   zero_present_policy: warn_and_proceed
//! accounts:
//!   - id: "1"
//!     email: "faculty@portal.local"
//!     name: "Dr. Amit Sharma"
//!     password: "change-me-faculty"
//!     role: faculty
//!     subjects: ["CS301", "CS401"]
//! requests:
//!   sender: "portal@localhost"
//!   recipients: ["admin@localhost"]
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::domain::attendance_screen::ScreenSettings;
use crate::domain::auth_service::{default_accounts, AccountConfig};
use crate::domain::reconciliation::ConflictPolicy;
use crate::domain::request_service::RequestsConfig;
use crate::domain::sync_channel::RetryPolicy;
use crate::domain::ZeroPresentPolicy;
use crate::storage::connection::DEFAULT_DATABASE_URL;

pub const CONFIG_PATH_ENV: &str = "ATTENDANCE_PORTAL_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "portal.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub allowed_origin: String,
    /// Directory served for paths outside `/api`
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3000".to_string(),
            allowed_origin: "http://localhost:8080".to_string(),
            static_dir: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub database_url: String,
    /// Where the signed-in user is remembered; in memory when unset
    pub session_file: Option<PathBuf>,
    pub seed_demo_data: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            session_file: Some(PathBuf::from("session.json")),
            seed_demo_data: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    pub max_reconnect_attempts: u32,
    pub base_retry_delay_ms: u64,
    pub highlight_duration_ms: u64,
    pub conflict_policy: ConflictPolicy,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 5,
            base_retry_delay_ms: 2000,
            highlight_duration_ms: 2000,
            conflict_policy: ConflictPolicy::LastArrivalWins,
        }
    }
}

impl RealtimeConfig {
    pub fn screen_settings(&self) -> ScreenSettings {
        ScreenSettings {
            retry: RetryPolicy {
                max_attempts: self.max_reconnect_attempts,
                base_delay: Duration::from_millis(self.base_retry_delay_ms),
            },
            highlight_duration: Duration::from_millis(self.highlight_duration_ms),
            conflict_policy: self.conflict_policy,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttendanceConfig {
    pub zero_present_policy: ZeroPresentPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub realtime: RealtimeConfig,
    pub attendance: AttendanceConfig,
    pub accounts: Vec<AccountConfig>,
    pub requests: RequestsConfig,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            realtime: RealtimeConfig::default(),
            attendance: AttendanceConfig::default(),
            accounts: default_accounts(),
            requests: RequestsConfig::default(),
        }
    }
}

impl PortalConfig {
    /// Path from `ATTENDANCE_PORTAL_CONFIG`, or `portal.yaml`
    pub fn default_path() -> PathBuf {
        std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn load(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
        let config: PortalConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config YAML: {:?}", config_path))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_or_default(config_path: &Path) -> Self {
        match Self::load(config_path) {
            Ok(config) => {
                info!("Loaded configuration from {:?}", config_path);
                config
            }
            Err(e) => {
                warn!("Failed to load config from {:?}: {:#}", config_path, e);
                info!("Using default configuration");
                PortalConfig::default()
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.server.bind_address.trim().is_empty() {
            return Err(anyhow::anyhow!("server.bind_address is required"));
        }
        if self.storage.backend == StorageBackend::Sqlite && self.storage.database_url.trim().is_empty() {
            return Err(anyhow::anyhow!("storage.database_url is required for the sqlite backend"));
        }
        if self.realtime.base_retry_delay_ms == 0 {
            return Err(anyhow::anyhow!("realtime.base_retry_delay_ms must be positive"));
        }
        for account in &self.accounts {
            if account.email.trim().is_empty() || account.password.is_empty() {
                return Err(anyhow::anyhow!("Account {} needs an email and a password", account.id));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::UserRole;
    use tempfile::TempDir;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("portal.yaml");
        fs::write(
            &path,
            "storage:\n  backend: memory\nrealtime:\n  conflict_policy: keep_unsaved_local\nattendance:\n  zero_present_policy: block\n",
        )
        .unwrap();

        let config = PortalConfig::load(&path).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.realtime.max_reconnect_attempts, 5);
        assert_eq!(config.realtime.conflict_policy, ConflictPolicy::KeepUnsavedLocal);
        assert_eq!(config.attendance.zero_present_policy, ZeroPresentPolicy::Block);
        assert_eq!(config.accounts.len(), 2);
    }

    #[test]
    fn test_accounts_section() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("portal.yaml");
        fs::write(
            &path,
            r#"
accounts:
  - id: "9"
    email: "hod@college.edu"
    name: "Head of Department"
    password: "secret"
    role: admin
"#,
        )
        .unwrap();

        let config = PortalConfig::load(&path).unwrap();
        assert_eq!(config.accounts.len(), 1);
        assert_eq!(config.accounts[0].role, UserRole::Admin);
        assert!(config.accounts[0].subjects.is_empty());
    }

    #[test]
    fn test_broken_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("portal.yaml");
        fs::write(&path, "server: [not, a, map").unwrap();

        assert!(PortalConfig::load(&path).is_err());
        assert_eq!(PortalConfig::load_or_default(&path), PortalConfig::default());
        assert_eq!(
            PortalConfig::load_or_default(&dir.path().join("missing.yaml")),
            PortalConfig::default()
        );
    }

    #[test]
    fn test_screen_settings_from_realtime_section() {
        let realtime = RealtimeConfig {
            base_retry_delay_ms: 500,
            ..Default::default()
        };
        let settings = realtime.screen_settings();
        assert_eq!(settings.retry.delay_for(2), Duration::from_millis(2000));
        assert_eq!(settings.highlight_duration, Duration::from_millis(2000));
    }
}
