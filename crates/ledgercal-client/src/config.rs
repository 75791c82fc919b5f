//! Client and daemon configuration.
//!
//! Everything lives in one `config.toml`, by default at
//! `~/.config/ledgercal/config.toml`. A missing file means all defaults.
//!
//! ```toml
//! [database]
//! path = "/var/lib/ledgercal/ledgercal.db"
//!
//! [google]
//! access_token = "pass::google/calendar-token"
//! calendar_id = "primary"
//!
//! [sync]
//! window_past_days = 30
//! window_future_days = 365
//! max_concurrent_pushes = 4
//!
//! [dashboard]
//! invalidate_url = "http://localhost:8080/dashboard/invalidate"
//! ```
//!
//! The Google `access_token` accepts secret references (`pass::…`,
//! `env::…`), see [`crate::secret`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use ledgercal_core::SyncType;
use ledgercal_server::{OrchestratorConfig, SchedulerConfig, SyncDefaults};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

const APP_DIR: &str = "ledgercal";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub database: DatabaseSettings,
    pub google: GoogleSettings,
    pub sync: SyncSettings,
    pub dashboard: DashboardSettings,
    pub server: ServerSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQLite file; defaults to `<data dir>/ledgercal/ledgercal.db`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Google Calendar backend settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    /// OAuth access token (supports `pass::` and `env::` prefixes).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    pub calendar_id: String,
    pub timeout_secs: u64,
}

impl Default for GoogleSettings {
    fn default() -> Self {
        Self {
            access_token: None,
            calendar_id: "primary".to_string(),
            timeout_secs: 30,
        }
    }
}

#[cfg(feature = "google")]
impl GoogleSettings {
    /// Resolves the token and builds the backend configuration.
    pub fn to_provider_config(
        &self,
    ) -> Result<ledgercal_providers::google::GoogleConfig, String> {
        use ledgercal_providers::google::GoogleConfig;

        let raw = self.access_token.as_deref().ok_or_else(|| {
            format!(
                "Google access token not configured. Add to {}:\n  \
                 [google]\n  \
                 access_token = \"env::GOOGLE_CALENDAR_TOKEN\"",
                ClientConfig::default_path().display()
            )
        })?;
        let token = crate::secret::resolve(raw)
            .map_err(|e| format!("failed to resolve access_token: {e}"))?;

        let config =
            GoogleConfig::new(token).with_timeout(Duration::from_secs(self.timeout_secs));
        config.validate()?;
        Ok(config)
    }
}

/// Reconciliation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Pass type for `ledgercal sync` when `--type` is not given.
    pub sync_type: SyncType,
    pub include_anniversary_events: bool,
    pub window_past_days: u32,
    pub window_future_days: u32,
    pub max_concurrent_pushes: usize,
    /// Run scheduled passes from the daemon.
    pub background_enabled: bool,
    pub background_interval_secs: u64,
    /// Pass type of scheduled passes.
    pub background_sync_type: SyncType,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            sync_type: SyncType::All,
            include_anniversary_events: true,
            window_past_days: 30,
            window_future_days: 365,
            max_concurrent_pushes: 1,
            background_enabled: true,
            background_interval_secs: 6 * 60 * 60,
            background_sync_type: SyncType::Generated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardSettings {
    /// Endpoint notified after every finished pass; unset disables it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalidate_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            invalidate_url: None,
            timeout_secs: 5,
        }
    }
}

/// Daemon socket settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<PathBuf>,

    /// Client-side request timeout in seconds. A sync against a large
    /// calendar can take a while.
    pub timeout: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            socket_path: None,
            timeout: 120,
        }
    }
}

impl ClientConfig {
    /// Loads the default file, or defaults when it does not exist.
    pub fn load() -> ClientResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> ClientResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ClientError::config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the daemon could not run with.
    pub fn validate(&self) -> ClientResult<()> {
        if self.google.calendar_id.trim().is_empty() {
            return Err(ClientError::config("google.calendar_id must not be empty"));
        }
        if self.sync.max_concurrent_pushes == 0 {
            return Err(ClientError::config(
                "sync.max_concurrent_pushes must be at least 1",
            ));
        }
        if self.sync.background_interval_secs == 0 {
            return Err(ClientError::config(
                "sync.background_interval_secs must be greater than zero",
            ));
        }
        if self.sync.window_past_days == 0 && self.sync.window_future_days == 0 {
            return Err(ClientError::config("sync window must cover at least one day"));
        }
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }

    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }

    pub fn database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join("ledgercal.db"))
    }

    pub fn socket_path(&self) -> PathBuf {
        self.server
            .socket_path
            .clone()
            .unwrap_or_else(ledgercal_server::default_socket_path)
    }

    /// Defaults the daemon applies to `Sync` requests.
    pub fn sync_defaults(&self) -> SyncDefaults {
        let mut defaults = SyncDefaults::default()
            .with_calendar_id(&self.google.calendar_id)
            .with_window_days(self.sync.window_past_days, self.sync.window_future_days);
        defaults.sync_type = self.sync.sync_type;
        defaults.include_anniversary_events = self.sync.include_anniversary_events;
        defaults
    }

    /// Defaults of scheduled passes: same window, background pass type.
    pub fn background_defaults(&self) -> SyncDefaults {
        let mut defaults = self.sync_defaults();
        defaults.sync_type = self.sync.background_sync_type;
        defaults
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig::default().with_max_concurrent_pushes(self.sync.max_concurrent_pushes)
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::new(Duration::from_secs(self.sync.background_interval_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = ClientConfig::parse("").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.google.calendar_id, "primary");
        assert_eq!(config.sync.max_concurrent_pushes, 1);
        assert!(config.database_path().ends_with("ledgercal/ledgercal.db"));
    }

    #[test]
    fn full_file() {
        let config = ClientConfig::parse(
            r#"
[database]
path = "/tmp/ledgercal-test.db"

[google]
access_token = "env::TOKEN"
calendar_id = "team@example.com"
timeout_secs = 10

[sync]
sync_type = "generated"
include_anniversary_events = false
window_past_days = 7
window_future_days = 90
max_concurrent_pushes = 4
background_enabled = false
background_interval_secs = 3600

[dashboard]
invalidate_url = "http://localhost:8080/invalidate"

[server]
socket_path = "/tmp/ledgercal-test.sock"
timeout = 30
"#,
        )
        .unwrap();

        assert_eq!(config.database_path(), PathBuf::from("/tmp/ledgercal-test.db"));
        assert_eq!(config.socket_path(), PathBuf::from("/tmp/ledgercal-test.sock"));
        assert_eq!(config.google.timeout_secs, 10);
        assert!(!config.sync.background_enabled);
        assert_eq!(
            config.dashboard.invalidate_url.as_deref(),
            Some("http://localhost:8080/invalidate")
        );

        let defaults = config.sync_defaults();
        assert_eq!(defaults.calendar_id, "team@example.com");
        assert_eq!(defaults.sync_type, SyncType::Generated);
        assert!(!defaults.include_anniversary_events);
        assert_eq!((defaults.window_past_days, defaults.window_future_days), (7, 90));

        assert_eq!(config.orchestrator_config().max_concurrent_pushes, 4);
        assert_eq!(
            config.scheduler_config().sync_interval,
            Duration::from_secs(3600)
        );
    }

    #[test]
    fn scheduled_passes_default_to_generated() {
        let config = ClientConfig::default();
        assert_eq!(config.sync_defaults().sync_type, SyncType::All);
        assert_eq!(config.background_defaults().sync_type, SyncType::Generated);
    }

    #[test]
    fn invalid_values_are_rejected() {
        for content in [
            "[sync]\nmax_concurrent_pushes = 0",
            "[sync]\nbackground_interval_secs = 0",
            "[google]\ncalendar_id = \"  \"",
            "[sync]\nsync_type = \"sometimes\"",
        ] {
            assert!(
                matches!(ClientConfig::parse(content), Err(ClientError::Config(_))),
                "{content}"
            );
        }
    }

    #[test]
    fn dump_round_trips() {
        let mut config = ClientConfig::default();
        config.google.access_token = Some("env::TOKEN".into());
        let dumped = toml::to_string_pretty(&config).unwrap();
        assert_eq!(ClientConfig::parse(&dumped).unwrap(), config);
    }

    #[cfg(feature = "google")]
    #[test]
    fn google_config_from_env_reference() {
        unsafe {
            std::env::set_var("_LEDGERCAL_CFG_TOKEN", "ya29.test");
        }
        let settings = GoogleSettings {
            access_token: Some("env::_LEDGERCAL_CFG_TOKEN".into()),
            timeout_secs: 12,
            ..Default::default()
        };
        let config = settings.to_provider_config().unwrap();
        assert_eq!(config.access_token, "ya29.test");
        assert_eq!(config.timeout, Duration::from_secs(12));
        unsafe {
            std::env::remove_var("_LEDGERCAL_CFG_TOKEN");
        }
    }

    #[cfg(feature = "google")]
    #[test]
    fn google_config_requires_token() {
        let err = GoogleSettings::default().to_provider_config().unwrap_err();
        assert!(err.contains("access token not configured"));
    }
}
