//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use ledgercal_core::{DateWindow, SyncTrigger, SyncType, WindowError};

use crate::orchestrator::SyncRequest;

/// Socket server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub socket_path: PathBuf,
    /// Read/write timeout per message. Sync requests are answered after the
    /// pass, so this bounds how long a pass may take.
    pub connection_timeout: Duration,
    pub max_connections: usize,
    /// Remove a leftover socket file from a dead daemon on startup.
    pub cleanup_stale_socket: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            connection_timeout: Duration::from_secs(120),
            max_connections: 32,
            cleanup_stale_socket: true,
        }
    }
}

impl ServerConfig {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            ..Default::default()
        }
    }

    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_cleanup_stale_socket(mut self, cleanup: bool) -> Self {
        self.cleanup_stale_socket = cleanup;
        self
    }
}

/// `$XDG_RUNTIME_DIR/ledgercal.sock`, or `/tmp/ledgercal-$UID.sock`.
pub fn default_socket_path() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(runtime_dir).join("ledgercal.sock")
    } else {
        #[cfg(unix)]
        // SAFETY: getuid has no preconditions and cannot fail.
        let uid = unsafe { libc::getuid() };
        #[cfg(not(unix))]
        let uid = 0;
        PathBuf::from(format!("/tmp/ledgercal-{}.sock", uid))
    }
}

/// Values a pass falls back to when the caller leaves them out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncDefaults {
    pub calendar_id: String,
    pub sync_type: SyncType,
    pub include_anniversary_events: bool,
    /// Days before today covered by the rolling window.
    pub window_past_days: u32,
    /// Days after today covered by the rolling window.
    pub window_future_days: u32,
}

impl Default for SyncDefaults {
    fn default() -> Self {
        Self {
            calendar_id: "primary".to_string(),
            sync_type: SyncType::All,
            include_anniversary_events: true,
            window_past_days: 30,
            window_future_days: 365,
        }
    }
}

impl SyncDefaults {
    pub fn with_calendar_id(mut self, calendar_id: impl Into<String>) -> Self {
        self.calendar_id = calendar_id.into();
        self
    }

    pub fn with_window_days(mut self, past: u32, future: u32) -> Self {
        self.window_past_days = past;
        self.window_future_days = future;
        self
    }

    /// Rolling window around `today`.
    pub fn window(&self, today: NaiveDate) -> Result<DateWindow, WindowError> {
        DateWindow::around(today, self.window_past_days, self.window_future_days)
    }

    /// A request built entirely from the defaults.
    pub fn request(&self, today: NaiveDate, trigger: SyncTrigger) -> Result<SyncRequest, WindowError> {
        Ok(SyncRequest::new(self.calendar_id.clone(), self.window(today)?)
            .with_sync_type(self.sync_type)
            .with_anniversaries(self.include_anniversary_events)
            .with_trigger(trigger))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert!(config.socket_path.to_string_lossy().contains("ledgercal"));
        assert_eq!(config.max_connections, 32);
        assert!(config.cleanup_stale_socket);
    }

    #[test]
    fn custom_config() {
        let config = ServerConfig::new("/custom/path.sock")
            .with_connection_timeout(Duration::from_secs(60))
            .with_max_connections(4)
            .with_cleanup_stale_socket(false);

        assert_eq!(config.socket_path, PathBuf::from("/custom/path.sock"));
        assert_eq!(config.connection_timeout, Duration::from_secs(60));
        assert_eq!(config.max_connections, 4);
        assert!(!config.cleanup_stale_socket);
    }

    #[test]
    fn default_socket_path_format() {
        let path = default_socket_path();
        let path_str = path.to_string_lossy();
        assert!(path_str.contains("ledgercal"));
        assert!(path_str.ends_with(".sock"));
    }

    #[test]
    fn request_from_defaults() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let defaults = SyncDefaults::default()
            .with_calendar_id("team")
            .with_window_days(10, 20);

        let request = defaults.request(today, SyncTrigger::Scheduled).unwrap();
        assert_eq!(request.calendar_id, "team");
        assert_eq!(request.window.start, NaiveDate::from_ymd_opt(2025, 6, 5).unwrap());
        assert_eq!(request.window.end, NaiveDate::from_ymd_opt(2025, 7, 6).unwrap());
        assert_eq!(request.trigger, SyncTrigger::Scheduled);
        assert!(request.include_anniversary_events);
    }
}
