//! Google Calendar backend configuration.

use std::time::Duration;

/// Base URL for Google Calendar API v3.
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Configuration for [`GoogleCalendar`](super::GoogleCalendar).
#[derive(Clone)]
pub struct GoogleConfig {
    /// OAuth access token with the `calendar.events` scope.
    pub access_token: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// API root, overridable for proxies and tests.
    pub api_base: String,
    /// Page size for `events.list` (the API caps it at 2500).
    pub page_size: u32,
}

impl GoogleConfig {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            timeout: Duration::from_secs(30),
            api_base: DEFAULT_API_BASE.to_string(),
            page_size: 250,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, 2500);
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.access_token.trim().is_empty() {
            return Err("access_token is required");
        }
        if self.timeout.is_zero() {
            return Err("timeout must be greater than zero");
        }
        if !self.api_base.starts_with("https://") && !self.api_base.starts_with("http://") {
            return Err("api_base must be an http(s) URL");
        }
        Ok(())
    }
}

// the token never ends up in logs
impl std::fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("access_token", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("api_base", &self.api_base)
            .field("page_size", &self.page_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_builders() {
        let config = GoogleConfig::new("tok")
            .with_timeout(Duration::from_secs(5))
            .with_api_base("http://localhost:8080/")
            .with_page_size(10_000);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.api_base, "http://localhost:8080");
        assert_eq!(config.page_size, 2500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation() {
        assert_eq!(GoogleConfig::new("  ").validate(), Err("access_token is required"));
        assert!(
            GoogleConfig::new("tok")
                .with_api_base("ftp://x")
                .validate()
                .is_err()
        );
    }

    #[test]
    fn debug_redacts_token() {
        let debug = format!("{:?}", GoogleConfig::new("secret-token"));
        assert!(!debug.contains("secret-token"));
    }
}
