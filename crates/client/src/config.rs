//! Client configuration (defaults + environment overrides).

use std::path::PathBuf;
use std::time::Duration;

use sessiongate_observability::{LogFormat, ParseLogFormatError};
use thiserror::Error;

use crate::cookie::CookiePolicy;

pub const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Every call through the gateway shares this timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(1000);

/// Error pages addressed by the gateway (status codes) and the guard (denials).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRoutes {
    pub not_found: String,
    pub forbidden: String,
    pub unauthorized: String,
}

impl Default for ErrorRoutes {
    fn default() -> Self {
        Self {
            not_found: "/error/404".to_string(),
            forbidden: "/error/403".to_string(),
            unauthorized: "/error/401".to_string(),
        }
    }
}

impl ErrorRoutes {
    /// Error page for an HTTP failure status, if it has one.
    pub fn for_status(&self, status: u16) -> Option<&str> {
        match status {
            404 => Some(self.not_found.as_str()),
            403 => Some(self.forbidden.as_str()),
            401 => Some(self.unauthorized.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error(transparent)]
    LogFormat(#[from] ParseLogFormatError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base address shared by all API calls.
    pub api_url: String,
    pub request_timeout: Duration,
    pub cookie: CookiePolicy,
    pub error_routes: ErrorRoutes,
    /// Where the CLI persists its session cookie.
    pub cookie_file: PathBuf,
    pub log_format: LogFormat,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            cookie: CookiePolicy::default(),
            error_routes: ErrorRoutes::default(),
            cookie_file: PathBuf::from(".sessiongate-cookies.json"),
            log_format: LogFormat::Pretty,
        }
    }
}

impl ClientConfig {
    /// Read overrides from the process environment.
    ///
    /// - `SESSIONGATE_API_URL`
    /// - `SESSIONGATE_TIMEOUT_MS`
    /// - `SESSIONGATE_COOKIE_FILE`
    /// - `SESSIONGATE_LOG_FORMAT` (`json` | `pretty`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        match lookup("SESSIONGATE_API_URL") {
            Some(url) => config.api_url = url.trim_end_matches('/').to_string(),
            None => tracing::warn!("SESSIONGATE_API_URL not set; using {}", DEFAULT_API_URL),
        }

        if let Some(raw) = lookup("SESSIONGATE_TIMEOUT_MS") {
            let millis = raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                key: "SESSIONGATE_TIMEOUT_MS",
                value: raw.clone(),
                reason: e.to_string(),
            })?;
            config.request_timeout = Duration::from_millis(millis);
        }

        if let Some(path) = lookup("SESSIONGATE_COOKIE_FILE") {
            config.cookie_file = PathBuf::from(path);
        }

        if let Some(raw) = lookup("SESSIONGATE_LOG_FORMAT") {
            config.log_format = raw.parse()?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_the_wire_contract() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.request_timeout, Duration::from_millis(1000));
        assert_eq!(config.cookie.name, "jwt-token");
        assert_eq!(config.error_routes.for_status(403), Some("/error/403"));
        assert_eq!(config.error_routes.for_status(500), None);
    }

    #[test]
    fn overrides_are_applied() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("SESSIONGATE_API_URL", "https://api.example.com/"),
            ("SESSIONGATE_TIMEOUT_MS", "250"),
            ("SESSIONGATE_LOG_FORMAT", "json"),
        ]))
        .unwrap();
        assert_eq!(config.api_url, "https://api.example.com");
        assert_eq!(config.request_timeout, Duration::from_millis(250));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn bad_timeout_is_rejected() {
        let err = ClientConfig::from_lookup(lookup(&[("SESSIONGATE_TIMEOUT_MS", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "SESSIONGATE_TIMEOUT_MS", .. }));
    }
}
