//! Centralized configuration for the Civis client.
//!
//! Constants live on zero-sized config structs; runtime settings are read
//! once from the environment into [`ClientConfig`].

use crate::error::{CivisError, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const DEFAULT_API_URL: &'static str = "http://localhost:3333";
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
    pub const USER_AGENT: &'static str = "Civis-Admin/0.3";
}

/// Session persistence configuration.
pub struct SessionConfig;

impl SessionConfig {
    pub const COOKIE_NAME: &'static str = "civis_admin_token";
    pub const COOKIE_FILENAME: &'static str = "token.cookie.json";
    pub const IDENTITY_FILENAME: &'static str = "admin.json";
    pub const REMEMBER_ME_DAYS: i64 = 7;
    pub const APP_DIR_NAME: &'static str = "civis-admin";
}

/// Query cache defaults.
pub struct CacheDefaults;

impl CacheDefaults {
    pub const STALE_TIME: Duration = Duration::ZERO;
    pub const GC_TIME: Duration = Duration::from_secs(5 * 60);
    /// Period of the background garbage-collection sweep.
    pub const GC_INTERVAL: Duration = Duration::from_secs(60);
}

/// Environment variable names.
pub struct EnvVars;

impl EnvVars {
    pub const API_URL: &'static str = "CIVIS_API_URL";
    pub const DEFAULT_CITY_ID: &'static str = "CIVIS_DEFAULT_CITY_ID";
    pub const REQUEST_TIMEOUT_SECS: &'static str = "CIVIS_REQUEST_TIMEOUT_SECS";
    pub const ENVIRONMENT: &'static str = "CIVIS_ENV";
    pub const SESSION_DIR: &'static str = "CIVIS_SESSION_DIR";
    pub const LOG: &'static str = "CIVIS_LOG";
}

/// Runtime configuration for the client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the remote API, without trailing slash.
    pub api_url: String,
    /// City selected when the admin has not picked one.
    pub default_city_id: Option<String>,
    pub request_timeout: Duration,
    /// Production mode marks the token cookie `Secure`.
    pub production: bool,
    /// Directory holding the token cookie and identity record.
    pub session_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: NetworkConfig::DEFAULT_API_URL.to_string(),
            default_city_id: None,
            request_timeout: NetworkConfig::REQUEST_TIMEOUT,
            production: false,
            session_dir: None,
        }
    }
}

impl ClientConfig {
    /// Create a configuration pointing at `api_url`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ..Self::default()
        }
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through an arbitrary lookup function.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut config = Self::default();
        if let Some(url) = non_empty(EnvVars::API_URL) {
            config.api_url = url;
        }
        config.default_city_id = non_empty(EnvVars::DEFAULT_CITY_ID);

        if let Some(raw) = non_empty(EnvVars::REQUEST_TIMEOUT_SECS) {
            let secs = raw.parse::<u64>().map_err(|_| CivisError::Config {
                message: format!("{} must be a whole number of seconds, got {:?}", EnvVars::REQUEST_TIMEOUT_SECS, raw),
            })?;
            config.request_timeout = Duration::from_secs(secs);
        }

        config.production = non_empty(EnvVars::ENVIRONMENT)
            .map(|env| env.eq_ignore_ascii_case("production"))
            .unwrap_or(false);
        config.session_dir = non_empty(EnvVars::SESSION_DIR).map(PathBuf::from);

        config.validate()?;
        Ok(config)
    }

    pub fn with_default_city(mut self, city_id: impl Into<String>) -> Self {
        self.default_city_id = Some(city_id.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    pub fn with_session_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.session_dir = Some(dir.into());
        self
    }

    /// Check that the base URL parses and uses http(s).
    pub fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(&self.api_url).map_err(|e| CivisError::Config {
            message: format!("Invalid API URL {:?}: {}", self.api_url, e),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CivisError::Config {
                message: format!("API URL must use http or https: {}", self.api_url),
            });
        }
        if self.request_timeout.is_zero() {
            return Err(CivisError::Config {
                message: "Request timeout must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Session directory, falling back to the platform config directory.
    pub fn resolved_session_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.session_dir {
            return Ok(dir.clone());
        }
        dirs::config_dir()
            .map(|d| d.join(SessionConfig::APP_DIR_NAME))
            .ok_or_else(|| CivisError::Config {
                message: "Could not determine config directory".to_string(),
            })
    }
}
