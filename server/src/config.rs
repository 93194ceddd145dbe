//! Gate configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use supabase::RefreshPolicy;
use supabase::policy::{DEFAULT_REFRESH_COOLDOWN_SECS, DEFAULT_REFRESH_LEAD_SECS};

use crate::gate::cookies::CookieSettings;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_SITE_DIR: &str = "site";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid PORT: {0}")]
    InvalidPort(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    pub port: u16,
    /// Directory of rendered pages served behind the gate.
    pub site_dir: PathBuf,
    pub cookie_secure: bool,
    pub policy: RefreshPolicy,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            site_dir: PathBuf::from(DEFAULT_SITE_DIR),
            cookie_secure: false,
            policy: RefreshPolicy::default(),
        }
    }
}

impl GateConfig {
    /// Build gate config from environment variables.
    ///
    /// - `PORT`: default 3000
    /// - `SITE_DIR`: default `site`
    /// - `COOKIE_SECURE`: bool; defaults to true when `APP_ENV=production`
    /// - `SESSION_REFRESH_COOLDOWN_SECS`: default 60
    /// - `SESSION_REFRESH_LEAD_SECS`: default 300
    ///
    /// # Errors
    ///
    /// Returns an error if `PORT` is set but not a valid port number.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(raw.clone()))?,
            Err(_) => DEFAULT_PORT,
        };
        let site_dir = std::env::var("SITE_DIR").map_or_else(|_| PathBuf::from(DEFAULT_SITE_DIR), PathBuf::from);
        let policy = RefreshPolicy::new(
            Duration::from_secs(env_parse("SESSION_REFRESH_COOLDOWN_SECS", DEFAULT_REFRESH_COOLDOWN_SECS)),
            Duration::from_secs(env_parse("SESSION_REFRESH_LEAD_SECS", DEFAULT_REFRESH_LEAD_SECS)),
        );

        Ok(Self { port, site_dir, cookie_secure: cookie_secure(), policy })
    }

    #[must_use]
    pub fn cookie_settings(&self) -> CookieSettings {
        CookieSettings { secure: self.cookie_secure }
    }
}

pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn cookie_secure() -> bool {
    if let Some(value) = env_bool("COOKIE_SECURE") {
        return value;
    }

    std::env::var("APP_ENV")
        .map(|env| env.trim().eq_ignore_ascii_case("production"))
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
