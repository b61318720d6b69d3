//! Runtime configuration.
//!
//! Values come from environment variables (a `.env` file is honoured by
//! `main`), each falling back to a default.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

use crate::registry::{
    RegistryOptions, DEFAULT_BASE_ADDRESS, DEFAULT_MAX_CODE_ATTEMPTS, DEFAULT_VALIDITY_MINUTES,
};
use crate::token::{DEFAULT_CODE_LENGTH, MAX_SHORT_CODE_LENGTH};

#[derive(Debug, Clone)]
pub struct Config {
    /// Prefix of every generated short link
    pub base_address: String,
    pub database_url: String,
    pub bind_addr: String,
    pub default_validity_minutes: i64,
    pub short_code_length: usize,
    pub max_code_attempts: usize,
    pub geolocation_timeout_ms: u64,
    /// Seconds the redirect page waits before navigating; 0 redirects immediately
    pub redirect_delay_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_address: DEFAULT_BASE_ADDRESS.to_string(),
            database_url: "sqlite:quickurl.db?mode=rwc".to_string(),
            bind_addr: "0.0.0.0:3000".to_string(),
            default_validity_minutes: DEFAULT_VALIDITY_MINUTES,
            short_code_length: DEFAULT_CODE_LENGTH,
            max_code_attempts: DEFAULT_MAX_CODE_ATTEMPTS,
            geolocation_timeout_ms: 2000,
            redirect_delay_secs: 2,
        }
    }
}

impl Config {
    /// # Environment Variables
    /// - `BASE_ADDRESS` (default: "http://localhost:3000")
    /// - `DATABASE_URL` (default: "sqlite:quickurl.db?mode=rwc")
    /// - `BIND_ADDR` (default: "0.0.0.0:3000")
    /// - `DEFAULT_VALIDITY_MINUTES` (default: 30)
    /// - `SHORT_CODE_LENGTH` (default: 6)
    /// - `MAX_CODE_ATTEMPTS` (default: 100)
    /// - `GEOLOCATION_TIMEOUT_MS` (default: 2000)
    /// - `REDIRECT_DELAY_SECS` (default: 2)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            base_address: lookup("BASE_ADDRESS").unwrap_or(defaults.base_address),
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            default_validity_minutes: parse_or(
                &lookup,
                "DEFAULT_VALIDITY_MINUTES",
                defaults.default_validity_minutes,
            )?,
            short_code_length: parse_or(&lookup, "SHORT_CODE_LENGTH", defaults.short_code_length)?,
            max_code_attempts: parse_or(&lookup, "MAX_CODE_ATTEMPTS", defaults.max_code_attempts)?,
            geolocation_timeout_ms: parse_or(
                &lookup,
                "GEOLOCATION_TIMEOUT_MS",
                defaults.geolocation_timeout_ms,
            )?,
            redirect_delay_secs: parse_or(
                &lookup,
                "REDIRECT_DELAY_SECS",
                defaults.redirect_delay_secs,
            )?,
        };

        if config.default_validity_minutes <= 0 {
            anyhow::bail!("DEFAULT_VALIDITY_MINUTES must be greater than 0");
        }
        // Generated codes must pass the same check as custom ones.
        if !(1..=MAX_SHORT_CODE_LENGTH).contains(&config.short_code_length) {
            anyhow::bail!("SHORT_CODE_LENGTH must be between 1 and {MAX_SHORT_CODE_LENGTH}");
        }
        if config.max_code_attempts == 0 {
            anyhow::bail!("MAX_CODE_ATTEMPTS must be at least 1");
        }

        Ok(config)
    }

    pub fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            base_address: self.base_address.clone(),
            default_validity_minutes: self.default_validity_minutes,
            code_length: self.short_code_length,
            max_code_attempts: self.max_code_attempts,
            geolocation_timeout: Duration::from_millis(self.geolocation_timeout_ms),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a valid number, got {raw:?}")),
        None => Ok(default),
    }
}
