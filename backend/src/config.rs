//! Application configuration loaded from environment variables.

use std::env;
use std::str::FromStr;

use crate::error::{AppError, Result};

const DEV_JWT_SECRET: &str = "campus-events-dev-secret-change-me";

/// Outgoing mail settings. Absent when `SMTP_HOST` is unset.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: String,
    pub use_tls: bool,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite connection URL
    pub database_url: String,

    /// Server bind host
    pub host: String,

    /// Server bind port
    pub port: u16,

    /// External base URL used in mailed links and the startup banner
    pub base_url: String,

    /// HMAC secret for session and link tokens
    pub jwt_secret: String,

    /// Session token lifetime in seconds
    pub jwt_expiration_secs: u64,

    /// bcrypt work factor
    pub bcrypt_cost: u32,

    /// Seed the demo accounts during startup
    pub seed_demo_data: bool,

    /// Reject write operations except authentication
    pub demo_mode: bool,

    pub smtp: Option<SmtpConfig>,

    /// Guest expiry sweep period in seconds
    pub guest_sweep_interval_secs: u64,

    /// Emit JSON log lines instead of the pretty format
    pub log_json: bool,
}

impl Config {
    /// Load configuration from the process environment. The binary reads
    /// `.env` into the environment before calling this.
    pub fn from_env() -> Result<Self> {
        let port: u16 = parse_env("PORT", 5000)?;
        let base_url = env::var("APP_BASE_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| format!("http://localhost:{}", port));

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                tracing::warn!("JWT_SECRET is not set, using the development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        let smtp = match env::var("SMTP_HOST") {
            Ok(host) if !host.is_empty() => Some(SmtpConfig {
                host,
                port: parse_env("SMTP_PORT", 587)?,
                username: env::var("SMTP_USERNAME").ok(),
                password: env::var("SMTP_PASSWORD").ok(),
                from_address: env::var("SMTP_FROM")
                    .unwrap_or_else(|_| "noreply@campus.edu".to_string()),
                use_tls: parse_bool_env("SMTP_TLS", true)?,
            }),
            _ => None,
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://campus_events.db".to_string()),
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port,
            base_url,
            jwt_secret,
            jwt_expiration_secs: parse_env("JWT_EXPIRATION_SECS", 86400)?,
            bcrypt_cost: parse_env("BCRYPT_COST", bcrypt::DEFAULT_COST)?,
            seed_demo_data: parse_bool_env("SEED_DEMO_DATA", true)?,
            demo_mode: parse_bool_env("DEMO_MODE", false)?,
            smtp,
            guest_sweep_interval_secs: parse_env("GUEST_SWEEP_INTERVAL_SECS", 3600)?,
            log_json: env::var("LOG_FORMAT")
                .map(|f| f.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        })
    }

    /// Configuration suitable for tests: in-memory database, low bcrypt cost.
    pub fn for_tests() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            host: "127.0.0.1".to_string(),
            port: 5000,
            base_url: "http://localhost:5000".to_string(),
            jwt_secret: "test-secret".to_string(),
            jwt_expiration_secs: 3600,
            bcrypt_cost: 4,
            seed_demo_data: true,
            demo_mode: false,
            smtp: None,
            guest_sweep_interval_secs: 3600,
            log_json: false,
        }
    }

    /// `host:port` pair for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_env<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} has an invalid value: {}", key, raw))),
        _ => Ok(default),
    }
}

fn parse_bool_env(key: &str, default: bool) -> Result<bool> {
    match env::var(key) {
        Ok(raw) => parse_bool(&raw)
            .ok_or_else(|| AppError::Config(format!("{} must be a boolean, got {}", key, raw))),
        Err(_) => Ok(default),
    }
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_accepts_common_spellings() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool(" 1 "), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool(""), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_bind_address() {
        let mut config = Config::for_tests();
        config.host = "0.0.0.0".into();
        config.port = 8080;
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        std::env::set_var("CAMPUS_EVENTS_TEST_NUM", "not-a-number");
        let result: Result<u16> = parse_env("CAMPUS_EVENTS_TEST_NUM", 1);
        assert!(matches!(result, Err(AppError::Config(_))));
        std::env::remove_var("CAMPUS_EVENTS_TEST_NUM");
    }

    #[test]
    fn test_parse_env_default_when_unset() {
        let value: u64 = parse_env("CAMPUS_EVENTS_TEST_UNSET_KEY", 42).unwrap();
        assert_eq!(value, 42);
    }
}
