//! Runtime settings stored in the `app_config` key/value table.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use utoipa::ToSchema;

use crate::error::{AppError, Result};

pub const GUEST_ENABLED: &str = "guest_enabled";
pub const GUEST_VALIDITY_DAYS: &str = "guest_validity_days";
pub const GUEST_CLEANUP_POLICY: &str = "guest_cleanup_policy";

const DEFAULT_GUEST_VALIDITY_DAYS: i64 = 30;

/// What the guest cleanup does with expired guests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CleanupPolicy {
    /// Mark expired, keep the data
    Archive,
    /// Remove the guest and everything they own
    Delete,
}

impl CleanupPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Archive => "archive",
            Self::Delete => "delete",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "archive" => Some(Self::Archive),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// Guest-account settings as exposed to administrators.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GuestSettings {
    pub guest_enabled: bool,
    pub guest_validity_days: i64,
    pub guest_cleanup_policy: CleanupPolicy,
}

pub struct SettingsService {
    db: SqlitePool,
}

impl SettingsService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let value: Option<Option<String>> =
            sqlx::query_scalar("SELECT value FROM app_config WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.db)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(value.flatten())
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO app_config (key, value) VALUES (?, ?)
            ON CONFLICT (key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn guest_enabled(&self) -> Result<bool> {
        Ok(self.get(GUEST_ENABLED).await?.as_deref().map(str::trim) == Some("1"))
    }

    /// Flip guest login on/off and return the new state.
    pub async fn toggle_guest_enabled(&self) -> Result<bool> {
        let enabled = !self.guest_enabled().await?;
        self.set(GUEST_ENABLED, if enabled { "1" } else { "0" })
            .await?;
        Ok(enabled)
    }

    /// Validity in days; non-numeric or missing values fall back to 30.
    pub async fn guest_validity_days(&self) -> Result<i64> {
        Ok(self
            .get(GUEST_VALIDITY_DAYS)
            .await?
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|days| *days >= 0)
            .unwrap_or(DEFAULT_GUEST_VALIDITY_DAYS))
    }

    pub async fn guest_cleanup_policy(&self) -> Result<CleanupPolicy> {
        Ok(self
            .get(GUEST_CLEANUP_POLICY)
            .await?
            .as_deref()
            .and_then(CleanupPolicy::parse)
            .unwrap_or(CleanupPolicy::Archive))
    }

    pub async fn guest_settings(&self) -> Result<GuestSettings> {
        Ok(GuestSettings {
            guest_enabled: self.guest_enabled().await?,
            guest_validity_days: self.guest_validity_days().await?,
            guest_cleanup_policy: self.guest_cleanup_policy().await?,
        })
    }

    pub async fn update_guest_settings(&self, settings: &GuestSettings) -> Result<GuestSettings> {
        if settings.guest_validity_days < 0 {
            return Err(AppError::Validation(
                "Guest validity must be zero or more days".to_string(),
            ));
        }
        self.set(GUEST_ENABLED, if settings.guest_enabled { "1" } else { "0" })
            .await?;
        self.set(
            GUEST_VALIDITY_DAYS,
            &settings.guest_validity_days.to_string(),
        )
        .await?;
        self.set(GUEST_CLEANUP_POLICY, settings.guest_cleanup_policy.as_str())
            .await?;
        self.guest_settings().await
    }
}
