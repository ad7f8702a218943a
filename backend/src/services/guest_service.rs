//! Guest account administration and the expiry sweep.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use utoipa::ToSchema;

use crate::error::{AppError, Result};
use crate::models::role::Role;
use crate::models::user::{GuestStatus, User};
use crate::services::metrics_service;
use crate::services::settings_service::{CleanupPolicy, GuestSettings, SettingsService};
use crate::services::user_service::UserService;

#[derive(Debug, Serialize, ToSchema)]
pub struct GuestOverview {
    pub settings: GuestSettings,
    pub guests: Vec<User>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct CleanupReport {
    pub expired: u64,
    pub deleted: u64,
}

pub struct GuestService {
    db: SqlitePool,
}

impl GuestService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    fn users(&self) -> UserService {
        UserService::new(self.db.clone())
    }

    pub async fn list(&self) -> Result<Vec<User>> {
        let mut guests = self.users().users_with_role(Role::Guest, None).await?;
        guests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(guests)
    }

    pub async fn overview(&self) -> Result<GuestOverview> {
        Ok(GuestOverview {
            settings: SettingsService::new(self.db.clone()).guest_settings().await?,
            guests: self.list().await?,
        })
    }

    async fn guest(&self, user_id: i64) -> Result<User> {
        let user = self.users().get_by_id(user_id).await?;
        if !user.is_guest() {
            return Err(AppError::Validation("Not a guest user".to_string()));
        }
        Ok(user)
    }

    pub async fn deactivate(&self, user_id: i64) -> Result<User> {
        let guest = self.guest(user_id).await?;
        self.users()
            .set_guest_status(guest.user_id, GuestStatus::Disabled)
            .await?;
        tracing::info!(user_id, "Guest deactivated");
        self.users().get_by_id(user_id).await
    }

    pub async fn delete(&self, user_id: i64) -> Result<()> {
        let guest = self.guest(user_id).await?;
        self.users().purge(guest.user_id).await?;
        tracing::info!(user_id, "Guest and related data deleted");
        Ok(())
    }

    /// Mark guests past their expiry as expired; under the `delete` policy
    /// remove them and their data as well. Guests already marked expired are
    /// not counted again.
    pub async fn cleanup(&self, now: DateTime<Utc>) -> Result<CleanupReport> {
        let policy = SettingsService::new(self.db.clone())
            .guest_cleanup_policy()
            .await?;
        let candidates: Vec<User> = self
            .list()
            .await?
            .into_iter()
            .filter(|g| g.guest_expired_at(now))
            .filter(|g| policy == CleanupPolicy::Delete || !g.is_expired())
            .collect();

        let mut report = CleanupReport::default();
        for guest in candidates {
            if !guest.is_expired() {
                self.users()
                    .set_guest_status(guest.user_id, GuestStatus::Expired)
                    .await?;
                report.expired += 1;
            }
            if policy == CleanupPolicy::Delete {
                self.users().purge(guest.user_id).await?;
                report.deleted += 1;
            }
        }

        if report.expired > 0 || report.deleted > 0 {
            metrics_service::record_guest_cleanup(report.expired + report.deleted);
            tracing::info!(
                expired = report.expired,
                deleted = report.deleted,
                policy = policy.as_str(),
                "Guest cleanup completed"
            );
        }
        Ok(report)
    }
}
