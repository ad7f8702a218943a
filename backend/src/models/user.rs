//! User model.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::role::Role;

/// Column list shared by every query that loads a [`User`].
pub const USER_SELECT: &str = r#"
    SELECT u.user_id, u.full_name, u.username, u.email, u.password, u.role_id,
           r.role_name, u.dept_id, d.dept_name, u.created_at, u.expiry_date, u.guest_status
    FROM users u
    JOIN roles r ON r.role_id = u.role_id
    LEFT JOIN departments d ON d.dept_id = u.dept_id
"#;

/// Guest account lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestStatus {
    Active,
    Expired,
    Disabled,
}

impl GuestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Disabled => "disabled",
        }
    }
}

/// User entity joined with its role and department names.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct User {
    pub user_id: i64,
    pub full_name: String,
    pub username: Option<String>,
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub password: String,
    pub role_id: i64,
    pub role_name: String,
    pub dept_id: Option<i64>,
    pub dept_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub guest_status: String,
}

impl User {
    pub fn role(&self) -> Option<Role> {
        Role::from_name(&self.role_name)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role() == Some(role)
    }

    pub fn is_guest(&self) -> bool {
        self.has_role(Role::Guest)
    }

    /// A guest whose expiry date lies before `now`.
    pub fn guest_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.is_guest() && self.expiry_date.is_some_and(|expiry| expiry < now)
    }

    pub fn is_disabled(&self) -> bool {
        self.guest_status == GuestStatus::Disabled.as_str()
    }

    pub fn is_expired(&self) -> bool {
        self.guest_status == GuestStatus::Expired.as_str()
    }
}
