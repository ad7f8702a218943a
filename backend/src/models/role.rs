//! Role model.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Canonical account roles. Stored by name in the `roles` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Role {
    Admin,
    Principal,
    #[serde(rename = "HOD")]
    Hod,
    #[serde(rename = "Event Organizer")]
    Organizer,
    Student,
    Guest,
}

impl Role {
    /// Match a stored role name, ignoring case and surrounding whitespace.
    /// `organizer` and `event organizer` are the same role.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "principal" => Some(Self::Principal),
            "hod" => Some(Self::Hod),
            "event organizer" | "organizer" => Some(Self::Organizer),
            "student" => Some(Self::Student),
            "guest" => Some(Self::Guest),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "Admin",
            Self::Principal => "Principal",
            Self::Hod => "HOD",
            Self::Organizer => "Event Organizer",
            Self::Student => "Student",
            Self::Guest => "Guest",
        }
    }

    /// Roles that take part in the approval chain.
    pub fn is_approver(&self) -> bool {
        matches!(self, Self::Hod | Self::Principal)
    }

    /// Roles that can register for events.
    pub fn is_participant(&self) -> bool {
        matches!(self, Self::Student | Self::Guest)
    }
}

/// Row from the `roles` table.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct RoleRow {
    pub role_id: i64,
    pub role_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_is_case_insensitive() {
        assert_eq!(Role::from_name("ADMIN"), Some(Role::Admin));
        assert_eq!(Role::from_name(" hod "), Some(Role::Hod));
        assert_eq!(Role::from_name("Student"), Some(Role::Student));
        assert_eq!(Role::from_name("janitor"), None);
    }

    #[test]
    fn test_organizer_aliases() {
        assert_eq!(Role::from_name("organizer"), Some(Role::Organizer));
        assert_eq!(Role::from_name("Event Organizer"), Some(Role::Organizer));
        assert_eq!(Role::Organizer.as_str(), "Event Organizer");
    }

    #[test]
    fn test_serializes_to_canonical_name() {
        assert_eq!(serde_json::to_string(&Role::Hod).unwrap(), r#""HOD""#);
        assert_eq!(
            serde_json::to_string(&Role::Organizer).unwrap(),
            r#""Event Organizer""#
        );
    }

    #[test]
    fn test_role_groups() {
        assert!(Role::Hod.is_approver());
        assert!(Role::Principal.is_approver());
        assert!(!Role::Admin.is_approver());
        assert!(Role::Guest.is_participant());
        assert!(!Role::Organizer.is_participant());
    }
}
