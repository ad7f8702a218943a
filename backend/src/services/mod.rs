//! Business logic services.

pub mod approval_service;
pub mod attendance_service;
pub mod auth_service;
pub mod catalog_service;
pub mod certificate_service;
pub mod email_service;
pub mod event_bus;
pub mod event_service;
pub mod feedback_service;
pub mod guest_service;
pub mod metrics_service;
pub mod registration_service;
pub mod report_service;
pub mod scheduler_service;
pub mod seed_service;
pub mod settings_service;
pub mod user_service;
