//! Database models (SQLx).

pub mod approval;
pub mod catalog;
pub mod certificate;
pub mod event;
pub mod feedback;
pub mod notification;
pub mod registration;
pub mod role;
pub mod user;
