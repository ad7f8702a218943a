//! Campus Events backend: event approvals, registrations, attendance,
//! certificates and feedback over an HTTP API.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod launcher;
pub mod logging;
pub mod models;
pub mod services;
