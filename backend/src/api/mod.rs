//! HTTP API: shared state, routing, middleware and handlers.

pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod validation;

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::services::approval_service::ApprovalService;
use crate::services::auth_service::AuthService;
use crate::services::email_service::{Mailer, Notifier};
use crate::services::event_bus::EventBus;

/// Application state shared across handlers
pub struct AppState {
    pub config: Arc<Config>,
    pub db: SqlitePool,
    pub event_bus: Arc<EventBus>,
    pub notifier: Notifier,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        config: Config,
        db: SqlitePool,
        mailer: Arc<dyn Mailer>,
        metrics_handle: Option<PrometheusHandle>,
    ) -> Self {
        let notifier = Notifier::new(mailer, config.base_url.clone());
        Self {
            config: Arc::new(config),
            db,
            event_bus: Arc::new(EventBus::new(256)),
            notifier,
            metrics_handle,
        }
    }

    pub fn auth_service(&self) -> AuthService {
        AuthService::new(self.db.clone(), self.config.clone())
    }

    pub fn approval_service(&self) -> ApprovalService {
        ApprovalService::new(self.db.clone(), self.notifier.clone())
    }
}

pub type SharedState = Arc<AppState>;
