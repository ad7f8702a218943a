use serde::Serialize;
use tokio::sync::broadcast;

use crate::services::metrics_service;

/// A domain event published when campus entities change.
#[derive(Debug, Clone, Serialize)]
pub struct DomainEvent {
    /// Event type, e.g. "event.created", "approval.rejected"
    #[serde(rename = "type")]
    pub event_type: String,
    /// Id of the affected entity
    pub entity_id: String,
    /// Id of the user who triggered the change
    pub actor: Option<String>,
    /// ISO 8601 timestamp
    pub timestamp: String,
}

impl DomainEvent {
    pub fn now(
        event_type: impl Into<String>,
        entity_id: impl Into<String>,
        actor: Option<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            entity_id: entity_id.into(),
            actor,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Broadcast-based event bus for domain events.
///
/// A subscriber that falls behind receives `RecvError::Lagged` and skips
/// ahead; events are informational and never replayed.
pub struct EventBus {
    tx: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish a domain event. Dropped silently when nobody listens.
    pub fn publish(&self, event: DomainEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }

    /// Create a timestamped domain event and publish it in one call.
    pub fn emit(&self, event_type: &str, entity_id: impl ToString, actor: Option<i64>) {
        self.publish(DomainEvent::now(
            event_type,
            entity_id.to_string(),
            actor.map(|id| id.to_string()),
        ));
    }

    /// Spawn the audit subscriber: logs every event and counts it by type.
    pub fn spawn_audit_logger(&self) -> tokio::task::JoinHandle<()> {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        tracing::info!(
                            event_type = %event.event_type,
                            entity_id = %event.entity_id,
                            actor = ?event.actor,
                            "Domain event"
                        );
                        metrics_service::record_domain_event(event.event_type);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Audit subscriber lagged, skipped {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
