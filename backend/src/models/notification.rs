use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// A dashboard notice derived from recent activity. Not persisted.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Notification {
    /// e.g. `success`, `error`, `ready`, `certificate`, `feedback`, `invitation`, `reminder`
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub event_id: Option<i64>,
    pub time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

impl Notification {
    pub fn new(kind: &str, message: impl Into<String>, event_id: Option<i64>) -> Self {
        Self {
            kind: kind.to_string(),
            message: message.into(),
            event_id,
            time: None,
            remarks: None,
        }
    }

    pub fn at(mut self, time: Option<DateTime<Utc>>) -> Self {
        self.time = time;
        self
    }
}

/// Newest first; undated notices sort as if they happened at `now`.
pub fn sort_newest_first(items: &mut [Notification], now: DateTime<Utc>) {
    items.sort_by(|a, b| b.time.unwrap_or(now).cmp(&a.time.unwrap_or(now)));
}
