//! Prometheus counters for the campus events workflow.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder.
///
/// Returns `None` if a recorder is already installed (e.g. a second app in
/// the same test process); metrics calls then go to that recorder.
pub fn install_recorder() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!("Prometheus recorder not installed: {}", e);
            None
        }
    }
}

pub fn record_login(method: &'static str, success: bool) {
    counter!(
        "campus_logins_total",
        "method" => method,
        "outcome" => if success { "success" } else { "failure" }
    )
    .increment(1);
}

pub fn record_registration(kind: &'static str) {
    counter!("campus_registrations_total", "kind" => kind).increment(1);
}

pub fn record_attendance_scan(outcome: &'static str) {
    counter!("campus_attendance_scans_total", "outcome" => outcome).increment(1);
}

pub fn record_attendance_upload(marked: usize) {
    counter!("campus_attendance_scans_total", "outcome" => "upload").increment(marked as u64);
}

pub fn record_approval_decision(decision: &'static str) {
    counter!("campus_approval_decisions_total", "decision" => decision).increment(1);
}

pub fn record_domain_event(event_type: String) {
    counter!("campus_domain_events_total", "type" => event_type).increment(1);
}

pub fn record_guest_cleanup(count: u64) {
    counter!("campus_guest_cleanup_total").increment(count);
}

pub fn set_population_gauges(users: i64, events: i64, pending_events: i64) {
    gauge!("campus_users").set(users as f64);
    gauge!("campus_events").set(events as f64);
    gauge!("campus_events_pending").set(pending_events as f64);
}
