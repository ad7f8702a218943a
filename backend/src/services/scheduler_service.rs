//! Background task scheduler.
//!
//! Runs periodic tasks: the guest expiry sweep and metric gauge updates.

use chrono::Utc;
use sqlx::SqlitePool;
use tokio::time::{interval, Duration};

use crate::config::Config;
use crate::services::guest_service::GuestService;
use crate::services::metrics_service;

/// Database gauge stats for Prometheus metrics.
#[derive(Debug, sqlx::FromRow)]
struct GaugeStats {
    pub users: i64,
    pub events: i64,
    pub pending_events: i64,
}

/// Spawn all background scheduler tasks.
/// They are fire-and-forget and end with the runtime.
pub fn spawn_all(db: SqlitePool, config: &Config) {
    // Guest expiry sweep
    {
        let db = db.clone();
        let period = Duration::from_secs(config.guest_sweep_interval_secs.max(1));
        tokio::spawn(async move {
            // Initial delay to let the server start up
            tokio::time::sleep(Duration::from_secs(5)).await;
            let service = GuestService::new(db);
            let mut ticker = interval(period);

            loop {
                ticker.tick().await;
                tracing::debug!("Running guest expiry sweep");

                match service.cleanup(Utc::now()).await {
                    Ok(report) if report.expired > 0 => {
                        tracing::info!(
                            "Guest sweep: {} expired, {} deleted",
                            report.expired,
                            report.deleted
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("Guest expiry sweep failed: {}", e);
                    }
                }
            }
        });
    }

    // Gauge metrics updater (every 5 minutes)
    {
        let db = db.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            let mut ticker = interval(Duration::from_secs(300)); // 5 minutes

            loop {
                ticker.tick().await;
                if let Err(e) = update_gauge_metrics(&db).await {
                    tracing::warn!("Failed to update gauge metrics: {}", e);
                }
            }
        });
    }

    tracing::info!(
        "Background schedulers started: guest sweep every {}s, gauges",
        config.guest_sweep_interval_secs
    );
}

/// Update Prometheus gauge metrics from database state.
async fn update_gauge_metrics(db: &SqlitePool) -> crate::error::Result<()> {
    let stats = sqlx::query_as::<_, GaugeStats>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM users) AS users,
            (SELECT COUNT(*) FROM events) AS events,
            (SELECT COUNT(*) FROM events WHERE status = 'pending') AS pending_events
        "#,
    )
    .fetch_one(db)
    .await
    .map_err(|e| crate::error::AppError::Database(e.to_string()))?;

    metrics_service::set_population_gauges(stats.users, stats.events, stats.pending_events);

    Ok(())
}
