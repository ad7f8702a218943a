//! Startup sequence: prepare the database, print the banner, serve.
//!
//! Each phase aborts the sequence on failure; nothing is retried.

use std::io::Write;

use sqlx::SqlitePool;
use tokio::net::TcpListener;
use tokio::signal;

use crate::api::{routes, AppState};
use crate::config::Config;
use crate::db;
use crate::error::Result;
use crate::services::email_service::build_mailer;
use crate::services::metrics_service;
use crate::services::scheduler_service;
use crate::services::seed_service::{SeedService, DEMO_ACCOUNTS};

pub const BANNER_RULE: &str =
    "============================================================";
pub const TITLE: &str = "Campus Event Management System";
pub const STARTING_LINE: &str = "Starting Campus Events server...";

/// Open the database, apply migrations and seed reference data.
/// Safe to run against an already prepared database.
pub async fn prepare(config: &Config) -> Result<SqlitePool> {
    let pool = db::connect(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    SeedService::new(pool.clone())
        .seed(config.seed_demo_data, config.bcrypt_cost)
        .await?;
    tracing::info!(database = %config.database_url, "Database ready");
    Ok(pool)
}

/// `<Role>: <email> / <password>` for every demo account.
pub fn credential_lines() -> Vec<String> {
    DEMO_ACCOUNTS
        .iter()
        .map(|a| format!("{}: {} / {}", a.label, a.email, a.password))
        .collect()
}

/// Write the operator banner, access URL and demo credentials.
pub fn announce(out: &mut impl Write, base_url: &str) -> std::io::Result<()> {
    writeln!(out, "{}", BANNER_RULE)?;
    writeln!(out, "  {}", TITLE)?;
    writeln!(out, "{}", BANNER_RULE)?;
    writeln!(out, "Access the application at: {}", base_url)?;
    writeln!(out)?;
    writeln!(out, "Demo credentials:")?;
    for line in credential_lines() {
        writeln!(out, "{}", line)?;
    }
    writeln!(out)?;
    out.flush()
}

/// Serve HTTP in the foreground until SIGINT or SIGTERM.
pub async fn launch(config: Config, pool: SqlitePool, out: &mut impl Write) -> Result<()> {
    writeln!(out, "{}", STARTING_LINE)?;
    out.flush()?;

    let mailer = build_mailer(config.smtp.as_ref())?;
    let metrics_handle = metrics_service::install_recorder();
    let addr = config.bind_address();

    scheduler_service::spawn_all(pool.clone(), &config);
    let state = std::sync::Arc::new(AppState::new(config, pool, mailer, metrics_handle));
    state.event_bus.spawn_audit_logger();

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, routes::create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// prepare → announce → launch.
pub async fn run(config: Config) -> Result<()> {
    let pool = prepare(&config).await?;
    let mut stdout = std::io::stdout();
    announce(&mut stdout, &config.base_url)?;
    launch(config, pool, &mut stdout).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_lines_match_pattern() {
        let lines = credential_lines();
        assert_eq!(lines.len(), 5);
        for line in &lines {
            let (role, rest) = line.split_once(": ").unwrap();
            let (email, password) = rest.split_once(" / ").unwrap();
            assert!(!role.is_empty());
            let (local, domain) = email.split_once('@').unwrap();
            assert!(!local.is_empty() && !domain.is_empty());
            assert!(!password.is_empty() && !password.contains(' '));
        }
    }

    #[test]
    fn test_announce_output() {
        let mut out = Vec::new();
        announce(&mut out, "http://localhost:5000").unwrap();
        let text = String::from_utf8(out).unwrap();
        let expected = "\
============================================================
  Campus Event Management System
============================================================
Access the application at: http://localhost:5000

Demo credentials:
Admin: admin@campus.edu / admin123
Principal: principal@campus.edu / principal123
HOD: hod.cse@campus.edu / hod12345
Organizer: organizer@campus.edu / organizer123
Student: student@campus.edu / student123

";
        assert_eq!(text, expected);
    }

    #[tokio::test]
    async fn test_prepare_twice() {
        let dir = std::env::temp_dir().join(format!(
            "campus-events-prepare-{}",
            uuid::Uuid::new_v4().simple()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let mut config = Config::for_tests();
        config.database_url = format!("sqlite://{}", dir.join("campus.db").display());

        let first = prepare(&config).await.unwrap();
        first.close().await;
        let second = prepare(&config).await.unwrap();
        let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&second)
            .await
            .unwrap();
        assert_eq!(users, 5);
        second.close().await;
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_prepare_failure_skips_launch_line() {
        let mut config = Config::for_tests();
        config.database_url = "sqlite:///definitely/missing/dir/campus.db".to_string();
        let mut out = Vec::new();

        let result = async {
            let pool = prepare(&config).await?;
            launch(config.clone(), pool, &mut out).await
        }
        .await;

        assert!(result.is_err());
        assert!(!String::from_utf8_lossy(&out).contains(STARTING_LINE));
    }
}
