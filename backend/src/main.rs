use std::process::ExitCode;

use clap::Parser;

use campus_events_backend::config::Config;
use campus_events_backend::{launcher, logging};

#[derive(Parser)]
#[command(name = "campus-events")]
#[command(about = "Prepare the database and serve the Campus Event Management System")]
struct Cli {
    /// Interface to bind
    #[arg(long, env = "HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// SQLite connection URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Log line format: `pretty` or `json`
    #[arg(long, env = "LOG_FORMAT", default_value = "pretty")]
    log_format: String,
}

/// Environment configuration with command-line overrides applied.
fn load_config(cli: Cli, json_logs: bool) -> anyhow::Result<Config> {
    let mut config = Config::from_env()?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
        if std::env::var("APP_BASE_URL").is_err() {
            config.base_url = format!("http://localhost:{}", port);
        }
    }
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }
    config.log_json = json_logs;
    Ok(config)
}

async fn start(cli: Cli, json_logs: bool) -> anyhow::Result<()> {
    let config = load_config(cli, json_logs)?;
    launcher::run(config).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let json_logs = cli.log_format.eq_ignore_ascii_case("json");
    logging::init(json_logs);

    match start(cli, json_logs).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Startup failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_environment() {
        let cli = Cli::try_parse_from([
            "campus-events",
            "--host",
            "0.0.0.0",
            "--port",
            "8088",
            "--database-url",
            "sqlite::memory:",
        ])
        .unwrap();
        let config = load_config(cli, true).unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:8088");
        assert_eq!(config.database_url, "sqlite::memory:");
        assert!(config.log_json);
        if std::env::var("APP_BASE_URL").is_err() {
            assert_eq!(config.base_url, "http://localhost:8088");
        }
    }
}
