//! certboardd: faculty certification tracking and leaderboard daemon.
//!
//! Speaks newline-delimited JSON on stdin/stdout. Logs go to stderr.

mod config;
mod db;
mod export;
mod files;
mod ipc;
mod model;
mod ranks;
mod scheduler;
mod session;
mod stats;
mod store;

use anyhow::Context;
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "certboardd")]
#[command(about = "Faculty certification tracking and leaderboard daemon", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CERTBOARD_CONFIG")]
    config: Option<String>,

    /// Workspace to open at startup
    #[arg(short, long)]
    workspace: Option<PathBuf>,

    /// Extra admin emails, added to `auth.admin_emails`
    #[arg(long = "admin-email", value_delimiter = ',')]
    admin_email: Vec<String>,

    /// Log level (overrides `logging.level`)
    #[arg(long)]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(level: &str, json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.to_string().into());

    // stdout carries the protocol.
    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    config.auth.admin_emails.extend(
        cli.admin_email
            .iter()
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty()),
    );
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.log_json;

    init_tracing(&config.logging.level, config.logging.json);

    scheduler::DailySchedule::parse(&config.ranks.schedule, &config.ranks.utc_offset)
        .context("invalid rank schedule")?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        admins = config.auth.admin_emails.len(),
        rank_schedule = %config.ranks.schedule,
        "certboardd starting"
    );

    let mut state = ipc::AppState::new(config);
    if let Some(workspace) = cli.workspace.as_deref() {
        ipc::open_workspace(&mut state, workspace)
            .with_context(|| format!("failed to open workspace {}", workspace.display()))?;
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "stdin read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            Err(e) => {
                // No id to reply to.
                tracing::warn!(error = %e, "unparseable request line");
                serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                })
            }
        };

        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }

    tracing::info!("stdin closed, shutting down");
    drop(state);
    Ok(())
}
