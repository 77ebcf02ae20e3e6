#![forbid(unsafe_code)]

//! `citadel` — task coordination server.
//!
//! Bootstraps configuration, opens the store, seeds the agent roster, and
//! runs the HTTP control surface, the notification delivery daemon, and the
//! retention purge until SIGINT/SIGTERM.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use citadel::config::GlobalConfig;
use citadel::daemon::{spawn_delivery_daemon, DaemonSettings, DeliveryDaemon, HttpGateway};
use citadel::http::{self, AppState};
use citadel::persistence::{db, retention, Repositories};
use citadel::tasks::presence;
use citadel::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "citadel", about = "Agent task coordination server", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Run the HTTP surface only, without the delivery daemon.
    #[arg(long)]
    no_daemon: bool,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("citadel server bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = match &args.config {
        Some(path) => GlobalConfig::load_from_path(path)?,
        None => GlobalConfig::default(),
    };
    config.apply_env()?;
    config.load_credentials().await?;
    if args.no_daemon {
        config.daemon.enabled = false;
    }
    let config = Arc::new(config);
    info!(db = %config.db_path.display(), "configuration loaded");

    // ── Initialize database ─────────────────────────────
    let db = Arc::new(db::connect(&config.db_path).await?);
    let repos = Repositories::new(&db);
    info!("database connected");

    let seeded = presence::seed_roster(&repos, &config.agents).await?;
    if !seeded.is_empty() {
        info!(agents = seeded.len(), "agent roster seeded");
    }

    let ct = CancellationToken::new();

    // ── Background services ─────────────────────────────
    let retention_handle =
        retention::spawn_retention_task(Arc::clone(&db), config.retention_days, ct.clone());

    let daemon_handle = if config.daemon.enabled {
        let gateway = Arc::new(HttpGateway::new(
            &config.gateway.url,
            config.gateway.token.clone(),
        ));
        let daemon = Arc::new(DeliveryDaemon::new(
            repos.clone(),
            gateway,
            DaemonSettings::from_config(&config),
        ));
        info!(gateway = %config.gateway.url, "delivery daemon starting");
        Some(spawn_delivery_daemon(daemon, ct.clone()))
    } else {
        info!("delivery daemon disabled");
        None
    };

    // ── HTTP control surface ────────────────────────────
    let bind = SocketAddr::from(([127, 0, 0, 1], config.http_port));
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|err| AppError::Config(format!("failed to bind http on {bind}: {err}")))?;
    let state = Arc::new(AppState::new(repos, config.api_key.clone()));
    let http_ct = ct.clone();
    let http_handle = tokio::spawn(async move {
        if let Err(err) = http::serve(listener, state, http_ct).await {
            error!(%err, "http control surface failed");
        }
    });

    info!("citadel ready");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();

    if let Some(handle) = daemon_handle {
        if let Err(err) = handle.await {
            error!(%err, "delivery daemon task panicked");
        }
    }
    let _ = tokio::join!(http_handle, retention_handle);
    info!("citadel shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
