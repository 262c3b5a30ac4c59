//! PeerLink server binary: the peer listener endpoints plus scheduled liveness
//! probing.
//!
//! Starts an axum HTTP server with structured logging and graceful shutdown on
//! SIGTERM/SIGINT. In-flight simulated delays are interrupted at shutdown and
//! answer HTTP 500.

use peerlink_correlation::Correlator;
use peerlink_server::background::{start_probe_task, ProbeSchedule};
use peerlink_server::config::{self, Config};
use peerlink_server::{app, AppState};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("PEERLINK_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    // Tracing is not up yet, so configuration errors go to stderr.
    let config = match config::load_config(selected_config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("peerlink-server: cannot start: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&config);

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    if let Err(e) = run(config).await {
        tracing::error!("peerlink server failed: {}", e);
        std::process::exit(1);
    }

    tracing::info!("peerlink server shut down");
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let correlator = Correlator::default();

    let state = AppState::from_config(&config.listener, correlator.clone(), shutdown_rx.clone())?;
    tracing::info!(
        token_policy = ?state.token_policy,
        ping_faults = ?state.ping_faults,
        dpac_faults = ?state.dpac_faults,
        "listener configured"
    );

    let probe_task = match ProbeSchedule::from_config(&config.prober, correlator)? {
        Some(schedule) => Some(tokio::spawn(start_probe_task(schedule, shutdown_rx))),
        None => {
            tracing::info!("liveness probe task disabled (interval_secs=0 or no peers)");
            None
        }
    };

    let addr = SocketAddr::new(config.server.host, config.server.port);
    tracing::info!(%addr, "starting peerlink server");
    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app(state))
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Wakes delayed handlers and the probe task.
            let _ = shutdown_tx.send(true);
        })
        .await?;

    if let Some(task) = probe_task {
        if let Err(e) = task.await {
            tracing::error!("liveness probe task join error: {}", e);
        }
    }

    Ok(())
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
