//! `imgcache` binary — thin CLI shell over the [`imgcache_server`] library.

use axum::routing::get;
use axum::Router;
use clap::Parser;
use imgcache_core::{Engine, EngineOptions};
use imgcache_server::config::{self, CliOverrides};
use imgcache_server::{routes, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// On-demand image transformation and caching server.
#[derive(Parser)]
#[command(name = "imgcache", version, about, long_about = None)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = "imgcache.toml")]
    config: PathBuf,

    /// Bind address, overrides the config file.
    #[arg(long)]
    bind: Option<String>,

    /// Bind port, overrides the config file.
    #[arg(long)]
    port: Option<u16>,

    /// Directory holding uploaded originals, overrides the config file.
    #[arg(long)]
    originals_dir: Option<PathBuf>,

    /// Directory holding derived cache renditions, overrides the config file.
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Maximum number of cached renditions, overrides the config file.
    #[arg(long)]
    cache_capacity: Option<usize>,

    /// Advisory cap on total cache bytes (e.g. "500 MB"), overrides the config file.
    #[arg(long)]
    cache_max_size: Option<String>,

    /// Create the originals/cache directories at startup if absent, overrides the config file.
    #[arg(long)]
    create_dirs: Option<bool>,

    /// Raise directory/file permissions to a safe minimum at startup, overrides the config file.
    #[arg(long)]
    set_permissions: Option<bool>,
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("received SIGINT, shutting down"),
            _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for Ctrl+C");
        info!("received Ctrl+C, shutting down");
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("imgcache=info".parse().unwrap()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let overrides = CliOverrides {
        bind: cli.bind,
        port: cli.port,
        originals_dir: cli.originals_dir,
        cache_dir: cli.cache_dir,
        cache_capacity: cli.cache_capacity,
        cache_max_size: cli.cache_max_size,
        create_dirs: cli.create_dirs,
        set_permissions: cli.set_permissions,
    };

    let cfg = config::load(&cli.config, overrides).unwrap_or_else(|e| {
        error!(error = %e, "invalid configuration");
        std::process::exit(1);
    });

    let engine = Engine::new(EngineOptions::from(&cfg)).unwrap_or_else(|e| {
        error!(error = %e, "failed to construct engine");
        std::process::exit(1);
    });

    let state = AppState { engine: Arc::new(engine) };

    let app = Router::new()
        .route("/health", get(routes::health))
        .route("/images", get(routes::list_images).post(routes::add_image))
        .route("/images/{id}", get(routes::get_image).delete(routes::delete_image))
        .route("/stat", get(routes::get_stat))
        .route("/stat/{id}", get(routes::get_stat_id))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", cfg.bind, cfg.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap_or_else(|e| {
        error!(addr = %addr, error = %e, "could not bind listener");
        std::process::exit(1);
    });

    info!(addr = %addr, originals_dir = %cfg.originals_dir.display(), cache_dir = %cfg.cache_dir.display(), "imgcache listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await.unwrap();
}
