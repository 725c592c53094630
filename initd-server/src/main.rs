//! initd-server - system configuration bootstrap service
//!
//! Startup sequence:
//! 1. Resolve bootstrap config (CLI > ENV > TOML > defaults)
//! 2. Open the configuration database
//! 3. Load and publish the merged system configuration (exit on failure)
//! 4. Serve the init data endpoint

use anyhow::{Context, Result};
use clap::{builder::BoolishValueParser, Parser};
use initd_common::config::{load_toml_config, BootstrapConfig, BootstrapOverrides};
use initd_common::db::init_database;
use initd_server::{build_router, AppState, InitSettings, SystemInitializer, SYSTEM_STATE};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Command-line arguments for initd-server
#[derive(Parser, Debug)]
#[command(name = "initd-server")]
#[command(about = "System configuration bootstrap service")]
#[command(version)]
struct Args {
    /// Bootstrap TOML file (default: <config dir>/initd/initd.toml)
    #[arg(short, long, env = "INITD_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long, env = "INITD_BIND_ADDR")]
    bind: Option<String>,

    /// SQLite database holding system configuration records
    #[arg(short, long, env = "INITD_DATABASE")]
    database: Option<PathBuf>,

    /// Directory containing config.json
    #[arg(long, env = "INITD_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// JSON manifest providing the system version
    #[arg(long, env = "INITD_VERSION_MANIFEST")]
    version_manifest: Option<PathBuf>,

    /// Pro service URL (enables isPlus)
    #[arg(long, env = "INITD_PRO_URL")]
    pro_url: Option<String>,

    /// Development mode; `--dev false` or INITD_DEV_MODE=false overrides the TOML value
    #[arg(
        long,
        env = "INITD_DEV_MODE",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    dev: Option<bool>,
}

impl Args {
    fn overrides(&self) -> BootstrapOverrides {
        BootstrapOverrides {
            bind_addr: self.bind.clone(),
            database_path: self.database.clone(),
            config_dir: self.config_dir.clone(),
            version_manifest: self.version_manifest.clone(),
            pro_url: self.pro_url.clone(),
            dev_mode: self.dev,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = load_toml_config(args.config.as_deref())
        .context("Failed to load bootstrap config")?;
    let config = BootstrapConfig::resolve(args.overrides(), &toml_config);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    // Build identification first, before any database delays
    info!(
        "Starting initd-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Config directory: {}", config.config_dir.display());
    info!("Database path: {}", config.database_path.display());
    if config.dev_mode {
        warn!("Development mode enabled");
    }

    let pool = init_database(&config.database_path)
        .await
        .context("Failed to open configuration database")?;

    let state = SYSTEM_STATE.clone();
    let initializer = SystemInitializer::new(
        state.clone(),
        pool,
        InitSettings {
            config_dir: config.config_dir.clone(),
            version_manifest: config.version_manifest.clone(),
            is_plus: config.is_plus(),
            dev_mode: config.dev_mode,
        },
    );

    let outcome = initializer
        .get_init_config()
        .await
        .context("Failed to load system config")?;
    info!("System config: {:?}", outcome);

    spawn_reload_on_hangup(initializer);

    let app = build_router(AppState::new(state));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("initd-server listening on http://{}", config.bind_addr);
    info!("Health check: http://{}/health", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("initd-server stopped");
    Ok(())
}

#[cfg(unix)]
fn spawn_reload_on_hangup(initializer: SystemInitializer) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(s) => s,
            Err(e) => {
                warn!("SIGHUP reload disabled: {}", e);
                return;
            }
        };

        while hangup.recv().await.is_some() {
            if let Err(e) = initializer.reload().await {
                error!("Reload failed, keeping previous config: {}", e);
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_reload_on_hangup(_initializer: SystemInitializer) {}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
