//! Gatehouse - HTTP service guarded by ordered security filter chains

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;

use config::{BootstrapAccount, Config, ConfigSource, LoggingConfig};
use gatehouse_api::{AppState, create_router};
use gatehouse_auth::{AccountAuthenticationProvider, Profiles, WebSecurity, spawn_session_reaper};
use gatehouse_db::{Database, NewAccount};

/// Gatehouse - HTTP service guarded by ordered security filter chains
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Bind address
    #[arg(long, env = "GATEHOUSE_BIND")]
    bind: Option<String>,

    /// Port
    #[arg(short, long, env = "GATEHOUSE_PORT")]
    port: Option<u16>,

    /// Additional active profiles, comma separated (e.g. `docs`)
    #[arg(long, env = "GATEHOUSE_PROFILES")]
    profiles: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (config, source) = Config::load(&args.config)?;

    init_logging(&config.logging);

    info!("Starting Gatehouse v{}", env!("CARGO_PKG_VERSION"));
    match source {
        ConfigSource::File => info!("Loaded configuration from {}", args.config),
        ConfigSource::Defaults => {
            info!("Config file not found at {}, using defaults", args.config)
        }
    }

    let mut profiles = Profiles::new(&config.profiles).context("Invalid profile in configuration")?;
    if let Some(list) = &args.profiles {
        profiles.extend(Profiles::parse(list).context("Invalid profile on command line")?);
    }
    info!("Active profiles: {}", profiles);

    // Initialize database
    if let Some(parent) = Path::new(&config.database.path).parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    let db_path = format!("sqlite:{}?mode=rwc", config.database.path);
    let db = Database::new(&db_path).await?;

    seed_accounts(&db, &config.security.accounts).await?;

    // Assemble the security chains; any error here stops the boot
    let provider = Arc::new(AccountAuthenticationProvider::with_default_encoder(db.clone()));
    let security = Arc::new(
        WebSecurity::from_settings(config.security.settings.clone(), &profiles, provider)
            .context("Invalid security configuration")?,
    );

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    spawn_session_reaper(security.sessions().clone(), config.security.session_sweep_secs);

    let state = AppState::new(db, security, profiles);

    let app = create_router(state, Some(Arc::new(metrics_handle)))
        .layer(TraceLayer::new_for_http());

    // Determine bind address
    let bind_addr = args.bind.unwrap_or(config.server.bind_address);
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", bind_addr, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind_addr, port))?;

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Create the configured accounts when none exist yet
async fn seed_accounts(db: &Database, accounts: &[BootstrapAccount]) -> Result<()> {
    if db.has_accounts().await? {
        return Ok(());
    }

    for account in accounts {
        let password_hash = gatehouse_auth::hash_password(&account.password)?;
        db.insert_account(NewAccount {
            username: account.username.clone(),
            password_hash,
            roles: account.roles.clone(),
        })
        .await?;
        info!(
            "Bootstrap account '{}' created with roles {:?}",
            account.username, account.roles
        );
    }

    if accounts.iter().any(|a| a.username == a.password) {
        warn!("A bootstrap account uses its username as password; change it before deploying");
    }
    Ok(())
}

/// Initialize logging
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    if logging.format == "json" {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
