//! SalesPulse - dashboard service entry point

use clap::{Parser, Subcommand};
use salespulse::config::DashboardConfig;
use salespulse::dashboard::{BootstrapFile, Dashboard};
use salespulse::ingest::UploadRequest;
use salespulse::lifecycle_span;
use salespulse::observability::{
    health::HealthServer, init_default_logging, init_logging, metrics::metrics, LogFormat,
};
use salespulse::store::{DocumentStore, MemoryStore, SqliteStore};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{error, info, warn, Instrument, Level};

/// Sales performance dashboard backend
#[derive(Parser)]
#[command(name = "salespulse")]
#[command(about = "Sales performance dashboard: spreadsheet ingestion and a role-filtered JSON API")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the API and health servers
    Serve,
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Import a CSV or Excel file for a branch
    Import {
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        branch: String,
    },
    /// Create users and set initial passwords from a TOML file
    BootstrapUsers {
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
    },
    /// Remove duplicate sales records, keeping the newest of each group
    CleanupDuplicates,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.verbose {
        0 => init_default_logging(),
        1 => init_logging(Level::DEBUG, log_format(), false),
        _ => init_logging(Level::TRACE, log_format(), true),
    }

    info!("Starting salespulse v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Serve => run_server(config).await,
        Commands::Config { show } => handle_config_command(&config, show),
        Commands::Import { file, branch } => import_file(config, &file, branch).await,
        Commands::BootstrapUsers { file } => bootstrap_users(config, &file).await,
        Commands::CleanupDuplicates => cleanup_duplicates(config).await,
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Application shutdown complete");
}

fn log_format() -> LogFormat {
    LogFormat::parse(&std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()))
}

fn load_configuration(
    config_path: Option<&Path>,
) -> Result<DashboardConfig, Box<dyn std::error::Error>> {
    if let Some(path) = config_path {
        info!("Loading configuration from: {}", path.display());
        return Ok(DashboardConfig::load_from_file(path)?);
    }

    for path_str in ["dashboard.toml", "config/dashboard.toml"] {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return Ok(DashboardConfig::load_from_file(&path)?);
        }
    }

    warn!("No configuration file found, using defaults and environment overrides");
    Ok(DashboardConfig::from_env()?)
}

async fn open_store(
    config: &DashboardConfig,
) -> Result<Arc<dyn DocumentStore>, Box<dyn std::error::Error>> {
    match &config.storage.data_file {
        Some(path) => {
            info!("Opening database: {}", path.display());
            Ok(Arc::new(SqliteStore::open(path.clone()).await?))
        }
        None => {
            warn!("No database configured; data is kept in memory only");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn run_server(config: DashboardConfig) -> Result<(), Box<dyn std::error::Error>> {
    let collector = metrics();
    collector.set_service_state("initializing");

    let addr = config.api_addr()?;
    let store = open_store(&config).await?;
    let health_port = config.server.health_port;
    let bind_address = config.server.bind_address.clone();
    let dashboard = Arc::new(Dashboard::new(store.clone(), config));

    // Start health server
    let health_server = Arc::new(HealthServer::new("salespulse", health_port, store));
    let health_server_clone = health_server.clone();
    tokio::spawn(async move {
        if let Err(e) = health_server_clone.start(&bind_address).await {
            error!("Health server error: {}", e);
        }
    });

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(
        salespulse::api::serve(dashboard, addr, async move {
            let _ = shutdown_rx.await;
        })
        .instrument(lifecycle_span!(event = "serve")),
    );
    health_server.set_api_listening(true);
    collector.set_service_state("running");

    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down gracefully...");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }

    collector.set_service_state("stopping");
    health_server.set_api_listening(false);
    let _ = shutdown_tx.send(());
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            collector.set_service_state("error");
            return Err(e.into());
        }
        Err(e) => {
            collector.set_service_state("error");
            return Err(e.into());
        }
    }

    collector.set_service_state("stopped");
    Ok(())
}

fn handle_config_command(
    config: &DashboardConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(config)?);
    }

    info!("Configuration validation complete");
    Ok(())
}

async fn import_file(
    config: DashboardConfig,
    file: &Path,
    branch: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = tokio::fs::read(file).await?;
    let file_name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());

    let store = open_store(&config).await?;
    let dashboard = Dashboard::new(store, config);
    let report = dashboard
        .upload(UploadRequest {
            file_name,
            mime: None,
            bytes,
            branch,
        })
        .await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn bootstrap_users(config: DashboardConfig, file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let content = tokio::fs::read_to_string(file).await?;
    let users: BootstrapFile = toml::from_str(&content)?;

    let store = open_store(&config).await?;
    let dashboard = Dashboard::new(store, config);
    let report = dashboard.bootstrap_users(users).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn cleanup_duplicates(config: DashboardConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(&config).await?;
    store.health_check().await?;
    let dashboard = Dashboard::new(store, config);
    let report = dashboard.cleanup_duplicates().await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
