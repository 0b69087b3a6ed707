use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::PorticoConfig;
use portico_core::RuntimeRegistry;
use portico_gateway::GatewayServer;

#[derive(Parser)]
#[command(name = "portico")]
#[command(version)]
#[command(about = "Portico, a plugin-route gateway for agent runtimes")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway
    Start,

    /// Initialize config directory and default config
    Init,

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Init => cmd_init().await,
        Commands::Config => cmd_config(&cli.config).await,
        Commands::Start => cmd_start(&cli.config).await,
    }
}

async fn cmd_init() -> Result<()> {
    let config_dir = config::config_dir();
    tokio::fs::create_dir_all(&config_dir)
        .await
        .with_context(|| format!("Failed to create config dir: {}", config_dir.display()))?;

    let config_path = config_dir.join("config.toml");
    if config_path.exists() {
        warn!("Config already exists at {}", config_path.display());
    } else {
        let default_config = toml::to_string_pretty(&PorticoConfig::default())?;
        tokio::fs::write(&config_path, default_config).await?;
        info!("Created default config at {}", config_path.display());
    }

    tokio::fs::create_dir_all(config_dir.join("uploads")).await?;

    println!("Portico initialized at {}", config_dir.display());
    println!("Edit {} to configure the gateway.", config_path.display());
    Ok(())
}

async fn cmd_config(config_path: &Option<PathBuf>) -> Result<()> {
    let config = PorticoConfig::load(config_path.as_ref()).await?;
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

async fn cmd_start(config_path: &Option<PathBuf>) -> Result<()> {
    let config = PorticoConfig::load(config_path.as_ref()).await?;
    let bind = config
        .gateway
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address: {}", config.gateway.bind))?;

    // Runtimes are registered by the embedding process; a standalone start
    // serves an empty pool until something registers.
    let registry = Arc::new(RuntimeRegistry::new());
    info!(
        "Starting gateway on {} with {} runtimes registered",
        bind,
        registry.count().await
    );

    let server = GatewayServer::new(bind, registry, config.uploads_dir());
    let handle = server.spawn();

    signal::ctrl_c().await?;
    info!("Shutting down");
    handle.abort();
    Ok(())
}
