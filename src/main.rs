//! osr-assessment server binary

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use osr_assessment::api::{create_router, AppState, ENDPOINTS};
use osr_assessment::cache::ScoreCache;
use osr_assessment::{AssessmentService, Config, ResponseStore};

#[derive(Parser)]
#[command(name = "osr-assessment")]
#[command(about = "Operational standards assessment API")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "osr-assessment.toml")]
    config: PathBuf,

    /// Interface to bind (overrides config file)
    #[arg(long, env = "HOST")]
    host: Option<IpAddr>,

    /// HTTP port (overrides config file)
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Expose internal error messages in responses
    #[arg(long, env = "APP_DEBUG")]
    debug: bool,

    /// Deployment environment reported by the health check
    #[arg(long, env = "APP_ENV")]
    environment: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load or create default config
    let mut config = Config::load(&cli.config)?;

    // Apply CLI overrides
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if cli.debug {
        config.server.debug = true;
    }
    if let Some(environment) = cli.environment {
        config.server.environment = environment;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("osr_assessment={},tower_http=info", config.logging.level).into()
            }),
        )
        .init();

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("Starting osr-assessment");
    info!("Config file: {}", cli.config.display());
    info!("Environment: {}", config.server.environment);
    info!(
        enabled = config.cache.enabled,
        ttl_secs = config.cache.score_ttl_secs,
        max_entries = config.cache.max_entries,
        "Score cache configured"
    );

    let service = AssessmentService::new(
        Arc::new(ResponseStore::new()),
        ScoreCache::from_config(&config.cache),
    );
    let addr = config.listen_addr();
    let app = create_router(Arc::new(AppState::new(service, config)));

    info!("Registered routes:");
    for (name, path) in ENDPOINTS {
        info!("  {} {}", name, path);
    }

    info!("API listening on http://{}/api", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
