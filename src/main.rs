//! AstroChart - natal chart aspects over HTTP
//!
//! Serves planet positions, houses and aspects for a birth moment, and a
//! language-model personality summary of the Sun, Moon and rising signs.
//! Chart positions come from an external chart service; summaries come
//! from the configured chain of text-generation backends.
//!
//! Exit codes:
//!   0 - Clean shutdown
//!   1 - Startup error (invalid arguments, config, bind failure, etc.)

mod aspects;
mod chart;
mod cli;
mod config;
mod error;
mod localization;
mod models;
mod narrative;
mod server;

use anyhow::{Context, Result};
use aspects::AspectDetector;
use chart::RemoteChartSource;
use cli::Args;
use config::{Config, DEFAULT_CONFIG_FILE};
use localization::Localizer;
use narrative::BackendChain;
use server::AppState;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("AstroChart v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(args).await {
        error!("Startup failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .astrochart.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to customize the orb, chart service and narrative backends.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Load configuration, wire up collaborators and serve until shutdown.
async fn run(args: Args) -> Result<()> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate()?;

    let detector = AspectDetector::from_config(&config.aspects);
    info!(
        "Aspect orb {}°, ignoring {:?}",
        detector.orb(),
        config.aspects.ignore_keywords
    );

    let chart = RemoteChartSource::new(&config.chart).context("Failed to build chart client")?;
    let narrative = BackendChain::from_config(&config.narrative)
        .context("Failed to build narrative backends")?;
    info!("Narrative backends: {}", narrative.names().join(" -> "));

    let state = AppState {
        detector: Arc::new(detector),
        chart: Arc::new(chart),
        narrative: Arc::new(narrative),
        localizer: Arc::new(Localizer::from_config(&config.localization)),
        birth_defaults: Arc::new(config.chart.birth_defaults()),
    };

    server::serve(state, &config.server).await
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
