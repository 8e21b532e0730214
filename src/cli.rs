//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and log level selection.

use clap::Parser;
use std::path::PathBuf;

/// AstroChart - natal chart aspects over HTTP
///
/// Serves chart data, aspects between planets and an LLM-written
/// personality summary of the Sun, Moon and rising signs.
///
/// Examples:
///   astrochart
///   astrochart --port 8080 --config ./astrochart.toml
///   astrochart --orb 6 --verbose
///   astrochart --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Interface to bind (overrides the config file)
    #[arg(long, value_name = "HOST", env = "HOST")]
    pub host: Option<String>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, value_name = "PORT", env = "PORT")]
    pub port: Option<u16>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .astrochart.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Aspect tolerance in degrees (overrides the config file)
    #[arg(long, value_name = "DEGREES")]
    pub orb: Option<f64>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .astrochart.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.port == Some(0) {
            return Err("Port must be between 1 and 65535".to_string());
        }

        if let Some(orb) = self.orb {
            if !orb.is_finite() || orb <= 0.0 {
                return Err("Orb must be a positive number of degrees".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
