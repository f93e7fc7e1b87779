//! Command-line argument parsing for safezip
//!
//! This module defines the CLI structure using clap derive macros: fetching
//! URLs through the pipeline and managing the configuration file.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use url::Url;

use crate::config::LoggingConfig;

/// safezip - fetch remote files, vet them and hand them back zipped
#[derive(Parser, Debug)]
#[command(
    name = "safezip",
    version,
    about = "Fetch remote files, check them against a reputation service and return them zipped",
    long_about = "Downloads each URL, checks the content digest against VirusTotal and stores vetted
content as a zip archive keyed by its SHA-256. Identical content is only checked and archived once."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Store directory path
    #[arg(long, global = true, value_name = "DIR")]
    pub store_dir: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch, vet and zip remote files
    Fetch(FetchArgs),

    /// Manage the configuration file
    Config(ConfigArgs),
}

/// Arguments for the fetch command
#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    /// URLs to fetch
    #[arg(required = true, value_name = "URL")]
    pub urls: Vec<Url>,

    /// File name to use inside the archive (single URL only)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Owner recorded with each request
    #[arg(long)]
    pub owner: Option<String>,

    /// Directory ready artifacts are copied to
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub output: PathBuf,

    /// Seconds to wait for each request before giving up
    #[arg(short, long, value_name = "SECS", default_value = "1800")]
    pub timeout: u64,
}

/// Arguments for configuration management
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Write the default configuration file
    Init {
        /// Target path (user config directory if omitted)
        #[arg(value_name = "FILE")]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the log level based on verbosity flags
    pub fn log_level(&self) -> tracing::Level {
        self.flag_log_level().unwrap_or(tracing::Level::WARN)
    }

    /// Level requested by `-q`, `-v` or `--very-verbose`, if any
    pub fn flag_log_level(&self) -> Option<tracing::Level> {
        if self.global.quiet {
            Some(tracing::Level::ERROR)
        } else if self.global.very_verbose {
            Some(tracing::Level::DEBUG)
        } else if self.global.verbose {
            Some(tracing::Level::INFO)
        } else {
            None
        }
    }

    /// Flags win over the configured level; an invalid setting falls back
    /// to the flag default
    pub fn effective_log_level(&self, logging: &LoggingConfig) -> tracing::Level {
        self.flag_log_level()
            .or_else(|| logging.level().ok())
            .unwrap_or(tracing::Level::WARN)
    }
}

impl FetchArgs {
    /// Reject option combinations that cannot be honoured
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_some() && self.urls.len() > 1 {
            return Err("--name can only be used with a single URL".to_string());
        }

        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err("--name must not be empty".to_string());
        }

        if self.timeout == 0 {
            return Err("--timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}
