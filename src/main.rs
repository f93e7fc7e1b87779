//! safezip CLI application
//!
//! Command-line interface that fetches remote files, vets them against a
//! reputation service and returns them as zip archives.

use std::process;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use safezip::cli::{handle_config, handle_fetch, Cli, Commands};
use safezip::config::{AppConfig, LoggingConfig};
use safezip::constants::env;
use safezip::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();

    // Load errors surface again when the command reads the config
    let logging = AppConfig::load(cli.global.config.clone())
        .await
        .map(|config| config.logging)
        .unwrap_or_default();
    init_logging(&cli, &logging);

    info!("safezip v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Fetch(args) => {
            info!("Executing fetch command");
            handle_fetch(&cli.global, args).await
        }
        Commands::Config(args) => {
            info!("Executing config command");
            handle_config(&cli.global, args).await
        }
    }
}

/// Initialize logging from CLI verbosity, `RUST_LOG` and the config file
///
/// A verbosity flag always applies. Without one, `RUST_LOG` takes over when
/// set, else `[logging] level` is used.
fn init_logging(cli: &Cli, logging: &LoggingConfig) {
    let rust_log_set = std::env::var_os(env::RUST_LOG).is_some();
    let log_level = match cli.flag_log_level() {
        Some(level) => Some(level),
        None if rust_log_set => None,
        None => Some(cli.effective_log_level(logging)),
    };

    let mut filter = EnvFilter::from_default_env();
    if let Some(log_level) = log_level {
        if let Ok(directive) = format!("safezip={}", log_level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose) // Show levels only in very verbose mode
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
