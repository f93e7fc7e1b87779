//! Command handlers for the safezip CLI
//!
//! This module implements the command handlers that connect CLI arguments
//! to the pipeline and the configuration file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::app::{
    Artifact, ContentStore, HttpFetcher, LocalContentStore, Pipeline, RequestId, RequestStatus,
    VirusTotalChecker, ZipArchiver,
};
use crate::cli::{ConfigAction, ConfigArgs, FetchArgs, GlobalArgs};
use crate::config::AppConfig;
use crate::constants::workers;
use crate::errors::{AppError, ConfigError, Result};

/// Final state of one submitted URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlOutcome {
    /// Artifact copied to the given path
    Saved { url: Url, path: PathBuf },
    /// Request ended in an error
    Failed { url: Url, message: String },
}

impl UrlOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, UrlOutcome::Failed { .. })
    }
}

/// Load the configuration with CLI overrides applied
async fn load_config(global: &GlobalArgs) -> Result<AppConfig> {
    let mut config = AppConfig::load(global.config.clone()).await?;
    if let Some(ref dir) = global.store_dir {
        debug!("Store directory overridden: {}", dir.display());
        config.store.root = Some(dir.clone());
    }
    Ok(config)
}

/// Handle the fetch command
///
/// Submits every URL, waits for each request with a spinner and copies
/// ready artifacts into the output directory. Fails if any request ended
/// in an error.
pub async fn handle_fetch(global: &GlobalArgs, args: FetchArgs) -> Result<()> {
    let start_time = Instant::now();
    args.validate().map_err(AppError::generic)?;

    let runtime = load_config(global).await?.to_runtime_config()?;
    runtime.client.validate()?;

    let local_store = LocalContentStore::new(&runtime.store).await?;
    info!("Using content store at {}", local_store.root().display());
    let store: Arc<dyn ContentStore> = Arc::new(local_store);
    let fetcher = Arc::new(HttpFetcher::new(&runtime.client, store.clone())?);
    let checker = Arc::new(VirusTotalChecker::new(&runtime.scan)?);
    let pipeline = Pipeline::new(
        store,
        fetcher,
        checker,
        Arc::new(ZipArchiver::new()),
        runtime.pipeline,
    );

    tokio::fs::create_dir_all(&args.output).await?;

    let mut handle = pipeline.start();
    handle.install_signal_handler();
    let mut shutdown_rx = handle.shutdown_sender().subscribe();

    let mut submitted = Vec::with_capacity(args.urls.len());
    for url in &args.urls {
        let id = pipeline
            .submit(url.clone(), args.name.clone(), args.owner.clone())
            .await;
        submitted.push((url.clone(), id));
    }
    info!("Submitted {} requests", submitted.len());

    let spinner = if global.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        spinner.set_style(style.tick_strings(&["◐", "◓", "◑", "◒"]));
    }
    spinner.enable_steady_tick(Duration::from_millis(120));

    let timeout = Duration::from_secs(args.timeout);
    let total = submitted.len();
    let mut outcomes = Vec::with_capacity(total);
    let mut interrupted = false;

    for (index, (url, id)) in submitted.into_iter().enumerate() {
        spinner.set_message(format!("[{}/{}] Processing {}", index + 1, total, url));

        let status = tokio::select! {
            status = pipeline.wait_for_terminal(&id, workers::STATUS_POLL_INTERVAL, timeout) => status,
            _ = shutdown_rx.recv() => {
                warn!("Interrupted while waiting for {}", url);
                interrupted = true;
                break;
            }
        };

        let outcome = match status {
            Ok(RequestStatus::Ready { .. }) => match save_artifact(&pipeline, &id, &args.output).await {
                Ok(path) => UrlOutcome::Saved { url, path },
                Err(e) => UrlOutcome::Failed {
                    url,
                    message: e.to_string(),
                },
            },
            Ok(RequestStatus::Error { message }) => UrlOutcome::Failed { url, message },
            Ok(other) => UrlOutcome::Failed {
                url,
                message: format!("Request ended as {}", other.description()),
            },
            Err(e) => UrlOutcome::Failed {
                url,
                message: e.to_string(),
            },
        };
        outcomes.push(outcome);
    }
    spinner.finish_and_clear();

    let stats = pipeline.stats().await;
    info!("Broker: {}", stats.summary());
    match handle.shutdown().await {
        Ok(worker_stats) => {
            for stats in worker_stats {
                debug!("{}", stats.summary());
            }
        }
        Err(e) => warn!("Pipeline did not stop cleanly: {}", e),
    }

    if !global.quiet {
        print_summary(&outcomes, start_time.elapsed());
    }

    if interrupted {
        return Err(AppError::generic("Interrupted before all requests finished"));
    }

    let failed = outcomes.iter().filter(|o| o.is_failure()).count();
    if failed > 0 {
        error!("{} of {} requests failed", failed, total);
        return Err(AppError::generic(format!(
            "{} of {} requests failed",
            failed, total
        )));
    }
    Ok(())
}

/// Copy the artifact of a ready request into `output`
async fn save_artifact(pipeline: &Pipeline, id: &RequestId, output: &Path) -> Result<PathBuf> {
    let artifact = pipeline
        .fetch_artifact(id)
        .await?
        .ok_or_else(|| AppError::generic(format!("Artifact for {} is not available", id)))?;
    write_artifact(&artifact, output).await
}

async fn write_artifact(artifact: &Artifact, output: &Path) -> Result<PathBuf> {
    let path = output.join(&artifact.file_name);
    tokio::fs::write(&path, &artifact.bytes).await?;
    info!("Saved {} ({} bytes)", path.display(), artifact.bytes.len());
    Ok(path)
}

fn print_summary(outcomes: &[UrlOutcome], elapsed: Duration) {
    println!();
    for outcome in outcomes {
        match outcome {
            UrlOutcome::Saved { url, path } => println!("✅ {} -> {}", url, path.display()),
            UrlOutcome::Failed { url, message } => println!("❌ {}: {}", url, message),
        }
    }
    let failed = outcomes.iter().filter(|o| o.is_failure()).count();
    println!(
        "\n{} saved, {} failed in {:.1}s",
        outcomes.len() - failed,
        failed,
        elapsed.as_secs_f64()
    );
}

/// Handle the config command
pub async fn handle_config(global: &GlobalArgs, args: ConfigArgs) -> Result<()> {
    match args.action {
        ConfigAction::Show => {
            let config = load_config(global).await?;
            print!("{}", config.to_display_toml()?);
            Ok(())
        }
        ConfigAction::Init { path, force } => {
            let path = match path.or_else(AppConfig::default_config_path) {
                Some(path) => path,
                None => {
                    return Err(ConfigError::InvalidValue {
                        field: "path".to_string(),
                        value: String::new(),
                        reason: "Could not determine user config directory".to_string(),
                    }
                    .into())
                }
            };

            AppConfig::write_default(&path, force).await?;
            if !global.quiet {
                println!("📁 Created default configuration file:");
                println!("   {}", path.display());
            }
            Ok(())
        }
    }
}
