use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use snapcache_engine::{
    CacheManager, FetchAndCacheTask, FetchRequest, HttpImageFetcher, JobHandle, JobState,
    NotifyError, RetryScheduler, WidgetStateStore,
};
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};

mod cli;
mod config;
mod error;
mod utils;

use cli::{CliArgs, Command, SizeArgs};
use config::ProgramConfig;
use error::AppError;
use utils::parse_duration;

const WATCH_TAG: &str = "watch";
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(3600);

fn main() -> ExitCode {
    match bootstrap() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            error!(error = ?e, "Application failed");
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn bootstrap() -> Result<ExitCode, AppError> {
    let args = CliArgs::parse();

    init_logging(&args)?;

    let config = ProgramConfig::from_args(&args)?;
    info!(
        base_url = %config.fetcher.base_url,
        max_attempts = config.retry.max_attempts,
        backoff_base = ?config.scheduler.backoff_base,
        "Loaded configuration"
    );

    match args.command {
        Command::Fetch { size, force } => fetch(&config, size, force).await,
        Command::Watch { size, interval } => {
            let interval = parse_duration(&interval)?;
            watch(&config, size, interval).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Show => {
            show(&config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::ClearCache => {
            let cache = CacheManager::new(config.fetcher.cache_config.clone()).await?;
            cache.clear().await?;
            info!("Cache cleared");
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Logs go to stderr so stdout stays clean for JSON output
fn init_logging(args: &CliArgs) -> Result<(), AppError> {
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let writer = match &args.log_file {
        Some(path) => {
            let log_file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            BoxMakeWriter::new(MakeWriterExt::and(std::io::stderr, log_file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(writer)
        .with_ansi(args.log_file.is_none())
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| AppError::Initialization(e.to_string()))
}

struct Engine {
    scheduler: RetryScheduler,
    store: Arc<WidgetStateStore>,
    cache: Arc<CacheManager>,
}

async fn build_engine(config: &ProgramConfig) -> Result<Engine, AppError> {
    let fetcher = Arc::new(HttpImageFetcher::from_config(config.fetcher.clone()).await?);
    let cache = Arc::clone(fetcher.cache());
    let store = Arc::new(WidgetStateStore::open(&config.state_file).await?);

    let task = FetchAndCacheTask::new(fetcher, store.clone(), config.fetcher.provider.clone())
        .with_retry_policy(config.retry);
    let scheduler = RetryScheduler::new(Arc::new(task), config.scheduler.clone());

    Ok(Engine {
        scheduler,
        store,
        cache,
    })
}

async fn fetch(config: &ProgramConfig, size: SizeArgs, force: bool) -> Result<ExitCode, AppError> {
    let request = FetchRequest::new(size.width, size.height, force)?;
    let engine = build_engine(config).await?;
    let handle = engine.scheduler.submit(request, "fetch");

    let state = tokio::select! {
        state = handle.wait() => state,
        result = tokio::signal::ctrl_c() => {
            result?;
            warn!("Interrupted, cancelling fetch");
            engine.scheduler.shutdown();
            handle.wait().await
        }
    };

    info!(key = %handle.key(), state = ?state, attempts = handle.attempts(), "Fetch finished");
    if state != JobState::Succeeded {
        return Ok(ExitCode::FAILURE);
    }

    if let Some(widget) = engine.store.get(&handle.key().to_string()) {
        let json = serde_json::to_string_pretty(&widget).map_err(NotifyError::from)?;
        println!("{json}");
    }
    Ok(ExitCode::SUCCESS)
}

async fn watch(config: &ProgramConfig, size: SizeArgs, interval: Duration) -> Result<(), AppError> {
    if interval.is_zero() {
        return Err(AppError::InvalidInput("--interval must be positive".to_string()));
    }
    // Validate once up front; every tick builds the same request
    FetchRequest::new(size.width, size.height, true)?;

    let engine = build_engine(config).await?;
    let maintenance = Arc::clone(&engine.cache).start_maintenance_task(MAINTENANCE_INTERVAL);
    let mut ticker = tokio::time::interval(interval);

    info!(interval = ?interval, "Watching for refreshes, press Ctrl-C to stop");
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let request = FetchRequest::new(size.width, size.height, true)?;
                let handle = engine.scheduler.submit(request, WATCH_TAG);
                tokio::spawn(report(handle));
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
        }
    }

    let cancelled = engine.scheduler.cancel(WATCH_TAG);
    maintenance.abort();
    info!(cancelled = cancelled, "Stopped watching");
    Ok(())
}

async fn report(handle: JobHandle) {
    let state = handle.wait().await;
    match state {
        JobState::Succeeded => {
            info!(key = %handle.key(), attempts = handle.attempts(), "Refresh published")
        }
        JobState::Cancelled => info!(key = %handle.key(), "Refresh superseded or cancelled"),
        _ => warn!(key = %handle.key(), state = ?state, "Refresh gave up"),
    }
}

async fn show(config: &ProgramConfig) -> Result<(), AppError> {
    let store = WidgetStateStore::open(&config.state_file).await?;
    let json = serde_json::to_string_pretty(&store.snapshot()).map_err(NotifyError::from)?;
    println!("{json}");
    Ok(())
}
