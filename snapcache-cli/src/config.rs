use std::path::PathBuf;
use std::time::Duration;

use snapcache_engine::{FetcherConfig, RetryPolicy, SchedulerConfig};

use crate::cli::CliArgs;
use crate::error::AppError;
use crate::utils::{parse_duration, parse_headers};

/// Configuration for the entire program
#[derive(Debug, Clone)]
pub struct ProgramConfig {
    pub fetcher: FetcherConfig,
    pub scheduler: SchedulerConfig,
    pub retry: RetryPolicy,
    /// Where widget state is persisted
    pub state_file: PathBuf,
}

impl ProgramConfig {
    pub fn from_args(args: &CliArgs) -> Result<Self, AppError> {
        if args.max_attempts == 0 {
            return Err(AppError::InvalidInput(
                "--max-attempts must be at least 1".to_string(),
            ));
        }

        let mut builder = FetcherConfig::builder()
            .with_base_url(&args.base_url)
            .with_timeout(Duration::from_secs(args.timeout))
            .with_connect_timeout(Duration::from_secs(args.connect_timeout))
            .with_headers(parse_headers(&args.headers));

        if let Some(dir) = &args.cache_dir {
            builder = builder.with_cache_dir(dir);
        }
        if let Some(user_agent) = &args.user_agent {
            builder = builder.with_user_agent(user_agent);
        }

        let scheduler = SchedulerConfig {
            backoff_base: parse_duration(&args.backoff_base)?,
            ..SchedulerConfig::default()
        };

        Ok(Self {
            fetcher: builder.build(),
            scheduler,
            retry: RetryPolicy {
                max_attempts: args.max_attempts,
            },
            state_file: args.state_file.clone(),
        })
    }
}
