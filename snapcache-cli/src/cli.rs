use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Define CLI arguments
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Fetch, cache and publish sized photos for widgets",
    long_about = "Downloads a photo of the requested size from Picsum Photos (or a compatible\n\
                  provider), keeps it in a local cache and records its path in a widget state\n\
                  file that consumers read. Failed fetches are retried with exponential backoff."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Directory for cached images
    #[arg(long, global = true, help = "Cache directory (default: <tmp>/snapcache)")]
    pub cache_dir: Option<PathBuf>,

    /// Widget state file
    #[arg(
        long,
        global = true,
        default_value = "widget_state.json",
        help = "JSON file where published image paths are stored"
    )]
    pub state_file: PathBuf,

    /// Provider base URL
    #[arg(
        long,
        global = true,
        default_value = "https://picsum.photos",
        help = "Base URL the /<width>/<height> path is appended to"
    )]
    pub base_url: String,

    /// Attempt number at which failures become permanent
    #[arg(long, global = true, default_value = "10")]
    pub max_attempts: u32,

    /// Delay before the first retry, doubled on every further one
    #[arg(
        long,
        global = true,
        default_value = "30s",
        help = "First retry delay with optional unit (s, m, h)"
    )]
    pub backoff_base: String,

    /// Overall timeout in seconds
    #[arg(
        long,
        global = true,
        default_value = "30",
        help = "Overall timeout in seconds for HTTP requests (0 disables)"
    )]
    pub timeout: u64,

    /// Connection timeout in seconds
    #[arg(
        long,
        global = true,
        default_value = "10",
        help = "Connection timeout in seconds (time to establish initial connection)"
    )]
    pub connect_timeout: u64,

    /// Custom User-Agent
    #[arg(long, global = true, help = "Custom User-Agent string for HTTP requests")]
    pub user_agent: Option<String>,

    /// Extra HTTP headers
    #[arg(
        short = 'H',
        long = "header",
        global = true,
        help = "Add custom HTTP header (format: 'Name: Value'). Can be used multiple times."
    )]
    pub headers: Vec<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true, help = "Enable detailed debug logging")]
    pub verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch one image and wait until it is published or given up on
    Fetch {
        #[command(flatten)]
        size: SizeArgs,

        /// Drop any cached copy before fetching
        #[arg(short, long)]
        force: bool,
    },

    /// Refresh one image periodically until interrupted
    Watch {
        #[command(flatten)]
        size: SizeArgs,

        /// Refresh interval with optional unit (s, m, h)
        #[arg(short, long, default_value = "30m")]
        interval: String,
    },

    /// Print the widget state as JSON
    Show,

    /// Delete every cached image
    ClearCache,
}

#[derive(Args, Debug, Clone, Copy)]
pub struct SizeArgs {
    /// Requested width, rounded to the nearest pixel
    #[arg(long)]
    pub width: f64,

    /// Requested height, rounded to the nearest pixel
    #[arg(long)]
    pub height: f64,
}
