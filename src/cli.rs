use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Silent,
}

impl LogLevel {
    /// Filter directive for tracing-subscriber.
    pub fn directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Silent => "off",
        }
    }
}

/// Checks for updates to antivirus and repair tools and downloads them into
/// category directories
#[derive(Parser, Debug)]
#[command(name = "antivirus-updater")]
#[command(author, version, long_about = None)]
pub struct Args {
    /// Log verbosity
    #[arg(short, long, value_enum, default_value = "info")]
    pub loglevel: LogLevel,

    /// Only process entries of this category (alias such as `fast`, or directory such as `2_fast`)
    #[arg(short, long)]
    pub category: Option<String>,

    /// Only process entries whose URL or name prefix contains this text
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Downloads directory
    #[arg(short, long, default_value = "Downloads")]
    pub output: String,

    /// JSON catalogue to use instead of the built-in one
    #[arg(long)]
    pub catalogue: Option<String>,

    /// Number of requests in flight
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,

    /// HTTP proxy (e.g., http://127.0.0.1:7890)
    #[arg(long)]
    pub proxy: Option<String>,

    /// Do not draw progress bars
    #[arg(long)]
    pub no_progress: bool,

    /// Print the selected catalogue entries and exit
    #[arg(long)]
    pub list: bool,
}
