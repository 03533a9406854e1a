//! Command-line interface and environment settings for hookd.

use std::{fmt, net::IpAddr, path::PathBuf};

use clap::{Parser, ValueEnum};

/// How accepted jobs run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Run the job inside the request and stream its output back.
    Sync,
    /// Answer with a job handle and run the job in the background.
    Async,
}

/// Webhook triggered command runner.
///
/// Every option can also be given through the environment variable named in
/// its help text.
#[derive(Parser, Clone)]
#[command(name = "hookd")]
#[command(about = "Run configured commands when a webhook is called")]
pub struct Cli {
    /// TCP port to listen on
    #[arg(short, long, env = "HOOK_PORT", default_value_t = 10292)]
    pub port: u16,

    /// Address to bind to
    #[arg(long, env = "HOOK_BIND", default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Shared secret expected in the X-HOOK-TOKEN header
    #[arg(short, long, env = "HOOK_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Job configuration file (.json or .toml)
    #[arg(short = 'c', long, env = "HOOK_CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Directory whose .json and .toml files are all loaded as job configuration
    #[arg(short = 'd', long, env = "HOOK_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Root that step working directories are resolved against
    #[arg(short, long, env = "HOOK_SCRIPTS_DIR", default_value = "./scripts")]
    pub scripts_dir: PathBuf,

    /// Whether jobs run inside the request or in the background
    #[arg(short, long, env = "HOOK_MODE", value_enum, default_value = "async")]
    pub mode: Mode,

    /// Redis server shared by all instances; job logs stay in memory without it
    #[arg(short, long, env = "HOOK_REDIS_URL")]
    pub redis_url: Option<String>,

    /// Log records fetched per round trip when streaming job logs
    #[arg(long, env = "HOOK_READ_BATCH", default_value_t = 100)]
    pub read_batch: usize,

    /// Seconds job logs are kept after their last write
    #[arg(long, env = "HOOK_LOG_TTL_SECS", default_value_t = 3600)]
    pub log_ttl_secs: u64,
}

impl fmt::Debug for Cli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cli")
            .field("port", &self.port)
            .field("bind", &self.bind)
            .field("token", &"REDACTED")
            .field("config_file", &self.config_file)
            .field("config_dir", &self.config_dir)
            .field("scripts_dir", &self.scripts_dir)
            .field("mode", &self.mode)
            .field("redis_url", &self.redis_url.as_ref().map(|_| "REDACTED"))
            .field("read_batch", &self.read_batch)
            .field("log_ttl_secs", &self.log_ttl_secs)
            .finish()
    }
}
