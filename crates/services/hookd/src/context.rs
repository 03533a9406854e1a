//! Everything a request or a job needs, built once at startup.

use std::{path::PathBuf, time::Duration};

use hook_config::JobSources;
use hook_store::{JobChannel, LogStore};
use hook_web::mw_token::AccessToken;
use tracing::warn;

use crate::{
    cli::{Cli, Mode},
    prelude::*,
};

/// Shared, read only service state.
#[derive(Debug)]
pub struct Context {
    pub sources: JobSources,
    pub scripts_root: PathBuf,
    pub mode: Mode,
    pub token: AccessToken,
    pub store: LogStore,
    pub channel: JobChannel,
    pub read_batch: usize,
}

impl Context {
    /// Build the context from command-line settings, connecting to Redis
    /// when a URL is given.
    pub async fn from_cli(cli: &Cli) -> Result<Self> {
        if cli.token.is_empty() {
            return Err(Error::EmptyToken);
        }
        let sources = JobSources::new(cli.config_file.clone(), cli.config_dir.clone());
        if sources.file.is_none() && sources.dir.is_none() {
            return Err(hook_config::error::Error::NoSources.into());
        }
        if !cli.scripts_dir.is_dir() {
            warn!(
                "Scripts directory {} does not exist, steps will fail to start",
                cli.scripts_dir.display()
            );
        }
        let (store, channel) = hook_store::connect(
            cli.redis_url.as_deref(),
            Duration::from_secs(cli.log_ttl_secs),
        )
        .await?;

        Ok(Self {
            sources,
            scripts_root: cli.scripts_dir.clone(),
            mode: cli.mode,
            token: AccessToken::new(cli.token.clone()),
            store,
            channel,
            read_batch: cli.read_batch.max(1),
        })
    }
}
