//! Hook daemon (hookd)
//!
//! Runs locally configured commands when a webhook is called. A request
//! names a job in `X-HOOK-JOB`; the job's steps run one after another as
//! child processes and stop at the first failure.
//!
//! - **Sync mode**: the request waits for the job and receives its output
//!   as it is produced, each line prefixed `OUT: ` or `ERR: `.
//! - **Async mode**: the request is answered with a job handle right away.
//!   The job is published on the job channel, run by a worker, and its
//!   output kept in the log store for an hour, readable through
//!   `GET /job/{handle}`.

use std::{future::Future, net::SocketAddr, sync::Arc};

use tokio::{net::TcpListener, task::JoinHandle};
use tracing::{error, info};

use crate::{
    api::{ApiState, setup_api},
    cli::Mode,
    context::Context,
    dispatcher::Dispatcher,
    prelude::*,
};

pub mod api;
pub mod cli;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod listener;
pub mod prelude;
pub mod sink;

/// A running daemon.
#[derive(Debug)]
pub struct Server {
    pub local_addr: SocketAddr,
    pub api: JoinHandle<Result<()>>,
    /// Only present in async mode.
    pub worker: Option<JoinHandle<()>>,
}

/// Start the job worker (async mode) and the HTTP API.
///
/// The worker subscribes before the API accepts its first request. The API
/// stops accepting connections once `shutdown` resolves.
pub async fn start<F>(ctx: Arc<Context>, listener: TcpListener, shutdown: F) -> Result<Server>
where
    F: Future<Output = ()> + Send + 'static,
{
    let dispatcher = Dispatcher::new(ctx.clone());
    let worker = match ctx.mode {
        Mode::Async => Some(dispatcher.start_worker().await?),
        Mode::Sync => None,
    };
    let local_addr = listener.local_addr()?;
    let api = setup_api(listener, ApiState { ctx, dispatcher }, shutdown).await?;
    Ok(Server {
        local_addr,
        api,
        worker,
    })
}

/// Serve until the API stops.
///
/// A worker that stops while the API is still up is an error: accepted async
/// jobs would no longer run.
pub async fn run(server: Server) -> Result<()> {
    let Server { api, worker, .. } = server;
    let worker = async move {
        match worker {
            Some(worker) => worker.await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        result = api => {
            result??;
            info!("Server stopped");
            Ok(())
        }
        result = worker => {
            match result {
                Ok(()) => error!("Job worker stopped"),
                Err(err) => error!("Job worker failed - {err}"),
            }
            Err(Error::WorkerStopped)
        }
    }
}
