//! HTTP surface of the daemon.
//!
//! - `POST /` runs the job named by `X-HOOK-JOB`: streamed back in sync mode,
//!   dispatched with its handle as the answer in async mode.
//! - `GET /job/{handle}` streams a dispatched job's info log followed by its
//!   error log.
//!
//! Both require the `X-HOOK-TOKEN` secret.

use std::{convert::Infallible, future::Future, sync::Arc};

use axum::{
    Router,
    body::{Body, Bytes},
    extract::{Path, State},
    http::header::CONTENT_TYPE,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures::{StreamExt, stream};
use hook_config::{ExecStep, JobSources};
use hook_store::{LogClass, LogStreamReader, Partition, handle::JobHandle};
use hook_web::{
    error::Error as WebError,
    job_request::{JobName, JobRequest},
    mw_token::mw_require_token,
    prelude::Result as WebResult,
};
use tokio::{net::TcpListener, sync::mpsc, task::JoinHandle};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::{
    cli::Mode,
    context::Context,
    dispatcher::Dispatcher,
    executor::{JobOutcome, execute},
    prelude::*,
    sink::ExecLoggers,
};

/// Lines buffered between a running sync job and its response body.
const STREAM_BUFFER: usize = 64;

/// Starting chunk size when streaming stored logs.
const LOG_CHUNK: usize = 8 * 1024;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

#[derive(Debug, Clone)]
pub struct ApiState {
    pub ctx: Arc<Context>,
    pub dispatcher: Dispatcher,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", post(post_job))
        .route("/job/{handle}", get(get_job_logs))
        .route_layer(middleware::from_fn_with_state(
            state.ctx.token.clone(),
            mw_require_token,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API on `listener` until `shutdown` resolves.
pub async fn setup_api<F>(
    listener: TcpListener,
    state: ApiState,
    shutdown: F,
) -> Result<JoinHandle<Result<()>>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(state);
    debug!("listening on {}", listener.local_addr()?);
    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    });
    Ok(handle)
}

async fn post_job(
    State(state): State<ApiState>,
    JobName(job): JobName,
    body: Bytes,
) -> WebResult<Response> {
    let mut steps = resolve_steps(&state.ctx.sources, &job)
        .await
        .inspect_err(|err| {
            error!(job = %job, "Failed to resolve job configuration - {err}");
        })?;
    if steps.is_empty() {
        warn!(job = %job, "Configuration not found");
        return Err(WebError::JobNotFound);
    }

    let request = JobRequest::from_body(&body)?;
    for step in &mut steps {
        step.extend_env(&request.env);
    }

    match state.ctx.mode {
        Mode::Sync => Ok(stream_job(state.ctx.clone(), job, steps)),
        Mode::Async => {
            let handle = state.dispatcher.submit(&job, steps).await?;
            Ok(handle.to_string().into_response())
        }
    }
}

/// Read the steps of `job` on the blocking pool; the configuration is read
/// from disk on every request.
async fn resolve_steps(sources: &JobSources, job: &str) -> Result<Vec<ExecStep>> {
    let sources = sources.clone();
    let job = job.to_string();
    let task = tokio::task::spawn_blocking(move || sources.resolve(&job));
    Ok(task.await??)
}

/// Run the job alongside the response and stream its output lines as they
/// are produced.
///
/// The job runs on its own task so it finishes even if the client goes
/// away.
fn stream_job(ctx: Arc<Context>, job: String, steps: Vec<ExecStep>) -> Response {
    let (tx, rx) = mpsc::channel::<String>(STREAM_BUFFER);
    tokio::spawn(async move {
        info!(job = %job, "Job start");
        let loggers = ExecLoggers::streaming(&job, tx);
        let report = execute(&steps, &ctx.scripts_root, &loggers).await;
        match report.outcome {
            JobOutcome::Completed => info!(job = %job, "Job finished"),
            JobOutcome::Aborted { step, .. } => {
                error!(job = %job, "Job aborted at step {}", step + 1)
            }
        }
    });

    let lines = stream::unfold(rx, |mut rx| async move {
        let line = rx.recv().await?;
        Some((Ok::<_, Infallible>(line), rx))
    });
    let response = ([(CONTENT_TYPE, TEXT_PLAIN)], Body::from_stream(lines));
    response.into_response()
}

async fn get_job_logs(
    State(state): State<ApiState>,
    Path(handle): Path<String>,
) -> WebResult<Response> {
    let handle = JobHandle::parse(&handle).ok_or(WebError::JobNotFound)?;
    let store = &state.ctx.store;
    if !store.exists(&handle).await? {
        return Err(WebError::JobNotFound);
    }

    let reader = |class| {
        LogStreamReader::new(store.clone(), Partition::new(handle.clone(), class))
            .with_batch_size(state.ctx.read_batch)
    };
    let info = reader(LogClass::Info)?;
    let errors = reader(LogClass::Error)?;

    let body = info
        .into_stream(LOG_CHUNK)
        .chain(errors.into_stream(LOG_CHUNK));
    let response = ([(CONTENT_TYPE, TEXT_PLAIN)], Body::from_stream(body));
    Ok(response.into_response())
}
