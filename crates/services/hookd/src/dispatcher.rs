//! Background job dispatch.
//!
//! Accepted jobs are published on the job channel and the request returns at
//! once with the job handle. A worker subscribed to the channel, in this
//! process or in any other instance sharing the same backend, picks the job
//! up and runs it on its own task, writing the output to the log store under
//! that handle.

use std::sync::Arc;

use hook_config::ExecStep;
use hook_store::handle::JobHandle;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{
    context::Context,
    executor::{JobOutcome, execute},
    prelude::*,
    sink::ExecLoggers,
};

/// Fresh handles drawn before giving up on finding an unused one.
const HANDLE_ATTEMPTS: usize = 8;

/// Message published for every accepted job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMessage {
    pub job: String,
    pub handle: String,
    pub steps: Vec<ExecStep>,
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    ctx: Arc<Context>,
}

impl Dispatcher {
    pub fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    /// Subscribe to the job channel and run every job received on it.
    ///
    /// The subscription is in place when this returns, so jobs submitted
    /// afterwards by this process are not lost.
    pub async fn start_worker(&self) -> Result<JoinHandle<()>> {
        let mut subscription = self.ctx.channel.subscribe().await?;
        let ctx = self.ctx.clone();
        Ok(tokio::spawn(async move {
            while let Some(payload) = subscription.next().await {
                match decode(&payload) {
                    Ok((message, handle)) => {
                        tokio::spawn(run_job(ctx.clone(), message, handle));
                    }
                    Err(err) => warn!("Ignoring malformed job message - {err}"),
                }
            }
            warn!("Job channel closed, worker stopping");
        }))
    }

    /// Publish a resolved job and return its handle without waiting for it
    /// to run.
    pub async fn submit(&self, job: &str, steps: Vec<ExecStep>) -> Result<JobHandle> {
        let handle = self.allocate_handle().await?;
        let payload = serde_json::to_string(&JobMessage {
            job: job.to_string(),
            handle: handle.to_string(),
            steps,
        })?;

        let receivers = self.ctx.channel.publish(&payload).await?;
        if receivers == 0 {
            warn!(job, handle = %handle, "No worker is subscribed, the job will not run");
        } else {
            info!(job, handle = %handle, "Job accepted");
        }
        Ok(handle)
    }

    /// Draw handles until one is not in use by a stored job.
    async fn allocate_handle(&self) -> Result<JobHandle> {
        for _ in 0..HANDLE_ATTEMPTS {
            let handle = JobHandle::generate();
            match self.ctx.store.exists(&handle).await {
                Ok(false) => return Ok(handle),
                Ok(true) => debug!("Handle {handle} already in use, drawing another"),
                // Logging is best effort, an unreachable store must not
                // refuse the job.
                Err(err) => {
                    warn!("Could not check handle {handle} for collisions - {err}");
                    return Ok(handle);
                }
            }
        }
        Err(Error::HandleExhausted(HANDLE_ATTEMPTS))
    }
}

fn decode(payload: &str) -> Result<(JobMessage, JobHandle)> {
    let message: JobMessage = serde_json::from_str(payload)?;
    let Some(handle) = JobHandle::parse(&message.handle) else {
        return Err(Error::InvalidHandle(message.handle));
    };
    Ok((message, handle))
}

async fn run_job(ctx: Arc<Context>, message: JobMessage, handle: JobHandle) {
    info!(job = %message.job, handle = %handle, "Job start");
    let loggers = ExecLoggers::stored(&message.job, &handle, &ctx.store);
    let report = execute(&message.steps, &ctx.scripts_root, &loggers).await;
    match report.outcome {
        JobOutcome::Completed => info!(job = %message.job, handle = %handle, "Job finished"),
        JobOutcome::Aborted { step, reason } => error!(
            job = %message.job,
            handle = %handle,
            "Job aborted at step {} - {reason:?}",
            step + 1
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use hook_config::JobSources;
    use hook_store::{JobChannel, LogClass, LogStore, LogStreamReader, Partition};
    use hook_web::mw_token::AccessToken;

    use super::*;
    use crate::cli::Mode;

    fn context(root: &std::path::Path) -> Arc<Context> {
        Arc::new(Context {
            sources: JobSources::default(),
            scripts_root: root.to_path_buf(),
            mode: Mode::Async,
            token: AccessToken::new("t"),
            store: LogStore::memory(Duration::from_secs(60)),
            channel: JobChannel::local(),
            read_batch: 100,
        })
    }

    async fn read_all(store: &LogStore, handle: &JobHandle, class: LogClass) -> String {
        let reader = LogStreamReader::new(store.clone(), Partition::new(handle.clone(), class));
        let mut stream = Box::pin(reader.into_stream(256));
        let mut out = Vec::new();
        while let Some(chunk) = futures::StreamExt::next(&mut stream).await {
            out.extend(chunk.unwrap());
        }
        String::from_utf8(out).unwrap()
    }

    async fn wait_for_eol(store: &LogStore, handle: &JobHandle) -> String {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let info = read_all(store, handle, LogClass::Info).await;
                if info.ends_with("EOL\n") {
                    return info;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("job never finished")
    }

    #[tokio::test]
    async fn submitted_job_runs_on_the_worker() {
        let root = tempfile::tempdir().unwrap();
        let ctx = context(root.path());
        let dispatcher = Dispatcher::new(ctx.clone());
        let _worker = dispatcher.start_worker().await.unwrap();

        let steps = vec![ExecStep::new("greet", "echo", vec!["hi there"])];
        let handle = dispatcher.submit("greet", steps).await.unwrap();

        let info = wait_for_eol(&ctx.store, &handle).await;
        assert!(info.contains("hi there\n"));
        assert!(info.contains("Job exited with code 0\n"));
    }

    #[tokio::test]
    async fn submit_returns_before_the_job_finishes() {
        let root = tempfile::tempdir().unwrap();
        let ctx = context(root.path());
        let dispatcher = Dispatcher::new(ctx.clone());
        let _worker = dispatcher.start_worker().await.unwrap();

        let started = tokio::time::Instant::now();
        let steps = vec![ExecStep::new("slow", "sleep", vec!["2"])];
        let handle = dispatcher.submit("slow", steps).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(handle.as_str().len(), hook_store::handle::HANDLE_LEN);
    }

    #[tokio::test]
    async fn submit_without_worker_still_returns_a_handle() {
        let root = tempfile::tempdir().unwrap();
        let dispatcher = Dispatcher::new(context(root.path()));

        let steps = vec![ExecStep::new("lost", "true", Vec::<String>::new())];
        assert!(dispatcher.submit("lost", steps).await.is_ok());
    }

    #[test]
    fn decode_rejects_bad_handles() {
        let good = serde_json::to_string(&JobMessage {
            job: "j".into(),
            handle: "abcdefghijklmnop".into(),
            steps: Vec::new(),
        })
        .unwrap();
        assert!(decode(&good).is_ok());

        let bad = good.replace("abcdefghijklmnop", "../../etc");
        assert!(decode(&bad).is_err());
        assert!(decode("not json").is_err());
    }
}
