//! Where job output and status records go.
//!
//! A [`LogSink`] is a list of destinations; one write is attempted on every
//! destination and fails if any of them failed. Nothing is rolled back.

use std::sync::Arc;

use hook_io::fanin::LineSink;
use hook_store::{LogClass, LogStore, Partition, handle::JobHandle};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::prelude::*;

/// One log destination.
#[derive(Debug, Clone)]
pub enum SinkTarget {
    /// A tracing event per line.
    Tracing {
        class: LogClass,
        job: Arc<str>,
        handle: Option<JobHandle>,
    },
    /// A record appended to a log store partition.
    Remote {
        store: LogStore,
        partition: Partition,
    },
    /// A prefixed line pushed to a streaming HTTP response.
    Stream {
        tx: mpsc::Sender<String>,
        prefix: &'static str,
    },
}

impl SinkTarget {
    async fn write(&self, line: &str) -> Result<()> {
        match self {
            SinkTarget::Tracing { class, job, handle } => {
                let handle = handle.as_ref().map(JobHandle::as_str).unwrap_or("-");
                match class {
                    LogClass::Info => info!(job = %job, handle = %handle, "{line}"),
                    LogClass::Error => error!(job = %job, handle = %handle, "{line}"),
                }
                Ok(())
            }
            SinkTarget::Remote { store, partition } => {
                store.append(partition, &format!("{line}\n")).await?;
                Ok(())
            }
            SinkTarget::Stream { tx, prefix } => tx
                .send(format!("{prefix}{line}\n"))
                .await
                .map_err(|_| Error::StreamClosed),
        }
    }
}

/// A set of destinations written together.
#[derive(Debug, Clone, Default)]
pub struct LogSink {
    targets: Vec<SinkTarget>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, target: SinkTarget) -> Self {
        self.targets.push(target);
        self
    }

    /// Write `line` to every destination.
    ///
    /// Each failure is logged locally; the error only reports how many
    /// destinations failed.
    pub async fn write(&self, line: &str) -> Result<()> {
        let mut failed = 0;
        for target in &self.targets {
            match target.write(line).await {
                Ok(()) => {}
                // The client went away; the job keeps running regardless.
                Err(Error::StreamClosed) => {
                    debug!("Dropping line for closed response stream");
                    failed += 1;
                }
                Err(err) => {
                    warn!("Failed to write log line - {err}");
                    failed += 1;
                }
            }
        }
        if failed == 0 {
            Ok(())
        } else {
            Err(Error::SinkFailed {
                failed,
                total: self.targets.len(),
            })
        }
    }
}

impl LineSink for LogSink {
    async fn write_line(&self, line: String) {
        // Failures were already reported per destination.
        let _ = self.write(&line).await;
    }
}

/// The four sinks a job writes to.
///
/// `info` and `error` receive status records, `stdout` and `stderr` receive
/// the lines of the corresponding process stream.
#[derive(Debug, Clone)]
pub struct ExecLoggers {
    pub info: LogSink,
    pub error: LogSink,
    pub stdout: LogSink,
    pub stderr: LogSink,
}

impl ExecLoggers {
    /// Loggers of a job whose output is streamed back on the request.
    ///
    /// Status records only go to the local log; process output goes to the
    /// local log and to `tx`, prefixed `OUT: ` or `ERR: `.
    pub fn streaming(job: &str, tx: mpsc::Sender<String>) -> Self {
        let job: Arc<str> = Arc::from(job);
        let local = |class| SinkTarget::Tracing {
            class,
            job: job.clone(),
            handle: None,
        };
        let out = SinkTarget::Stream {
            tx: tx.clone(),
            prefix: "OUT: ",
        };
        let err = SinkTarget::Stream {
            tx,
            prefix: "ERR: ",
        };
        Self {
            info: LogSink::new().with(local(LogClass::Info)),
            error: LogSink::new().with(local(LogClass::Error)),
            stdout: LogSink::new().with(local(LogClass::Info)).with(out),
            stderr: LogSink::new().with(local(LogClass::Error)).with(err),
        }
    }

    /// Loggers of a dispatched job: everything goes to the local log and to
    /// the job's partitions in the store.
    pub fn stored(job: &str, handle: &JobHandle, store: &LogStore) -> Self {
        let job: Arc<str> = Arc::from(job);
        let sink = |class| {
            LogSink::new()
                .with(SinkTarget::Tracing {
                    class,
                    job: job.clone(),
                    handle: Some(handle.clone()),
                })
                .with(SinkTarget::Remote {
                    store: store.clone(),
                    partition: Partition::new(handle.clone(), class),
                })
        };
        let info = sink(LogClass::Info);
        let error = sink(LogClass::Error);
        Self {
            stdout: info.clone(),
            stderr: error.clone(),
            info,
            error,
        }
    }
}
