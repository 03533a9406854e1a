//! Running the steps of one job.

use std::path::Path;

use hook_config::ExecStep;
use hook_io::{
    fanin::drain,
    process::{ExitOutcome, start},
};
use tracing::debug;

use crate::sink::{ExecLoggers, LogSink};

/// Last record of every job's info log.
pub const END_OF_LOG: &str = "EOL";

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Every step exited with code 0.
    Completed,
    /// Step `step` (zero based) could not start or did not succeed; the
    /// steps after it never ran.
    Aborted { step: usize, reason: AbortReason },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    StartFailed(String),
    Exit(ExitOutcome),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    /// Number of processes that were actually started.
    pub steps_started: usize,
    pub outcome: JobOutcome,
}

/// Run `steps` in order, stopping at the first one that fails.
///
/// Output of each step is drained into the loggers while its exit status is
/// awaited; the next step only starts once both are done. Whatever happens,
/// the job's info log ends with the package finished record and
/// [`END_OF_LOG`].
pub async fn execute(
    steps: &[ExecStep],
    scripts_root: &Path,
    loggers: &ExecLoggers,
) -> JobReport {
    record(&loggers.info, "execute job package").await;

    let mut steps_started = 0;
    let mut outcome = JobOutcome::Completed;
    for (index, step) in steps.iter().enumerate() {
        let command = step.full_command();
        record(&loggers.info, &format!("execute job {command}")).await;

        let process = match start(step, scripts_root) {
            Ok(process) => process,
            Err(err) => {
                let message = format!("Failed to start {command} - {err}");
                record(&loggers.error, &message).await;
                outcome = JobOutcome::Aborted {
                    step: index,
                    reason: AbortReason::StartFailed(err.to_string()),
                };
                break;
            }
        };
        steps_started += 1;
        for warning in &process.warnings {
            record(&loggers.error, warning).await;
        }

        let (stats, exit) = tokio::join!(
            drain(
                process.stdout,
                process.stderr,
                loggers.stdout.clone(),
                loggers.stderr.clone(),
            ),
            process.completion.wait(),
        );
        debug!(
            "{command} wrote {} stdout and {} stderr lines",
            stats.stdout.lines, stats.stderr.lines
        );

        match exit {
            ExitOutcome::Exited(0) => {
                record(&loggers.info, "Job exited with code 0").await;
                record(&loggers.info, &format!("execute job finished {command}")).await;
            }
            failure => {
                record(&loggers.error, &format!("Job {failure}")).await;
                outcome = JobOutcome::Aborted {
                    step: index,
                    reason: AbortReason::Exit(failure),
                };
                break;
            }
        }
    }

    record(&loggers.info, "execute job package finished").await;
    record(&loggers.info, END_OF_LOG).await;

    JobReport {
        steps_started,
        outcome,
    }
}

/// Status records are best effort; the sink already logged any failure.
async fn record(sink: &LogSink, line: &str) {
    let _ = sink.write(line).await;
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use hook_store::{LogClass, LogStore, Partition, handle::JobHandle};

    use super::*;

    struct Harness {
        store: LogStore,
        handle: JobHandle,
        loggers: ExecLoggers,
        root: tempfile::TempDir,
    }

    impl Harness {
        fn new() -> Self {
            let store = LogStore::memory(Duration::from_secs(60));
            let handle = JobHandle::generate();
            let loggers = ExecLoggers::stored("test", &handle, &store);
            Self {
                store,
                handle,
                loggers,
                root: tempfile::tempdir().unwrap(),
            }
        }

        async fn records(&self, class: LogClass) -> Vec<String> {
            let partition = Partition::new(self.handle.clone(), class);
            self.store.range(&partition, 0, 10_000).await.unwrap()
        }

        async fn run(&self, steps: &[ExecStep]) -> JobReport {
            execute(steps, self.root.path(), &self.loggers).await
        }
    }

    fn sh(script: &str) -> ExecStep {
        ExecStep::new("test", "sh", vec!["-c", script])
    }

    #[tokio::test]
    async fn completed_job_logs_every_step_and_ends_with_eol() {
        let harness = Harness::new();
        let report = harness.run(&[sh("echo one"), sh("echo two")]).await;

        assert_eq!(report.outcome, JobOutcome::Completed);
        assert_eq!(report.steps_started, 2);
        let info = harness.records(LogClass::Info).await;
        assert_eq!(
            info,
            vec![
                "execute job package\n",
                "execute job sh -c echo one\n",
                "one\n",
                "Job exited with code 0\n",
                "execute job finished sh -c echo one\n",
                "execute job sh -c echo two\n",
                "two\n",
                "Job exited with code 0\n",
                "execute job finished sh -c echo two\n",
                "execute job package finished\n",
                "EOL\n",
            ]
        );
        assert!(harness.records(LogClass::Error).await.is_empty());
    }

    #[tokio::test]
    async fn failing_step_aborts_the_rest() {
        let harness = Harness::new();
        let marker = harness.root.path().join("second-ran");
        let steps = [
            sh("echo first; exit 1"),
            sh(&format!("touch {}", marker.display())),
        ];

        let report = harness.run(&steps).await;

        assert_eq!(report.steps_started, 1);
        assert_eq!(
            report.outcome,
            JobOutcome::Aborted {
                step: 0,
                reason: AbortReason::Exit(ExitOutcome::Exited(1)),
            }
        );
        assert!(!marker.exists());

        let info = harness.records(LogClass::Info).await;
        assert!(info.contains(&"first\n".to_string()));
        assert!(!info.iter().any(|r| r.contains("touch")));
        let tail = &info[info.len() - 2..];
        assert_eq!(tail, ["execute job package finished\n", "EOL\n"]);
        let errors = harness.records(LogClass::Error).await;
        assert_eq!(errors, vec!["Job exited with code 1\n"]);
    }

    #[tokio::test]
    async fn abort_at_step_k_starts_exactly_k_processes() {
        for k in 1..=4usize {
            let harness = Harness::new();
            let steps: Vec<ExecStep> = (1..=4usize)
                .map(|i| sh(if i == k { "exit 7" } else { "true" }))
                .collect();

            let report = harness.run(&steps).await;

            assert_eq!(report.steps_started, k);
            let JobOutcome::Aborted { step, .. } = report.outcome else {
                panic!("job with a failing step completed");
            };
            assert_eq!(step, k - 1);
        }
    }

    #[tokio::test]
    async fn start_failure_is_fatal_and_logged() {
        let harness = Harness::new();
        let mut missing_dir = sh("echo never");
        missing_dir.dir = Some("does/not/exist".to_string());

        let report = harness.run(&[missing_dir, sh("echo later")]).await;

        assert_eq!(report.steps_started, 0);
        let JobOutcome::Aborted { step, reason } = report.outcome else {
            panic!("job with a missing directory completed");
        };
        assert_eq!(step, 0);
        assert!(matches!(reason, AbortReason::StartFailed(_)));
        let errors = harness.records(LogClass::Error).await;
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Failed to start sh -c echo never"));
        let info = harness.records(LogClass::Info).await;
        assert!(!info.contains(&"later\n".to_string()));
        let tail = &info[info.len() - 2..];
        assert_eq!(tail, ["execute job package finished\n", "EOL\n"]);
    }

    #[tokio::test]
    async fn signal_termination_is_reported_distinctly() {
        let harness = Harness::new();
        let report = harness.run(&[sh("kill -9 $$")]).await;

        assert_eq!(
            report.outcome,
            JobOutcome::Aborted {
                step: 0,
                reason: AbortReason::Exit(ExitOutcome::Signaled(9)),
            }
        );
        let errors = harness.records(LogClass::Error).await;
        assert_eq!(errors, vec!["Job killed by signal 9\n"]);
    }

    #[tokio::test]
    async fn stderr_lines_land_in_the_error_log() {
        let harness = Harness::new();
        harness.run(&[sh("echo visible; echo broken >&2")]).await;

        let info = harness.records(LogClass::Info).await;
        let errors = harness.records(LogClass::Error).await;
        assert!(info.contains(&"visible\n".to_string()));
        assert_eq!(errors, vec!["broken\n"]);
    }

    #[tokio::test]
    async fn malformed_env_entries_are_reported_but_not_fatal() {
        let harness = Harness::new();
        let mut step = sh("echo ok");
        step.env = vec!["NOEQUALS".to_string()];

        let report = harness.run(&[step]).await;

        assert_eq!(report.outcome, JobOutcome::Completed);
        let errors = harness.records(LogClass::Error).await;
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("NOEQUALS"));
    }
}
