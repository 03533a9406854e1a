//! Low-level async process management utilities.

use std::{
    fmt, io,
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
};

use hook_config::ExecStep;
use tokio::{
    process::{Child, ChildStderr, ChildStdout, Command},
    sync::oneshot,
};
use tracing::{debug, error};

/// Errors that prevent a process from being started.
#[derive(thiserror::Error, Debug)]
pub enum ProcessError {
    /// The working directory does not exist or cannot be accessed.
    #[error("Failed to resolve working directory {dir}: {source}")]
    WorkingDirectory { dir: PathBuf, source: io::Error },

    /// The working directory exists but is not a directory.
    #[error("Working directory {0} is not a directory")]
    NotADirectory(PathBuf),

    /// Failed to spawn the process.
    #[error("Failed to spawn {command}: {source}")]
    SpawnProcessFail { command: String, source: io::Error },

    /// The process started but one of its output pipes is unavailable.
    #[error("Process {0} started without its output pipes")]
    MissingPipe(String),
}

/// How a process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
    /// The process exited on its own with this code.
    Exited(i32),
    /// The process was terminated by this signal.
    Signaled(i32),
    /// The exit status could not be collected.
    WaitFailed(String),
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        matches!(self, ExitOutcome::Exited(0))
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            ExitOutcome::Exited(code) => Some(*code),
            _ => None,
        }
    }
}

impl From<ExitStatus> for ExitOutcome {
    fn from(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return ExitOutcome::Exited(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ExitOutcome::Signaled(signal);
            }
        }
        ExitOutcome::WaitFailed(format!("unrecognized exit status {status}"))
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitOutcome::Exited(code) => write!(f, "exited with code {code}"),
            ExitOutcome::Signaled(signal) => write!(f, "killed by signal {signal}"),
            ExitOutcome::WaitFailed(reason) => write!(f, "exit status unavailable: {reason}"),
        }
    }
}

/// Resolves once with the exit outcome of a started process.
///
/// Independent from the output pipes: the process may have exited while
/// its output is still buffered, and the pipes may reach EOF before the exit
/// status is collected.
#[derive(Debug)]
pub struct Completion {
    rx: oneshot::Receiver<ExitOutcome>,
}

impl Completion {
    pub async fn wait(self) -> ExitOutcome {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => ExitOutcome::WaitFailed(String::from("process watcher stopped")),
        }
    }
}

/// A running process with its outputs.
#[derive(Debug)]
pub struct StartedProcess {
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
    pub completion: Completion,
    /// Non fatal problems found while preparing the process.
    pub warnings: Vec<String>,
}

/// Start one step.
///
/// The working directory is the scripts root when the step has none,
/// otherwise the step directory joined to the scripts root. A relative
/// command containing a path separator is resolved against the working
/// directory; a bare name is looked up in `PATH`. The first entry of the
/// step's `args` is the program name (`argv[0]`), the rest are its
/// arguments.
///
/// The child only sees the environment listed in the step.
///
/// Must be called from within a tokio runtime.
///
/// # Examples
///
/// ```rust,no_run
/// use hook_config::ExecStep;
/// use hook_io::process::start;
/// use std::path::Path;
///
/// #[tokio::main]
/// async fn main() {
///     let step = ExecStep::new("greet", "echo", vec!["Hello"]);
///     let process = start(&step, Path::new("/tmp")).unwrap();
///     let outcome = process.completion.wait().await;
///     assert!(outcome.success());
/// }
/// ```
pub fn start(step: &ExecStep, scripts_root: &Path) -> Result<StartedProcess, ProcessError> {
    let working_dir = resolve_working_dir(step.dir(), scripts_root)?;
    let command = resolve_command(&step.command, &working_dir);
    let (env, warnings) = parse_env(&step.env);

    let mut child = spawn_process(
        &command,
        step.program_name(),
        step.arguments(),
        &env,
        &working_dir,
    )
    .map_err(|source| ProcessError::SpawnProcessFail {
        command: step.command.clone(),
        source,
    })?;
    let pid = child.id();

    let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
        (Some(stdout), Some(stderr)) => (stdout, stderr),
        _ => {
            if let Err(err) = child.start_kill() {
                error!(
                    "Failed to kill {} after losing its pipes - {err}",
                    step.command
                );
            }
            return Err(ProcessError::MissingPipe(step.command.clone()));
        }
    };

    debug!(
        "Started {} (pid {:?}) in {}",
        command.display(),
        pid,
        working_dir.display()
    );

    Ok(StartedProcess {
        stdout,
        stderr,
        completion: watch_exit(child),
        warnings,
    })
}

/// Spawn a new async process with piped stdout and stderr and a closed stdin.
///
/// `program_name` becomes the child's `argv[0]` on unix.
pub fn spawn_process(
    command: &Path,
    program_name: &str,
    args: &[String],
    env: &[(String, String)],
    dir: &Path,
) -> Result<Child, io::Error> {
    let mut cmd = Command::new(command);
    #[cfg(unix)]
    cmd.arg0(program_name);
    #[cfg(not(unix))]
    let _ = program_name;

    cmd.args(args)
        .env_clear()
        .envs(env.iter().map(|(key, value)| (key, value)))
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
}

/// Resolve the working directory of a step and make sure it exists.
pub fn resolve_working_dir(
    dir: Option<&str>,
    scripts_root: &Path,
) -> Result<PathBuf, ProcessError> {
    let candidate = match dir {
        Some(dir) => scripts_root.join(dir),
        None => scripts_root.to_path_buf(),
    };
    let absolute = match std::path::absolute(&candidate) {
        Ok(absolute) => absolute,
        Err(source) => {
            return Err(ProcessError::WorkingDirectory {
                dir: candidate,
                source,
            });
        }
    };

    match std::fs::metadata(&absolute) {
        Ok(metadata) if metadata.is_dir() => Ok(absolute),
        Ok(_) => Err(ProcessError::NotADirectory(absolute)),
        Err(source) => Err(ProcessError::WorkingDirectory {
            dir: absolute,
            source,
        }),
    }
}

pub fn resolve_command(command: &str, working_dir: &Path) -> PathBuf {
    let path = Path::new(command);
    if path.is_relative() && path.components().count() > 1 {
        working_dir.join(path)
    } else {
        path.to_path_buf()
    }
}

/// Split `KEY=VALUE` entries. Entries without a key are reported back as
/// warnings and left out.
fn parse_env(entries: &[String]) -> (Vec<(String, String)>, Vec<String>) {
    let mut vars = Vec::with_capacity(entries.len());
    let mut warnings = Vec::new();
    for entry in entries {
        match entry.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                vars.push((key.to_string(), value.to_string()))
            }
            _ => warnings.push(format!("Ignoring malformed environment entry '{entry}'")),
        }
    }
    (vars, warnings)
}

fn watch_exit(mut child: Child) -> Completion {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let outcome = match child.wait().await {
            Ok(status) => ExitOutcome::from(status),
            Err(err) => ExitOutcome::WaitFailed(err.to_string()),
        };
        let _ = tx.send(outcome);
    });
    Completion { rx }
}
