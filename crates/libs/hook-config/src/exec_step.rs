//! A single configured command.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Caller supplied environment extension, applied to every step of a job.
pub type JobEnv = BTreeMap<String, String>;

/// One command to run as part of a job.
///
/// Several entries may share the same `job` name; they run in the order they
/// were declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecStep {
    /// Job name this step belongs to.
    pub job: String,
    /// Program to execute.
    pub command: String,
    /// Full argument vector, program name first.
    ///
    /// `["echo", "hello"]` runs `command` with `argv[0] = "echo"` and the
    /// single argument `hello`. When empty the program is started with
    /// `command` as its name and no arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment of the child process as `KEY=VALUE` entries.
    #[serde(default)]
    pub env: Vec<String>,
    /// Working directory, relative to the scripts root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

impl ExecStep {
    /// Create a step running `command` with `arguments`, naming the program
    /// after `command`.
    pub fn new(
        job: impl Into<String>,
        command: impl Into<String>,
        arguments: Vec<impl Into<String>>,
    ) -> Self {
        let command = command.into();
        let args = std::iter::once(command.clone())
            .chain(arguments.into_iter().map(Into::into))
            .collect();
        Self {
            job: job.into(),
            command,
            args,
            env: Vec::new(),
            dir: None,
        }
    }

    /// Name the program sees as `argv[0]`.
    pub fn program_name(&self) -> &str {
        self.args.first().unwrap_or(&self.command)
    }

    /// Arguments passed after the program name.
    pub fn arguments(&self) -> &[String] {
        self.args.get(1..).unwrap_or_default()
    }

    /// Append the caller environment to this step's environment.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hook_config::{ExecStep, JobEnv};
    ///
    /// let mut step = ExecStep::new("build", "make", vec!["all"]);
    /// let mut env = JobEnv::new();
    /// env.insert("BRANCH".to_string(), "main".to_string());
    /// step.extend_env(&env);
    /// assert_eq!(step.env, vec!["BRANCH=main".to_string()]);
    /// ```
    pub fn extend_env(&mut self, env: &JobEnv) {
        self.env
            .extend(env.iter().map(|(key, value)| format!("{key}={value}")));
    }

    /// Directory configured for this step, `None` when unset or empty.
    pub fn dir(&self) -> Option<&str> {
        self.dir.as_deref().filter(|dir| !dir.is_empty())
    }

    /// Get the full command string with arguments.
    pub fn full_command(&self) -> String {
        let arguments = self.arguments();
        if arguments.is_empty() {
            return self.command.clone();
        }
        format!("{} {}", self.command, arguments.join(" "))
    }
}
