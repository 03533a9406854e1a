//! Job configuration for the hook-command gateway.
//!
//! Maps a job name to the ordered list of commands that run when a hook for
//! that name is received. Configuration can come from a single file, from
//! every file in a directory, or both.
//!
//! # Usage
//!
//! ```rust,no_run
//! use hook_config::JobSources;
//! use std::path::PathBuf;
//!
//! let sources = JobSources::new(Some(PathBuf::from("configuration.json")), None);
//! let steps = sources.resolve("deploy").unwrap();
//! for step in steps {
//!     println!("{}", step.full_command());
//! }
//! ```

pub mod error;
pub mod exec_step;
pub mod job_sources;
pub mod prelude;

pub use exec_step::{ExecStep, JobEnv};
pub use job_sources::JobSources;
