//! Loading job configuration from files and directories.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::{exec_step::ExecStep, prelude::*};

/// TOML layout: a list of `[[jobs]]` tables.
#[derive(Debug, Deserialize)]
struct TomlJobs {
    #[serde(default)]
    jobs: Vec<ExecStep>,
}

/// Where job configuration is read from.
///
/// Sources are read on every lookup so edits take effect without a restart.
/// When a job name appears in several sources every matching step is
/// returned, file entries first, then directory entries in file name order.
#[derive(Debug, Clone, Default)]
pub struct JobSources {
    /// Single configuration file.
    pub file: Option<PathBuf>,
    /// Directory whose `.json` and `.toml` files are all loaded.
    pub dir: Option<PathBuf>,
}

impl JobSources {
    pub fn new(file: Option<PathBuf>, dir: Option<PathBuf>) -> Self {
        Self { file, dir }
    }

    /// Load every configured step from all sources.
    pub fn load_all(&self) -> Result<Vec<ExecStep>> {
        if self.file.is_none() && self.dir.is_none() {
            return Err(Error::NoSources);
        }
        let mut steps = Vec::new();
        if let Some(file) = &self.file {
            steps.extend(load_file(file)?);
        }
        if let Some(dir) = &self.dir {
            steps.extend(load_dir(dir)?);
        }
        Ok(steps)
    }

    /// Resolve the ordered steps configured for `job`.
    ///
    /// An empty job name never matches anything.
    pub fn resolve(&self, job: &str) -> Result<Vec<ExecStep>> {
        if job.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .load_all()?
            .into_iter()
            .filter(|step| step.job == job)
            .collect())
    }
}

/// Load one configuration file. `.toml` files use the `[[jobs]]` layout,
/// anything else is parsed as a JSON array.
pub fn load_file(path: &Path) -> Result<Vec<ExecStep>> {
    let contents = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if has_extension(path, "toml") {
        from_toml(&contents).map_err(|source| Error::Toml {
            path: path.to_path_buf(),
            source,
        })
    } else {
        from_json(&contents).map_err(|source| Error::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Load every `.json` and `.toml` file of a directory, sorted by file name.
pub fn load_dir(dir: &Path) -> Result<Vec<ExecStep>> {
    let entries = std::fs::read_dir(dir).map_err(|source| Error::Read {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if has_extension(&path, "json") || has_extension(&path, "toml") {
            files.push(path);
        } else {
            debug!("Skipping non configuration file {}", path.display());
        }
    }
    files.sort();

    let mut steps = Vec::new();
    for file in files {
        steps.extend(load_file(&file)?);
    }
    Ok(steps)
}

pub fn from_json(value: &str) -> std::result::Result<Vec<ExecStep>, serde_json::Error> {
    serde_json::from_str(value)
}

pub fn from_toml(value: &str) -> std::result::Result<Vec<ExecStep>, toml::de::Error> {
    Ok(toml::from_str::<TomlJobs>(value)?.jobs)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}
