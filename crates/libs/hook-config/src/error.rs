//! Configuration error types.

use std::path::PathBuf;

/// Configuration errors.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O operation failed.
    #[error(transparent)]
    IO(#[from] std::io::Error),

    /// A configuration source could not be read.
    #[error("Failed to read configuration {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// JSON deserialization failed.
    #[error("Invalid JSON configuration {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// TOML deserialization failed.
    #[error("Invalid TOML configuration {path}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Neither a configuration file nor a configuration directory was given.
    #[error("No job configuration source configured")]
    NoSources,
}
