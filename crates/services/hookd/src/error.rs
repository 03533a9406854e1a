//! Error types for the hook daemon.

/// Errors that can occur in the hook daemon.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    IO(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] hook_config::error::Error),

    #[error(transparent)]
    Store(#[from] hook_store::error::Error),

    #[error(transparent)]
    Web(#[from] hook_web::error::Error),

    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),

    #[error("Log write failed on {failed} of {total} destinations")]
    SinkFailed { failed: usize, total: usize },

    #[error("Response stream closed")]
    StreamClosed,

    #[error("Inherited socket unusable - {0}")]
    InheritedSocket(String),

    #[error("Invalid job handle '{0}'")]
    InvalidHandle(String),

    #[error("No free job handle after {0} attempts")]
    HandleExhausted(usize),

    #[error("The access token must not be empty")]
    EmptyToken,

    #[error("Job worker stopped")]
    WorkerStopped,
}

impl From<Error> for hook_web::error::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Web(err) => err,
            Error::Config(err) => Self::Config(err),
            Error::Store(err) => Self::Store(err),
            other => Self::Dispatch(other.to_string()),
        }
    }
}
