//! Store error types.

/// Log store and job channel errors.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Redis command or connection failed.
    #[error(transparent)]
    Redis(#[from] redis::RedisError),

    /// A reader needs to fetch at least one record per round trip.
    #[error("Batch size must be greater than 0")]
    InvalidBatchSize,
}
