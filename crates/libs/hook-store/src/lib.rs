//! Job log storage for the hook-command gateway.
//!
//! Every asynchronously dispatched job writes its output into two append
//! only partitions, one for `info` records and one for `error` records,
//! namespaced by the job handle. Partitions expire one hour after their last
//! append. The same backend carries the broadcast channel jobs are
//! dispatched through, so several gateway instances can share it.
//!
//! Two backends exist: an in-process one, used when no Redis URL is given
//! and by the tests, and Redis.
//!
//! # Usage
//!
//! ```rust
//! use hook_store::{LogClass, LogStore, LogStreamReader, Partition, handle::JobHandle};
//!
//! # async fn example() -> hook_store::prelude::Result<()> {
//! let store = LogStore::memory(hook_store::DEFAULT_LOG_TTL);
//! let handle = JobHandle::generate();
//! let partition = Partition::new(handle, LogClass::Info);
//!
//! store.append(&partition, "build started\n").await?;
//!
//! let mut reader = LogStreamReader::new(store.clone(), partition);
//! let mut buf = [0u8; 64];
//! let pull = reader.read(&mut buf).await?;
//! assert_eq!(&buf[..pull.written], b"build started\n");
//! assert!(pull.end);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use tracing::info;

pub mod channel;
pub mod error;
pub mod handle;
pub mod partition;
pub mod prelude;
pub mod reader;
pub mod store;

pub use channel::{JobChannel, JobSubscription};
pub use partition::{LogClass, Partition};
pub use reader::{LogStreamReader, Pull};
pub use store::LogStore;

use crate::prelude::*;

/// Retention of a partition after its last append.
pub const DEFAULT_LOG_TTL: Duration = Duration::from_secs(60 * 60);

/// Build the store and job channel.
///
/// With a Redis URL both share that server; without one they live in this
/// process only.
pub async fn connect(redis_url: Option<&str>, ttl: Duration) -> Result<(LogStore, JobChannel)> {
    match redis_url {
        Some(url) => {
            let client = redis::Client::open(url)?;
            let store = LogStore::redis(&client, ttl).await?;
            let channel = JobChannel::redis(client).await?;
            info!("Using redis log store");
            Ok((store, channel))
        }
        None => {
            info!("Using in-process log store");
            Ok((LogStore::memory(ttl), JobChannel::local()))
        }
    }
}
