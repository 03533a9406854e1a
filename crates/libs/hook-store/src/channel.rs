//! Broadcast channel carrying dispatched jobs.
//!
//! Publishing is fire and forget: a message reaches whoever is subscribed at
//! that moment and is lost otherwise.

use std::{fmt, pin::Pin};

use futures_util::{Stream, StreamExt};
use redis::{AsyncCommands, Client, Msg, aio::ConnectionManager};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

use crate::prelude::*;

/// Name of the pub/sub channel jobs are published on.
pub const JOB_CHANNEL: &str = "hook_command_jobs";

const LOCAL_CAPACITY: usize = 1024;

/// Publishing side of the job channel.
#[derive(Clone)]
pub enum JobChannel {
    Local(broadcast::Sender<String>),
    Redis {
        client: Client,
        conn: ConnectionManager,
    },
}

impl fmt::Debug for JobChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobChannel::Local(tx) => {
                write!(f, "JobChannel::Local({} receivers)", tx.receiver_count())
            }
            JobChannel::Redis { .. } => f.write_str("JobChannel::Redis"),
        }
    }
}

impl JobChannel {
    /// A channel that only reaches subscribers in this process.
    pub fn local() -> Self {
        let (tx, _) = broadcast::channel(LOCAL_CAPACITY);
        JobChannel::Local(tx)
    }

    /// A channel shared by every process using the same Redis server.
    pub async fn redis(client: Client) -> Result<Self> {
        let conn = client.get_connection_manager().await?;
        Ok(JobChannel::Redis { client, conn })
    }

    /// Publish one payload; returns how many subscribers received it.
    pub async fn publish(&self, payload: &str) -> Result<usize> {
        match self {
            // A send error only means nobody is listening.
            JobChannel::Local(tx) => Ok(tx.send(payload.to_string()).unwrap_or(0)),
            JobChannel::Redis { conn, .. } => {
                let mut conn = conn.clone();
                let receivers: usize = conn.publish(JOB_CHANNEL, payload).await?;
                Ok(receivers)
            }
        }
    }

    /// Start receiving payloads published from now on.
    pub async fn subscribe(&self) -> Result<JobSubscription> {
        match self {
            JobChannel::Local(tx) => Ok(JobSubscription::Local(tx.subscribe())),
            JobChannel::Redis { client, .. } => {
                let mut pubsub = client.get_async_pubsub().await?;
                pubsub.subscribe(JOB_CHANNEL).await?;
                Ok(JobSubscription::Redis(Box::pin(pubsub.into_on_message())))
            }
        }
    }
}

/// Receiving side of the job channel.
pub enum JobSubscription {
    Local(broadcast::Receiver<String>),
    Redis(Pin<Box<dyn Stream<Item = Msg> + Send>>),
}

impl JobSubscription {
    /// Next payload, or `None` once the channel is gone.
    pub async fn next(&mut self) -> Option<String> {
        match self {
            JobSubscription::Local(rx) => loop {
                match rx.recv().await {
                    Ok(payload) => return Some(payload),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Job subscriber lagged behind, {skipped} jobs dropped");
                    }
                    Err(RecvError::Closed) => return None,
                }
            },
            JobSubscription::Redis(messages) => loop {
                let msg = messages.next().await?;
                match msg.get_payload::<String>() {
                    Ok(payload) => return Some(payload),
                    Err(err) => warn!("Dropping unreadable job message - {err}"),
                }
            },
        }
    }
}
