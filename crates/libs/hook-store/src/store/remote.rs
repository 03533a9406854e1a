use std::time::Duration;

use redis::{AsyncCommands, Client, aio::ConnectionManager};

use crate::{Partition, prelude::*};

/// Log store on a Redis server.
///
/// Each partition is a list; `RPUSH` and `EXPIRE` go out in one pipeline so
/// the TTL refresh never lags the append it belongs to.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    ttl_secs: i64,
}

impl RedisStore {
    pub async fn connect(client: &Client, ttl: Duration) -> Result<Self> {
        let conn = client.get_connection_manager().await?;
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX).max(1);
        Ok(Self { conn, ttl_secs })
    }

    pub async fn append(&self, partition: &Partition, record: &str) -> Result<()> {
        let key = partition.key();
        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .rpush(&key, record)
            .ignore()
            .expire(&key, self.ttl_secs)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn length(&self, partition: &Partition) -> Result<usize> {
        let mut conn = self.conn.clone();
        let len: usize = conn.llen(partition.key()).await?;
        Ok(len)
    }

    pub async fn range(
        &self,
        partition: &Partition,
        first: usize,
        last: usize,
    ) -> Result<Vec<String>> {
        let first = isize::try_from(first).unwrap_or(isize::MAX);
        let last = isize::try_from(last).unwrap_or(isize::MAX);
        let mut conn = self.conn.clone();
        let records: Vec<String> = conn.lrange(partition.key(), first, last).await?;
        Ok(records)
    }

    pub async fn contains(&self, partition: &Partition) -> Result<bool> {
        let mut conn = self.conn.clone();
        let found: bool = conn.exists(partition.key()).await?;
        Ok(found)
    }
}
