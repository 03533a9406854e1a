//! Pull based reading of one log partition.

use futures_util::{Stream, stream};
use tracing::trace;

use crate::{LogStore, Partition, prelude::*};

/// Records fetched per round trip unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Result of one [`LogStreamReader::read`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pull {
    /// Bytes written at the start of the caller's buffer.
    pub written: usize,
    /// No record is left to read.
    pub end: bool,
}

impl Pull {
    const END: Pull = Pull {
        written: 0,
        end: true,
    };
}

/// Reads a partition's records in order, concatenated into caller supplied
/// buffers.
///
/// The partition length is sampled on the first read; records appended
/// afterwards are not returned. A record is only ever written whole, so a
/// read stops early once the next record would not fit, and the cursor only
/// moves past records that were written. A record longer than the whole
/// buffer yields `written == 0` without `end`; the caller has to retry with
/// a larger buffer.
#[derive(Debug)]
pub struct LogStreamReader {
    store: LogStore,
    partition: Partition,
    batch_size: usize,
    cursor: usize,
    len: Option<usize>,
    finished: bool,
}

impl LogStreamReader {
    pub fn new(store: LogStore, partition: Partition) -> Self {
        Self {
            store,
            partition,
            batch_size: DEFAULT_BATCH_SIZE,
            cursor: 0,
            len: None,
            finished: false,
        }
    }

    /// Use a different number of records per fetch.
    pub fn with_batch_size(mut self, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::InvalidBatchSize);
        }
        self.batch_size = batch_size;
        Ok(self)
    }

    /// Index of the next record to be returned.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Copy the next records into `buf`.
    ///
    /// At most one batch is fetched per call.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<Pull> {
        if self.finished {
            return Ok(Pull::END);
        }

        let len = match self.len {
            Some(len) => len,
            None => {
                let len = self.store.length(&self.partition).await?;
                self.len = Some(len);
                len
            }
        };
        if self.cursor >= len {
            self.finished = true;
            return Ok(Pull::END);
        }

        let last = (self.cursor + self.batch_size).min(len) - 1;
        let records = self.store.range(&self.partition, self.cursor, last).await?;
        if records.is_empty() {
            // Expired since the length was sampled.
            trace!("{} vanished while being read", self.partition.key());
            self.finished = true;
            return Ok(Pull::END);
        }

        let mut written = 0;
        for record in &records {
            let bytes = record.as_bytes();
            if written + bytes.len() > buf.len() {
                break;
            }
            buf[written..written + bytes.len()].copy_from_slice(bytes);
            written += bytes.len();
            self.cursor += 1;
        }

        let end = self.cursor >= len;
        self.finished = end;
        Ok(Pull { written, end })
    }

    /// Turn the reader into a stream of chunks of at most `chunk_size` bytes,
    /// growing the chunk when a single record would not fit.
    pub fn into_stream(self, chunk_size: usize) -> impl Stream<Item = Result<Vec<u8>>> + Send {
        stream::try_unfold((self, chunk_size.max(1), false), next_chunk)
    }
}

type ChunkState = (LogStreamReader, usize, bool);

async fn next_chunk(
    (mut reader, mut chunk_size, done): ChunkState,
) -> Result<Option<(Vec<u8>, ChunkState)>> {
    if done {
        return Ok(None);
    }
    loop {
        let mut buf = vec![0; chunk_size];
        let pull = reader.read(&mut buf).await?;
        if pull.written == 0 {
            if pull.end {
                return Ok(None);
            }
            chunk_size *= 2;
            continue;
        }
        buf.truncate(pull.written);
        return Ok(Some((buf, (reader, chunk_size, pull.end))));
    }
}
