//! Line oriented capture of a process' two output streams.

use std::future::Future;

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    sync::mpsc,
};
use tracing::{debug, error};

/// Destination for the lines read from one output stream.
///
/// Implementations deal with their own failures; the fan-in never stops
/// reading because a sink could not record a line.
pub trait LineSink: Clone + Send + Sync + 'static {
    fn write_line(&self, line: String) -> impl Future<Output = ()> + Send;
}

impl LineSink for mpsc::Sender<String> {
    async fn write_line(&self, line: String) {
        if self.send(line).await.is_err() {
            debug!("Line receiver dropped, discarding line");
        }
    }
}

/// What was read from one stream.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StreamStats {
    pub lines: usize,
    pub bytes: usize,
}

/// What was read from both streams.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainStats {
    pub stdout: StreamStats,
    pub stderr: StreamStats,
}

/// Read `stdout` and `stderr` concurrently until both reach EOF.
///
/// Each stream gets its own task; a line is handed to its sink as soon as it
/// is complete, with the terminator (`\n` or `\r\n`) stripped. No order is
/// imposed between lines of different streams. A read error ends that
/// stream as if it had reached EOF.
pub async fn drain<O, E, I, S>(stdout: O, stderr: E, info: I, error: S) -> DrainStats
where
    O: AsyncRead + Unpin + Send + 'static,
    E: AsyncRead + Unpin + Send + 'static,
    I: LineSink,
    S: LineSink,
{
    let stdout_task = tokio::spawn(scan_lines(stdout, info));
    let stderr_task = tokio::spawn(scan_lines(stderr, error));
    let (stdout, stderr) = tokio::join!(stdout_task, stderr_task);

    DrainStats {
        stdout: stdout.unwrap_or_else(|err| {
            error!("stdout reader task failed - {err}");
            StreamStats::default()
        }),
        stderr: stderr.unwrap_or_else(|err| {
            error!("stderr reader task failed - {err}");
            StreamStats::default()
        }),
    }
}

async fn scan_lines<R, K>(stream: R, sink: K) -> StreamStats
where
    R: AsyncRead + Unpin,
    K: LineSink,
{
    let mut reader = BufReader::new(stream);
    let mut buffer = Vec::new();
    let mut stats = StreamStats::default();
    loop {
        buffer.clear();
        match reader.read_until(b'\n', &mut buffer).await {
            Ok(0) => break, // EOF
            Ok(n) => {
                stats.bytes += n;
                stats.lines += 1;
                sink.write_line(decode_line(&buffer)).await;
            }
            Err(err) => {
                debug!("Stopped reading process output - {err}");
                break;
            }
        }
    }
    stats
}

fn decode_line(raw: &[u8]) -> String {
    let line = raw.strip_suffix(b"\n").unwrap_or(raw);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}
