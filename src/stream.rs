//! The short-lived output handle behind each flush cycle.

use crate::budget::Chunk;
use futures_util::FutureExt;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// The transport under an [`ActiveStream`].
pub(crate) trait Sink: AsyncWrite + Unpin + Send {
    /// Push everything written so far to durable storage.
    async fn sync(&mut self) -> io::Result<()>;
}

impl Sink for File {
    async fn sync(&mut self) -> io::Result<()> {
        self.sync_data().await
    }
}

/// How the transport took a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteOutcome {
    /// Every byte was accepted on the first poll.
    Accepted,
    /// The transport pushed back at least once; the chunk is complete only
    /// because we waited for it to drain.
    Drained,
}

/// Emitted when a stream is torn down.
#[derive(Debug)]
pub(crate) struct Released {
    pub path: PathBuf,
    pub bytes: u64,
}

/// One open, append-only output file.
#[derive(Debug)]
pub(crate) struct ActiveStream<W = File> {
    path: PathBuf,
    sink: W,
    initial_len: u64,
    written: u64,
}

impl ActiveStream {
    /// Open `path` for appending, creating missing parent directories and the
    /// file itself. Existing content is kept.
    pub async fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        let initial_len = file.metadata().await?.len();
        Ok(ActiveStream::with_sink(path.to_path_buf(), file, initial_len))
    }
}

impl<W: Sink> ActiveStream<W> {
    pub(crate) fn with_sink(path: PathBuf, sink: W, initial_len: u64) -> Self {
        ActiveStream {
            path,
            sink,
            initial_len,
            written: 0,
        }
    }

    /// Write one coalesced chunk.
    ///
    /// Each slice is offered to the sink once without waiting. If the sink is
    /// still busy with an earlier write we record backpressure, await the
    /// write, and drain before reporting the chunk complete.
    pub async fn write_chunk(&mut self, chunk: &Chunk) -> io::Result<WriteOutcome> {
        let mut buf = chunk.as_bytes();
        let mut backpressured = false;

        while !buf.is_empty() {
            let n = match self.sink.write(buf).now_or_never() {
                Some(result) => result?,
                None => {
                    backpressured = true;
                    self.sink.write(buf).await?
                }
            };
            if n == 0 {
                return Err(io::Error::from(io::ErrorKind::WriteZero));
            }
            buf = &buf[n..];
        }
        self.written += chunk.len() as u64;

        if backpressured {
            self.sink.flush().await?;
            Ok(WriteOutcome::Drained)
        } else {
            Ok(WriteOutcome::Accepted)
        }
    }

    /// Flush userspace and OS buffers, then drop the handle.
    ///
    /// Fine to call on a stream that never saw a write.
    pub async fn close(mut self) -> io::Result<Released> {
        self.sink.flush().await?;
        self.sink.sync().await?;
        Ok(Released {
            path: self.path,
            bytes: self.written,
        })
    }

    /// Length of the file when it was opened.
    pub fn initial_len(&self) -> u64 {
        self.initial_len
    }

    /// Bytes this stream has written so far.
    pub fn written(&self) -> u64 {
        self.written
    }
}

/// Current length of `path`, or `None` if it does not exist.
pub(crate) async fn existing_len(path: &Path) -> io::Result<Option<u64>> {
    match fs::metadata(path).await {
        Ok(meta) => Ok(Some(meta.len())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
