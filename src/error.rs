use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The output directory already holds as many files as the writer may create.
///
/// This is a configuration problem (limit too small, or nothing is pruning old
/// files), so the writer treats it as fatal and latches it. It is `Clone` so the
/// same error can be handed to every waiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{} holds {found} files, limit is {limit}", dir.display())]
pub struct FileLimitExceeded {
    pub dir: PathBuf,
    pub limit: usize,
    pub found: usize,
}

/// Errors produced by the writer and its collaborators.
#[derive(Error, Debug)]
pub enum WriterError {
    /// Filesystem failure while opening, writing or closing an output file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No new file may be created in the output directory.
    #[error("file limit reached: {0}")]
    FileLimit(#[from] FileLimitExceeded),

    /// Accepting the record would push buffered bytes past the ceiling.
    #[error("buffer full: {pending} bytes pending, record of {record} bytes, ceiling {max}")]
    BufferFull {
        pending: usize,
        record: usize,
        max: usize,
    },

    /// The writer was shut down and accepts no more records.
    #[error("writer is shut down")]
    Closed,

    /// A configuration value is out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The writer was built outside a tokio runtime and none was supplied.
    #[error("no tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    /// A structured record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WriterError>;
