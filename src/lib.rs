mod budget;
mod bus;
mod clock;
mod config;
mod error;
pub mod history;
mod listing;
pub mod logger;
mod phase;
mod rotation;
pub mod shutdown;
mod stream;
mod writer;

pub use budget::{ByteBudget, Chunk, PendingBuffer};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::WriterConfig;
pub use error::{FileLimitExceeded, Result, WriterError};
pub use history::{HistoryEntry, HistoryStore, Role};
pub use listing::{list_dates, list_day, list_files, LogFile};
pub use logger::FileLogger;
pub use phase::Phase;
pub use rotation::{file_name, parse_file_name, RotationPolicy, RotationState};
pub use writer::{RotatingWriter, RotatingWriterBuilder, WriterStats};
