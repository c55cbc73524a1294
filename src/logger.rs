//! Application logging on top of a [`RotatingWriter`].
//!
//! [`FileLogger`] is a [`log::Log`] that turns every record into one line and
//! hands it to an injected writer. The writer reports its own trouble through
//! the `log` facade as well, so records from this crate must never reach a
//! writer: they would feed the very component that is failing. Those records
//! go to a side channel instead, by default a console logger from
//! `env_logger`.

use crate::writer::RotatingWriter;
use chrono::{Local, SecondsFormat};
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

const OWN_TARGET: &str = "daylog";

/// True for records emitted by this crate.
pub fn is_internal_target(target: &str) -> bool {
    target == OWN_TARGET
        || target
            .strip_prefix(OWN_TARGET)
            .is_some_and(|rest| rest.starts_with("::"))
}

/// Format a record as a single log line, without the trailing newline.
///
/// Layout: `{rfc3339 local time} {LEVEL} {target}: {message}`.
pub fn format_record(record: &Record<'_>) -> String {
    format!(
        "{} {:<5} {}: {}",
        Local::now().to_rfc3339_opts(SecondsFormat::Millis, false),
        record.level(),
        record.target(),
        record.args()
    )
}

/// Console logger used for diagnostics that must bypass the writer.
///
/// Honours `RUST_LOG`; shows warnings and errors when it is unset.
pub fn side_channel() -> env_logger::Logger {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .build()
}

/// A [`log::Log`] that persists application records through a writer.
pub struct FileLogger {
    writer: RotatingWriter,
    level: LevelFilter,
    side_channel: Box<dyn Log>,
}

impl FileLogger {
    /// Log records at `level` and above to `writer`, with the default
    /// console side channel.
    pub fn new(writer: RotatingWriter, level: LevelFilter) -> Self {
        Self::with_side_channel(writer, level, side_channel())
    }

    /// Like [`new`](Self::new) with a caller-supplied side channel.
    pub fn with_side_channel(
        writer: RotatingWriter,
        level: LevelFilter,
        side_channel: impl Log + 'static,
    ) -> Self {
        FileLogger {
            writer,
            level,
            side_channel: Box::new(side_channel),
        }
    }

    /// Make this the process-wide `log` backend.
    ///
    /// The maximum level is raised far enough that the side channel still
    /// sees whatever it is configured for.
    pub fn install(self) -> Result<(), SetLoggerError> {
        let max = self.level.max(self.side_channel_level());
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(max);
        Ok(())
    }

    pub fn writer(&self) -> &RotatingWriter {
        &self.writer
    }

    fn side_channel_level(&self) -> LevelFilter {
        [
            log::Level::Trace,
            log::Level::Debug,
            log::Level::Info,
            log::Level::Warn,
            log::Level::Error,
        ]
        .into_iter()
        .find(|level| {
            self.side_channel
                .enabled(&Metadata::builder().level(*level).target(OWN_TARGET).build())
        })
        .map_or(LevelFilter::Off, |level| level.to_level_filter())
    }
}

impl Log for FileLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        if is_internal_target(metadata.target()) {
            self.side_channel.enabled(metadata)
        } else {
            metadata.level() <= self.level
        }
    }

    fn log(&self, record: &Record<'_>) {
        if is_internal_target(record.target()) {
            self.side_channel.log(record);
            return;
        }
        if record.level() <= self.level {
            self.writer.write(format_record(record));
        }
    }

    fn flush(&self) {
        self.side_channel.flush();
    }
}
