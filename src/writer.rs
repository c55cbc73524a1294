use crate::budget::{ByteBudget, PendingBuffer};
use crate::bus::ReleaseBus;
use crate::clock::{Clock, SystemClock};
use crate::config::WriterConfig;
use crate::error::{FileLimitExceeded, Result, WriterError};
use crate::listing::{self, LogFile};
use crate::phase::{transition, Phase};
use crate::rotation::{RotationPolicy, RotationState};
use crate::stream::{self, ActiveStream, WriteOutcome};
use chrono::NaiveDate;
use log::{debug, error, warn};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::future::Future;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::runtime::Handle;

/// Counters describing what a writer has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriterStats {
    /// Records taken into the buffer.
    pub records_accepted: u64,
    /// Records discarded: over budget, after shutdown, after a fatal error, or
    /// lost with a chunk whose write failed.
    pub records_dropped: u64,
    /// Coalesced chunks handed to a stream.
    pub chunks_written: u64,
    /// Bytes of chunks written by this writer. Content a file already held
    /// when it was reopened is not counted.
    pub bytes_written: u64,
    /// Streams opened, one per cycle and one per mid-cycle rotation.
    pub files_opened: u64,
    /// Stream teardowns announced on the release bus, including ones caused by
    /// a failed open, write or close.
    pub releases: u64,
    /// Failed opens, writes and closes.
    pub io_errors: u64,
    /// Chunks that had to wait for the file to drain.
    pub backpressure_waits: u64,
}

impl WriterStats {
    fn record_chunk(&mut self, bytes: u64, outcome: WriteOutcome) {
        self.chunks_written += 1;
        self.bytes_written += bytes;
        if outcome == WriteOutcome::Drained {
            self.backpressure_waits += 1;
        }
    }
}

/// A buffered, rotating writer of newline-terminated text records.
///
/// [`write`](Self::write) never blocks: it buffers the record and, if no cycle
/// is running, spawns one on the writer's tokio runtime. A cycle opens the
/// current `{date}.{index}.{ext}` file, writes everything buffered as few
/// coalesced chunks as possible, closes the file and announces the release.
/// Records that arrive mid-cycle ride along in the same cycle.
///
/// Handles are cheap to clone and all refer to the same writer. Build one per
/// output directory and pass it to whoever needs it.
///
/// Call [`shutdown`](Self::shutdown) before the last handle goes away. Records
/// still buffered when the last handle is dropped are written by a blocking
/// `std::fs` append in `Drop`, which stalls the runtime worker it runs on.
///
/// # Examples
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> daylog::Result<()> {
/// use daylog::RotatingWriter;
///
/// let dir = tempfile::tempdir()?;
/// let writer = RotatingWriter::builder(dir.path())
///     .max_file_size(1024 * 1024)
///     .extension("log")
///     .open()?;
///
/// writer.write("first");
/// writer.write("second");
/// writer.wait_next_released().await?;
///
/// let today = writer.rotation_state().date;
/// let files = writer.files_for(today)?;
/// assert_eq!(std::fs::read_to_string(&files[0].path)?, "first\nsecond\n");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RotatingWriter {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    config: WriterConfig,
    policy: RotationPolicy,
    clock: Arc<dyn Clock>,
    runtime: Handle,
    bus: ReleaseBus,
    shared: Mutex<Shared>,
}

#[derive(Debug)]
struct Shared {
    phase: Phase,
    pending: PendingBuffer,
    rotation: RotationState,
    closed: bool,
    failure: Option<FileLimitExceeded>,
    stats: WriterStats,
}

/// Builder for [`RotatingWriter`].
#[derive(Debug)]
pub struct RotatingWriterBuilder {
    config: WriterConfig,
    clock: Arc<dyn Clock>,
    runtime: Option<Handle>,
}

impl RotatingWriterBuilder {
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    pub fn max_file_number(mut self, files: usize) -> Self {
        self.config.max_file_number = files;
        self
    }

    pub fn max_buffer_bytes(mut self, bytes: usize) -> Self {
        self.config.max_buffer_bytes = bytes;
        self
    }

    /// File extension without the leading dot.
    pub fn extension(mut self, ext: impl Into<String>) -> Self {
        self.config.extension = ext.into();
        self
    }

    /// Replace the calendar used for date rotation.
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Run cycles on this runtime instead of the one `open` is called from.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Validate the settings and build the writer.
    ///
    /// Nothing touches the disk until the first write.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError::InvalidConfig`] for out-of-range limits and
    /// [`WriterError::NoRuntime`] when called outside a tokio runtime without
    /// an explicit [`runtime`](Self::runtime).
    pub fn open(self) -> Result<RotatingWriter> {
        self.config.validate()?;
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current()?,
        };

        let policy = RotationPolicy::new(self.config.max_file_size);
        let budget = ByteBudget::new(self.config.max_buffer_bytes);
        let rotation = RotationState::new(self.clock.today());

        Ok(RotatingWriter {
            inner: Arc::new(Inner {
                config: self.config,
                policy,
                clock: self.clock,
                runtime,
                bus: ReleaseBus::new(),
                shared: Mutex::new(Shared {
                    phase: Phase::Idle,
                    pending: PendingBuffer::new(budget),
                    rotation,
                    closed: false,
                    failure: None,
                    stats: WriterStats::default(),
                }),
            }),
        })
    }
}

impl RotatingWriter {
    /// Start building a writer for `dir` with default limits.
    pub fn builder(dir: impl AsRef<Path>) -> RotatingWriterBuilder {
        Self::builder_from(WriterConfig::new(dir))
    }

    /// Start building a writer from an existing config.
    pub fn builder_from(config: WriterConfig) -> RotatingWriterBuilder {
        RotatingWriterBuilder {
            config,
            clock: Arc::new(SystemClock),
            runtime: None,
        }
    }

    /// Build a writer from `config` on the current runtime with the system clock.
    pub fn open(config: WriterConfig) -> Result<Self> {
        Self::builder_from(config).open()
    }

    /// Queue `text` as one record. Never blocks and never fails.
    ///
    /// Records that cannot be accepted are dropped and reported on the
    /// diagnostic log; see [`try_write`](Self::try_write) for the reasons.
    pub fn write(&self, text: impl Into<String>) {
        if let Err(e) = self.try_write(text) {
            match e {
                WriterError::FileLimit(_) => {
                    error!("{}: record dropped: {e}", self.inner.config.dir.display())
                }
                _ => warn!("{}: record dropped: {e}", self.inner.config.dir.display()),
            }
        }
    }

    /// Queue `text` as one record, reporting why it was not accepted.
    ///
    /// # Errors
    ///
    /// - [`WriterError::BufferFull`] if the record would push buffered bytes to
    ///   the ceiling. Already buffered records are unaffected.
    /// - [`WriterError::Closed`] after [`shutdown`](Self::shutdown).
    /// - [`WriterError::FileLimit`] once the writer has failed for lack of
    ///   file slots.
    pub fn try_write(&self, text: impl Into<String>) -> Result<()> {
        let record = text.into();
        let start_cycle = {
            let mut shared = self.inner.lock();
            if let Some(failure) = &shared.failure {
                let failure = failure.clone();
                shared.stats.records_dropped += 1;
                return Err(failure.into());
            }
            if shared.closed {
                shared.stats.records_dropped += 1;
                return Err(WriterError::Closed);
            }

            let pending = shared.pending.bytes();
            let size = record.len();
            if shared.pending.push(record).is_err() {
                shared.stats.records_dropped += 1;
                return Err(WriterError::BufferFull {
                    pending,
                    record: size,
                    max: shared.pending.budget().max_bytes(),
                });
            }
            shared.stats.records_accepted += 1;

            if shared.phase == Phase::Idle {
                transition(&mut shared.phase, Phase::Creating);
                true
            } else {
                false
            }
        };

        if start_cycle {
            self.inner.spawn_cycle();
        }
        Ok(())
    }

    /// Resolve after the next stream release, i.e. once the file written by
    /// the next cycle is closed and its content is on disk.
    ///
    /// The waiter is registered by this call, so the returned future may be
    /// created before the `write` it should cover and awaited later. A
    /// release that happened before the call never satisfies it.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError::FileLimit`] if the writer has failed, or fails
    /// while waiting.
    pub fn wait_next_released(&self) -> impl Future<Output = Result<()>> + Send + use<> {
        self.inner.bus.wait_next_released()
    }

    /// Resolve once no cycle is running or scheduled.
    ///
    /// Unlike [`wait_next_released`](Self::wait_next_released) this cannot
    /// miss a release that already happened.
    pub async fn wait_idle(&self) -> Result<()> {
        loop {
            let mut waiter = self.inner.bus.subscribe();
            {
                let shared = self.inner.lock();
                if let Some(failure) = &shared.failure {
                    return Err(failure.clone().into());
                }
                if !shared.phase.is_busy() {
                    return Ok(());
                }
            }
            waiter.changed().await?;
        }
    }

    /// Stop accepting records, flush everything buffered and wait for the
    /// final release.
    ///
    /// # Errors
    ///
    /// Returns the latched [`WriterError::FileLimit`] if the writer had failed.
    pub async fn shutdown(&self) -> Result<()> {
        let start_cycle = {
            let mut shared = self.inner.lock();
            shared.closed = true;
            if shared.phase == Phase::Idle && !shared.pending.is_empty() {
                transition(&mut shared.phase, Phase::Creating);
                true
            } else {
                false
            }
        };
        if start_cycle {
            self.inner.spawn_cycle();
        }
        self.wait_idle().await
    }

    pub fn config(&self) -> &WriterConfig {
        &self.inner.config
    }

    pub fn dir(&self) -> &Path {
        &self.inner.config.dir
    }

    pub fn phase(&self) -> Phase {
        self.inner.lock().phase
    }

    /// The file the writer is on and how much it has written to it.
    pub fn rotation_state(&self) -> RotationState {
        self.inner.lock().rotation
    }

    pub fn stats(&self) -> WriterStats {
        self.inner.lock().stats
    }

    /// Bytes accepted but not yet handed to a stream.
    pub fn pending_bytes(&self) -> usize {
        self.inner.lock().pending.bytes()
    }

    /// Files this writer's directory holds for `date`, in index order.
    pub fn files_for(&self, date: NaiveDate) -> io::Result<Vec<LogFile>> {
        listing::list_day(&self.inner.config.dir, &self.inner.config.extension, date)
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn enter(&self, next: Phase) {
        transition(&mut self.lock().phase, next);
    }

    fn spawn_cycle(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        self.runtime.spawn(async move { inner.run().await });
    }

    /// Drive cycles until the buffer is empty. Entered in `Creating`.
    async fn run(&self) {
        loop {
            let stream = match self.create().await {
                Ok(stream) => stream,
                Err(WriterError::FileLimit(failure)) => {
                    self.fail(failure);
                    return;
                }
                Err(e) => {
                    self.abandon("open", &e);
                    return;
                }
            };
            self.enter(Phase::Flushing);

            let stream = match self.flush(stream).await {
                Ok(stream) => stream,
                Err(e) => {
                    self.abandon("write", &e);
                    return;
                }
            };
            self.enter(Phase::Closing);

            let closed = stream.close().await;
            let more = {
                let mut shared = self.lock();
                shared.stats.releases += 1;
                let more = match &closed {
                    Ok(_) => !shared.pending.is_empty(),
                    Err(_) => {
                        shared.stats.io_errors += 1;
                        false
                    }
                };
                let next = if more { Phase::Creating } else { Phase::Idle };
                transition(&mut shared.phase, next);
                more
            };
            match closed {
                Ok(released) => debug!(
                    "released {} after {} bytes",
                    released.path.display(),
                    released.bytes
                ),
                Err(e) => warn!("{}: close failed: {e}", self.config.dir.display()),
            }
            self.bus.notify_released();

            if !more {
                return;
            }
        }
    }

    /// Pick the target file and open it.
    ///
    /// Existing files are appended to, and their length counts towards the
    /// size ceiling; full ones are skipped. Creating a file that does not exist
    /// yet is refused once the directory is at its file limit.
    async fn create(&self) -> Result<ActiveStream> {
        let today = self.clock.today();
        let mut state = self.lock().rotation;

        let path = loop {
            state = self.policy.advance(state, today);
            let path = state.path(&self.config.dir, &self.config.extension);
            match stream::existing_len(&path).await? {
                Some(len) => {
                    state.bytes_written = len;
                    if !self.policy.needs_new_file_for_size(&state) {
                        break path;
                    }
                }
                None => {
                    self.check_file_limit().await?;
                    break path;
                }
            }
        };

        let stream = ActiveStream::open(&path).await?;
        state.bytes_written = stream.initial_len();
        {
            let mut shared = self.lock();
            shared.rotation = state;
            shared.stats.files_opened += 1;
        }
        debug!("opened {} at {} bytes", path.display(), stream.initial_len());
        Ok(stream)
    }

    async fn check_file_limit(&self) -> Result<()> {
        let dir = self.config.dir.clone();
        let found = tokio::task::spawn_blocking(move || listing::count_files(&dir))
            .await
            .map_err(io::Error::other)??;
        if found >= self.config.max_file_number {
            return Err(FileLimitExceeded {
                dir: self.config.dir.clone(),
                limit: self.config.max_file_number,
                found,
            }
            .into());
        }
        Ok(())
    }

    /// Write buffered records until none are left.
    ///
    /// Stops early, leaving records buffered, when the file has taken at least
    /// one chunk and the day changed or the size ceiling was reached. The
    /// caller then closes this stream and the next cycle opens the successor.
    async fn flush(&self, mut stream: ActiveStream) -> Result<ActiveStream> {
        loop {
            let chunk = {
                let mut shared = self.lock();
                if stream.written() > 0
                    && !shared.pending.is_empty()
                    && self.policy.needs_rotation(&shared.rotation, self.clock.today())
                {
                    return Ok(stream);
                }
                match shared.pending.take_chunk() {
                    Some(chunk) => chunk,
                    None => return Ok(stream),
                }
            };

            match stream.write_chunk(&chunk).await {
                Ok(outcome) => {
                    let mut shared = self.lock();
                    shared.rotation.bytes_written += chunk.len() as u64;
                    shared.stats.record_chunk(chunk.len() as u64, outcome);
                }
                Err(e) => {
                    self.lock().stats.records_dropped += chunk.records() as u64;
                    return Err(e.into());
                }
            }
        }
    }

    /// Discard the cycle after a transient failure. Buffered records stay and
    /// the next write starts a fresh cycle.
    fn abandon(&self, action: &str, e: &WriterError) {
        {
            let mut shared = self.lock();
            shared.stats.io_errors += 1;
            shared.stats.releases += 1;
            transition(&mut shared.phase, Phase::Idle);
        }
        warn!("{}: {action} failed: {e}", self.config.dir.display());
        self.bus.notify_released();
    }

    fn fail(&self, failure: FileLimitExceeded) {
        {
            let mut shared = self.lock();
            let dropped = shared.pending.drain_records().len();
            shared.stats.records_dropped += dropped as u64;
            shared.failure = Some(failure.clone());
            transition(&mut shared.phase, Phase::Failed);
        }
        error!("writer stopped: {failure}");
        self.bus.notify_failed(failure);
    }

    /// Synchronously append whatever is still buffered. Used when the last
    /// handle goes away, so it must not need the runtime.
    fn final_flush(&mut self) -> io::Result<Option<PathBuf>> {
        let shared = self.shared.get_mut().unwrap_or_else(|e| e.into_inner());
        if shared.pending.is_empty() || shared.failure.is_some() {
            return Ok(None);
        }
        let records = shared.pending.drain_records();
        let state = self.policy.advance(shared.rotation, self.clock.today());
        let path = state.path(&self.config.dir, &self.config.extension);

        if !path.exists() {
            let found = listing::count_files(&self.config.dir)?;
            if found >= self.config.max_file_number {
                return Err(io::Error::other(FileLimitExceeded {
                    dir: self.config.dir.clone(),
                    limit: self.config.max_file_number,
                    found,
                }));
            }
        }

        fs::create_dir_all(&self.config.dir)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut data = String::new();
        for record in &records {
            data.push_str(record);
            data.push('\n');
        }
        file.write_all(data.as_bytes())?;
        file.sync_data()?;
        Ok(Some(path))
    }
}

// Last resort only: blocking I/O on whichever thread drops the last handle.
impl Drop for Inner {
    fn drop(&mut self) {
        match self.final_flush() {
            Ok(Some(path)) => debug!("final flush to {}", path.display()),
            Ok(None) => {}
            Err(e) => warn!("{}: final flush failed: {e}", self.config.dir.display()),
        }
    }
}
