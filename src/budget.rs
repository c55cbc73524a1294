//! Bounded buffering of records that have not reached disk yet.

use std::mem;

/// Ceiling on buffered-but-unflushed bytes.
///
/// Sizes are measured on the UTF-8 encoding: chat content is full of CJK text
/// and emoji, where character counts badly understate the memory held.
///
/// # Examples
///
/// ```
/// use daylog::ByteBudget;
///
/// let budget = ByteBudget::new(8);
/// assert!(!budget.would_exceed(0, "hello"));
/// assert!(budget.would_exceed(3, "hello"));
/// // "日本" is two characters but six bytes.
/// assert!(budget.would_exceed(2, "日本"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteBudget {
    max_bytes: usize,
}

impl ByteBudget {
    pub fn new(max_bytes: usize) -> Self {
        ByteBudget { max_bytes }
    }

    /// Returns true if adding `candidate` to `pending_bytes` reaches the ceiling.
    pub fn would_exceed(&self, pending_bytes: usize, candidate: &str) -> bool {
        pending_bytes.saturating_add(candidate.len()) >= self.max_bytes
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }
}

/// Records accepted by the writer and not yet handed to a stream.
///
/// Invariant: `bytes` is the sum of the UTF-8 lengths of `records` and never
/// reaches the budget ceiling.
#[derive(Debug)]
pub struct PendingBuffer {
    records: Vec<String>,
    bytes: usize,
    budget: ByteBudget,
}

impl PendingBuffer {
    pub fn new(budget: ByteBudget) -> Self {
        PendingBuffer {
            records: Vec::new(),
            bytes: 0,
            budget,
        }
    }

    /// Append a record, or hand it back if it would cross the ceiling.
    ///
    /// A rejected record is returned whole; it is never truncated to fit.
    pub fn push(&mut self, record: String) -> Result<(), String> {
        if self.budget.would_exceed(self.bytes, &record) {
            return Err(record);
        }
        self.bytes += record.len();
        self.records.push(record);
        Ok(())
    }

    /// Take every buffered record as one newline-joined chunk with a trailing
    /// newline. Returns `None` when nothing is buffered.
    pub fn take_chunk(&mut self) -> Option<Chunk> {
        if self.records.is_empty() {
            return None;
        }
        let records = mem::take(&mut self.records);
        self.bytes = 0;
        Some(Chunk::join(records))
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Cumulative UTF-8 size of the buffered records.
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    pub fn budget(&self) -> ByteBudget {
        self.budget
    }

    /// Drain the raw records, leaving the buffer empty.
    pub(crate) fn drain_records(&mut self) -> Vec<String> {
        self.bytes = 0;
        mem::take(&mut self.records)
    }
}

/// A coalesced write: several records joined into one buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    data: Vec<u8>,
    records: usize,
}

impl Chunk {
    fn join(records: Vec<String>) -> Self {
        let total = records.iter().map(|r| r.len() + 1).sum();
        let mut data = Vec::with_capacity(total);
        for record in &records {
            data.extend_from_slice(record.as_bytes());
            data.push(b'\n');
        }
        Chunk {
            data,
            records: records.len(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of records coalesced into this chunk.
    pub fn records(&self) -> usize {
        self.records
    }
}
