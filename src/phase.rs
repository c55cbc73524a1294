use std::fmt;

/// Where a writer is in its create → flush → release cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No stream. Records may still be buffered after a failed cycle.
    Idle,
    /// A stream is being opened; new records only join the buffer.
    Creating,
    /// Buffered records are being written, possibly waiting on a drain.
    Flushing,
    /// The stream is being flushed to disk and released.
    Closing,
    /// The directory ran out of file slots. Terminal.
    Failed,
}

impl Phase {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_become(self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (Idle, Creating)
                | (Creating, Flushing)
                | (Creating, Idle)
                | (Creating, Failed)
                | (Flushing, Closing)
                | (Flushing, Idle)
                | (Closing, Idle)
                | (Closing, Creating)
        )
    }

    /// True while a cycle owns (or is about to own) the stream.
    pub fn is_busy(self) -> bool {
        matches!(self, Phase::Creating | Phase::Flushing | Phase::Closing)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Creating => "creating",
            Phase::Flushing => "flushing",
            Phase::Closing => "closing",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Move `current` to `next`, asserting the edge exists.
pub(crate) fn transition(current: &mut Phase, next: Phase) {
    debug_assert!(
        current.can_become(next),
        "invalid writer transition {current} -> {next}"
    );
    if !current.can_become(next) {
        log::error!("invalid writer transition {current} -> {next}");
    }
    *current = next;
}
