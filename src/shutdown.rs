//! Final flush on the way out.

use crate::writer::RotatingWriter;
use log::{info, warn};

/// Shut every writer down, flushing what they still buffer.
///
/// Failures are logged and otherwise ignored so that termination is never
/// held up by a writer that cannot finish.
pub async fn shutdown_all(writers: &[RotatingWriter]) {
    for writer in writers {
        if let Err(e) = writer.shutdown().await {
            warn!("{}: shutdown flush failed: {e}", writer.dir().display());
        }
    }
}

/// Wait for Ctrl-C, then shut `writers` down.
///
/// Meant to be raced against the application's main future, e.g. in a
/// `tokio::select!`, so the final flush happens before the process exits.
pub async fn flush_on_ctrl_c(writers: Vec<RotatingWriter>) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("interrupt received, flushing {} writer(s)", writers.len()),
        Err(e) => warn!("cannot listen for interrupt: {e}; flushing now"),
    }
    shutdown_all(&writers).await;
}
