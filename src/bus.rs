use crate::error::{FileLimitExceeded, Result, WriterError};
use std::future::Future;
use tokio::sync::watch;

#[derive(Debug, Clone, Default)]
struct Signal {
    releases: u64,
    failure: Option<FileLimitExceeded>,
}

/// Broadcasts stream releases to any number of waiters.
///
/// Every teardown of a writer's stream bumps a release counter. A waiter
/// remembers the counter when it registers and resolves once it moves, so
/// each waiter sees exactly the next release after it subscribed, no matter
/// how many other waiters exist. A fatal writer failure wakes every waiter
/// with the error instead.
#[derive(Debug)]
pub struct ReleaseBus {
    tx: watch::Sender<Signal>,
}

impl ReleaseBus {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Signal::default());
        ReleaseBus { tx }
    }

    pub fn notify_released(&self) {
        self.tx.send_modify(|signal| signal.releases += 1);
    }

    pub fn notify_failed(&self, failure: FileLimitExceeded) {
        self.tx.send_modify(|signal| signal.failure = Some(failure));
    }

    /// Register interest in the next release.
    pub fn subscribe(&self) -> ReleaseWaiter {
        let rx = self.tx.subscribe();
        let seen = rx.borrow().releases;
        ReleaseWaiter { rx, seen }
    }

    /// Resolve on the next release after this call.
    ///
    /// The waiter is registered when this is called, not when the returned
    /// future is first polled.
    pub fn wait_next_released(&self) -> impl Future<Output = Result<()>> + Send + use<> {
        self.subscribe().released()
    }
}

impl Default for ReleaseBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A registration made by [`ReleaseBus::subscribe`].
#[derive(Debug)]
pub struct ReleaseWaiter {
    rx: watch::Receiver<Signal>,
    seen: u64,
}

impl ReleaseWaiter {
    /// Wait for the first release after registration.
    pub async fn released(mut self) -> Result<()> {
        loop {
            {
                let signal = self.rx.borrow_and_update();
                if signal.releases > self.seen {
                    return Ok(());
                }
                if let Some(failure) = &signal.failure {
                    return Err(WriterError::FileLimit(failure.clone()));
                }
            }
            self.changed().await?;
        }
    }

    /// Wait for any signal at all, release or failure.
    pub(crate) async fn changed(&mut self) -> Result<()> {
        self.rx.changed().await.map_err(|_| WriterError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn every_waiter_sees_the_next_release() {
        let bus = ReleaseBus::new();
        let first = bus.subscribe();
        let second = bus.subscribe();

        bus.notify_released();

        first.released().await.unwrap();
        second.released().await.unwrap();
    }

    #[tokio::test]
    async fn earlier_releases_do_not_satisfy_new_waiters() {
        let bus = ReleaseBus::new();
        bus.notify_released();

        let waiter = bus.subscribe();
        let pending = tokio::spawn(waiter.released());
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());

        bus.notify_released();
        pending.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn failure_wakes_waiters_with_the_error() {
        let bus = ReleaseBus::new();
        let waiter = bus.subscribe();
        let failure = FileLimitExceeded {
            dir: PathBuf::from("/tmp/logs"),
            limit: 2,
            found: 2,
        };

        bus.notify_failed(failure.clone());

        match waiter.released().await {
            Err(WriterError::FileLimit(got)) => assert_eq!(got, failure),
            other => panic!("expected file limit error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn waiter_counts_from_creation_not_first_poll() {
        let bus = ReleaseBus::new();
        let released = bus.wait_next_released();

        bus.notify_released();

        released.await.unwrap();
    }
}
