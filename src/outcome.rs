//! First-arrival-wins outcome aggregation.
//!
//! Every long-running unit of the process (each board exporter, the metrics
//! server, the signal watcher) holds a clone of one [`Reporter`]. The first
//! reported value decides the run's disposition; later reports are dropped
//! without ever blocking the reporting task. An externally requested stop is
//! the one outcome that counts as success.

use tokio::sync::mpsc;

use crate::error::Error;

/// Create a connected reporter/waiter pair.
pub fn channel() -> (Reporter, Waiter) {
    let (tx, rx) = mpsc::channel(1);
    (Reporter { tx }, Waiter { rx })
}

/// Shared write half.
#[derive(Clone)]
pub struct Reporter {
    tx: mpsc::Sender<Result<(), Error>>,
}

impl Reporter {
    /// Report an externally requested stop. Dropped if an outcome is already
    /// slotted.
    pub fn success(&self) {
        let _ = self.tx.try_send(Ok(()));
    }

    /// Report a failure. Dropped if an outcome is already slotted.
    pub fn error(&self, err: Error) {
        let _ = self.tx.try_send(Err(err));
    }
}

/// Read half, held by the daemon.
pub struct Waiter {
    rx: mpsc::Receiver<Result<(), Error>>,
}

impl Waiter {
    /// Block until the first outcome arrives.
    pub async fn wait(mut self) -> Result<(), Error> {
        // Units hold reporter clones for their whole run; recv only returns
        // None if the daemon dropped them all without reporting.
        self.rx.recv().await.unwrap_or(Ok(()))
    }
}
