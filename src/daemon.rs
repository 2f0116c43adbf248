//! Daemon lifecycle management.
//!
//! This module wires the process together: one task per configured board,
//! one for the metrics endpoint, and one watching for termination signals,
//! all sharing a first-arrival-wins outcome slot. Whichever unit finishes
//! first (a board failing, the server failing, or an external stop) decides
//! the run's disposition, after which every unit is asked to stop with a
//! bounded wait.

use futures::future::join_all;
use prometheus::Registry;
use std::time::Duration;
use tokio::signal::unix::{self, SignalKind};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::board::{Exporter, StopHandle};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::tracing::prelude::*;
use crate::{metrics, outcome};

/// Bound on draining remaining tasks after every unit was asked to stop.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// The main daemon.
pub struct Daemon {
    config: Config,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl Daemon {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Run the daemon until the first terminal event, then shut everything
    /// down. Returns the winning outcome: `Ok(())` for an external stop,
    /// otherwise the first failure.
    pub async fn run(self) -> Result<()> {
        let registry = Registry::new();
        let (reporter, waiter) = outcome::channel();

        let mut stop_handles: Vec<StopHandle> = Vec::new();
        for device in &self.config.devices {
            let exporter = Exporter::new(device.clone(), registry.clone());
            stop_handles.push(exporter.stop_handle());

            let reporter = reporter.clone();
            self.tracker.spawn(async move {
                if let Err(err) = exporter.run().await {
                    error!(%err, "exporter terminated");
                    reporter.error(err);
                }
            });
        }

        let listen = self.config.listen;
        self.tracker.spawn({
            let reporter = reporter.clone();
            let registry = registry.clone();
            let shutdown = self.shutdown.clone();
            async move {
                info!(%listen, "http serve started");
                if let Err(err) = metrics::serve(listen, registry, shutdown).await {
                    reporter.error(Error::Server(err));
                }
                info!("http serve stopped");
            }
        });

        // An OS termination request is the one outcome that counts as
        // success.
        self.tracker.spawn({
            let reporter = reporter.clone();
            let shutdown = self.shutdown.clone();
            async move {
                tokio::select! {
                    result = wait_for_signal() => match result {
                        Ok(()) => reporter.success(),
                        Err(err) => reporter.error(Error::Signal(err)),
                    },
                    _ = shutdown.cancelled() => {}
                }
            }
        });

        self.tracker.close();
        info!("started");

        let result = waiter.wait().await;
        if let Err(err) = &result {
            error!(%err, "error while running");
        }

        // Wind down: stop the server and the signal watcher, then every
        // exporter concurrently (each bounded, so the phase is too).
        self.shutdown.cancel();
        join_all(stop_handles.into_iter().map(StopHandle::stop)).await;

        if tokio::time::timeout(DRAIN_TIMEOUT, self.tracker.wait())
            .await
            .is_err()
        {
            warn!("timeout waiting for tasks to finish");
        }

        info!("stopped");
        result
    }
}

async fn wait_for_signal() -> std::io::Result<()> {
    let mut sigint = unix::signal(SignalKind::interrupt())?;
    let mut sigterm = unix::signal(SignalKind::terminate())?;
    let mut sighup = unix::signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => info!("received SIGINT"),
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sighup.recv() => info!("received SIGHUP"),
    }

    Ok(())
}
