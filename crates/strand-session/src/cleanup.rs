//! Background TTL sweep.
//!
//! The scheduler owns a single Tokio task that calls [`Sweep::sweep_expired`]
//! every interval. It holds only a weak reference to its target, so dropping
//! the last manager handle ends the task even without an explicit shutdown.

use std::sync::Weak;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};

/// Something the scheduler can sweep.
pub trait Sweep: Send + Sync + 'static {
    /// Remove expired entries and return how many were removed.
    fn sweep_expired(&self) -> usize;
}

/// Handle to the periodic sweep task.
#[derive(Debug)]
pub struct CleanupScheduler {
    interval: Duration,
    /// Signals the task to stop.
    cancel: CancellationToken,
    /// Cancelled by the task itself once it has exited.
    stopped: CancellationToken,
}

impl CleanupScheduler {
    /// Spawn the sweep task on `runtime`.
    ///
    /// The first sweep runs one full `interval` after start.
    pub fn spawn<T: Sweep>(runtime: &Handle, interval: Duration, target: Weak<T>) -> Self {
        let cancel = CancellationToken::new();
        let stopped = CancellationToken::new();

        runtime.spawn(run(target, interval, cancel.clone(), stopped.clone()));
        info!(interval_ms = interval.as_millis() as u64, "Cleanup scheduler started");

        Self {
            interval,
            cancel,
            stopped,
        }
    }

    /// The configured sweep period.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether the task is still running.
    pub fn is_running(&self) -> bool {
        !self.stopped.is_cancelled()
    }

    /// Ask the task to stop without waiting for it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Stop the task and wait until it has exited.
    ///
    /// Safe to call repeatedly and from several callers at once; every caller
    /// waits for the same exit. Fails with [`Error::ShutdownTimeout`] if the
    /// task has not exited within `timeout`, in which case it may still be
    /// finishing a sweep.
    pub async fn stop(&self, timeout: Duration) -> Result<()> {
        self.cancel.cancel();
        tokio::time::timeout(timeout, self.stopped.cancelled())
            .await
            .map_err(|_| Error::ShutdownTimeout(timeout))
    }
}

async fn run<T: Sweep>(
    target: Weak<T>,
    period: Duration,
    cancel: CancellationToken,
    stopped: CancellationToken,
) {
    // Fires on every exit path, including a panicking sweep.
    let _stopped = stopped.drop_guard();

    let Some(start) = Instant::now().checked_add(period) else {
        warn!(
            interval_secs = period.as_secs(),
            "Cleanup interval out of range, sweeps disabled"
        );
        cancel.cancelled().await;
        info!("Cleanup scheduler stopped");
        return;
    };
    let mut ticker = tokio::time::interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Cleanup scheduler stopped");
                break;
            }
            _ = ticker.tick() => {
                let Some(target) = target.upgrade() else {
                    debug!("Sweep target dropped, stopping cleanup scheduler");
                    break;
                };
                let removed = target.sweep_expired();
                trace!(removed, "Cleanup tick");
            }
        }
    }
}
