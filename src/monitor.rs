//! # Monitor — background pool maintenance
//!
//! ## Responsibility
//! Periodically evaluate every pool so idle-pool scale-down and
//! failed-instance reaping happen even when no assign/release traffic is
//! arriving. The scheduler is fully correct without this loop — it is a
//! liveness aid, not a correctness requirement.
//!
//! ## Guarantees
//! - Periodic: evaluations run at a configurable interval
//! - Non-blocking: maintenance runs in a background tokio task
//! - Clean shutdown: the handle stops the loop and awaits its exit
//!
//! ## NOT Responsible For
//! - Scaling decisions themselves (see: `pool::scaler`)
//! - Health signals (callers report failures via
//!   [`Scheduler::mark_instance_failed`](crate::Scheduler::mark_instance_failed))

use crate::scheduler::Scheduler;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Handle to a running maintenance loop.
///
/// Dropping the handle closes the stop channel, which ends the loop at
/// its next poll; [`MaintenanceHandle::shutdown`] additionally waits for
/// the task to exit.
///
/// # Panics
///
/// No methods on this type panic.
#[derive(Debug)]
pub struct MaintenanceHandle {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl MaintenanceHandle {
    /// Signal the loop to stop and wait for it to exit.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        let _ = self.handle.await;
    }

    /// Returns `true` if the loop has already exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Spawn a background task that evaluates every pool at `interval`.
///
/// # Arguments
///
/// * `scheduler` — Shared scheduler whose pools are evaluated.
/// * `interval` — Time between evaluation passes.
///
/// # Returns
///
/// A [`MaintenanceHandle`] for shutting the loop down.
///
/// # Panics
///
/// This function never panics.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use tokio_agent_scheduler::{monitor, Scheduler, SchedulerConfig};
///
/// # async fn example() -> Result<(), tokio_agent_scheduler::SchedulerError> {
/// let scheduler = Arc::new(Scheduler::new(SchedulerConfig::default())?);
/// let handle = monitor::spawn_maintenance(scheduler, Duration::from_secs(30));
/// // ... later ...
/// handle.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub fn spawn_maintenance(scheduler: Arc<Scheduler>, interval: Duration) -> MaintenanceHandle {
    let (stop, mut stopped) = watch::channel(false);

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so the loop waits a
        // full interval before its first evaluation.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    scheduler.evaluate_pools();
                    let statuses = scheduler.pool_statuses();
                    let busy: usize = statuses.iter().map(|s| s.busy_count).sum();
                    let queued: usize = statuses.iter().map(|s| s.queue_depth).sum();
                    tracing::debug!(pools = statuses.len(), busy, queued, "maintenance pass");
                }
                changed = stopped.changed() => {
                    // A closed channel means the handle was dropped; treat
                    // it the same as an explicit stop.
                    if changed.is_err() || *stopped.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("maintenance loop stopped");
    });

    MaintenanceHandle { stop, handle }
}

// ── Tests ──────────────────────────────────────────────────────────────
