//! Background reclamation of finished workers.
//!
//! The [`Reaper`] wakes on a fixed period, takes the completed workers
//! from the registry, awaits each of their tasks outside the registry
//! lock, and then removes the joined entries in one batch. Reaping lags
//! completion by at most one period plus the time to join.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, warn};

use crate::registry::{WorkerJoin, WorkerRegistry};

/// Handle to the running reaper task.
#[derive(Debug)]
pub struct Reaper {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Reaper {
    /// Start reaping `registry` every `interval`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(registry: Arc<WorkerRegistry>, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run(registry, interval, stop_rx));
        Self { stop_tx, handle }
    }

    /// Signal the reaper to stop and wait for its task to finish.
    ///
    /// A pass already in progress runs to completion first.
    pub async fn stop(self) {
        self.stop_tx.send_replace(true);
        if let Err(e) = self.handle.await {
            error!(error = %e, "reaper task failed");
        }
    }
}

async fn run(registry: Arc<WorkerRegistry>, interval: Duration, mut stop_rx: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!(interval = ?interval, "reaper started");

    loop {
        if *stop_rx.borrow_and_update() {
            break;
        }
        tokio::select! {
            biased;
            changed = stop_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let reaped = reap_once(&registry).await;
                if reaped > 0 {
                    debug!(reaped, live = registry.len(), "reaped completed workers");
                }
            }
        }
    }

    debug!("reaper stopped");
}

/// Run one reaping pass. Returns the number of entries removed.
pub async fn reap_once(registry: &WorkerRegistry) -> usize {
    let completed = registry.snapshot_completed();
    if completed.is_empty() {
        return 0;
    }

    let mut joined = Vec::with_capacity(completed.len());
    for worker in completed {
        joined.push(join_worker(worker).await);
    }
    registry.remove_all(&joined)
}

/// Await a worker task, logging anything other than a clean exit.
///
/// Returns the worker's id so the caller can remove its entry either way:
/// a task that panicked or was cancelled is finished all the same.
pub(crate) async fn join_worker(worker: WorkerJoin) -> ffd_types::WorkerId {
    let WorkerJoin { id, handle } = worker;
    match handle.await {
        Ok(()) => {}
        Err(e) if e.is_panic() => error!(worker_id = %id, "worker panicked"),
        Err(e) => warn!(worker_id = %id, error = %e, "worker task was cancelled"),
    }
    id
}
