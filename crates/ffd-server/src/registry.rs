//! The shared registry of live connection workers.
//!
//! Every spawned worker has an entry here from the moment it is spawned
//! until its task has been joined and the entry removed, either by the
//! reaper during normal operation or by the server while draining at
//! shutdown. All access goes through one [`Mutex`]; no lock is ever held
//! across an `.await`.
//!
//! # Lifecycle
//!
//! ```text
//! spawn ──> Running ──(guard drop)──> Completed ──(join + remove)──> gone
//! ```
//!
//! A spawned task is held at a gate until its entry has been inserted, so
//! a worker can never be observed as completed before the registry knows
//! about it.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ffd_types::WorkerId;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{trace, warn};

/// Completion flag of a registered worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    /// The worker task may still be running.
    Running,
    /// The worker has finished all shared-state access and can be joined.
    Completed,
}

/// One registry entry.
#[derive(Debug)]
struct WorkerEntry {
    status: WorkerStatus,
    /// Taken by whoever is about to join the task; the entry itself stays
    /// until that join has finished.
    join: Option<JoinHandle<()>>,
}

/// A worker handed out for joining.
#[derive(Debug)]
pub struct WorkerJoin {
    /// The worker's identifier, used to remove its entry after the join.
    pub id: WorkerId,
    /// The task to await.
    pub handle: JoinHandle<()>,
}

/// Lock-protected collection of live worker handles.
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    workers: Mutex<BTreeMap<WorkerId, WorkerEntry>>,
    next_id: AtomicU64,
}

impl WorkerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<WorkerId, WorkerEntry>> {
        // Every critical section leaves the map consistent, so a panic
        // elsewhere never leaves it half-updated.
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hand out a fresh worker identifier.
    pub fn allocate_id(&self) -> WorkerId {
        WorkerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Spawn a worker task and register it before it can complete.
    ///
    /// `make_work` receives the new worker's id. The task waits until its
    /// entry has been inserted before running the work, and is wrapped so
    /// that the entry is marked [`WorkerStatus::Completed`] on every exit
    /// path, including panics and cancellation. Registration goes through
    /// [`insert`](Self::insert); if it is refused the work never runs.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<F, Fut>(self: &Arc<Self>, make_work: F) -> WorkerId
    where
        F: FnOnce(WorkerId) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = self.allocate_id();
        let work = make_work(id);
        let guard = CompletionGuard {
            registry: Arc::clone(self),
            id,
            armed: true,
        };
        let (registered_tx, registered_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            match registered_rx.await {
                Ok(()) => {
                    let _guard = guard;
                    work.await;
                }
                // Refused registration: the entry under this id is not ours.
                Err(_) => guard.disarm(),
            }
        });
        if self.insert(id, handle) {
            if registered_tx.send(()).is_err() {
                trace!(worker_id = %id, "worker task dropped before it was released");
            }
        } else {
            warn!(worker_id = %id, "worker id already registered, dropping its work");
        }
        id
    }

    /// Register an already-spawned task.
    ///
    /// Returns `false` (and leaves the existing entry alone) if `id` is
    /// already registered.
    pub fn insert(&self, id: WorkerId, handle: JoinHandle<()>) -> bool {
        let mut workers = self.lock();
        if workers.contains_key(&id) {
            return false;
        }
        workers.insert(
            id,
            WorkerEntry {
                status: WorkerStatus::Running,
                join: Some(handle),
            },
        );
        true
    }

    /// Flip a worker's flag to [`WorkerStatus::Completed`].
    ///
    /// Returns `false` if no such worker is registered.
    pub fn mark_completed(&self, id: WorkerId) -> bool {
        match self.lock().get_mut(&id) {
            Some(entry) => {
                entry.status = WorkerStatus::Completed;
                true
            }
            None => false,
        }
    }

    /// Current flag of a worker, if registered.
    pub fn status(&self, id: WorkerId) -> Option<WorkerStatus> {
        self.lock().get(&id).map(|entry| entry.status)
    }

    /// Hand out the join handles of every completed worker not already
    /// handed out.
    ///
    /// Entries are not removed: the caller joins outside the lock and then
    /// calls [`remove_all`](Self::remove_all).
    pub fn snapshot_completed(&self) -> Vec<WorkerJoin> {
        let mut workers = self.lock();
        workers
            .iter_mut()
            .filter(|(_, entry)| entry.status == WorkerStatus::Completed)
            .filter_map(|(id, entry)| {
                entry.join.take().map(|handle| WorkerJoin { id: *id, handle })
            })
            .collect()
    }

    /// Hand out the join handles of every worker, running or not.
    ///
    /// Used for the shutdown drain once no new workers can be spawned.
    pub fn take_outstanding(&self) -> Vec<WorkerJoin> {
        let mut workers = self.lock();
        workers
            .iter_mut()
            .filter_map(|(id, entry)| {
                entry.join.take().map(|handle| WorkerJoin { id: *id, handle })
            })
            .collect()
    }

    /// Remove one entry. Returns whether it was present.
    pub fn remove(&self, id: WorkerId) -> bool {
        self.lock().remove(&id).is_some()
    }

    /// Remove a batch of entries under one lock acquisition. Returns how
    /// many were present.
    pub fn remove_all(&self, ids: &[WorkerId]) -> usize {
        let mut workers = self.lock();
        let mut removed = 0_usize;
        for id in ids {
            if workers.remove(id).is_some() {
                removed = removed.saturating_add(1);
            }
        }
        removed
    }

    /// Number of registered workers.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no workers are registered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Marks its worker completed when dropped.
///
/// Lives inside the worker task, so it drops after the worker's last
/// statement, while unwinding from a panic, or when the task is cancelled.
struct CompletionGuard {
    registry: Arc<WorkerRegistry>,
    id: WorkerId,
    armed: bool,
}

impl CompletionGuard {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if self.armed && !self.registry.mark_completed(self.id) {
            trace!(worker_id = %self.id, "completed worker already deregistered");
        }
    }
}
