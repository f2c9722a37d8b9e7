//! Per-path download locks.
//!
//! Tracks in-flight downloads and guarantees that at most one download per
//! cache path is running at any instant:
//! - First contender: registers a pre-acquired lock and becomes the coordinator
//! - Later contenders: get a waiter for the existing lock
//! - Coordinator finishes (or its task dies): lock is deregistered, then
//!   waiters are woken and re-check the disk themselves
//!
//! The registry is a sharded concurrent map, so contention on one path never
//! blocks lock traffic for unrelated paths.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;

/// Registry of in-flight downloads keyed by resolved cache path
#[derive(Debug, Clone, Default)]
pub struct DownloadLocks {
    /// Each value observes the owner's release signal
    in_flight: Arc<DashMap<PathBuf, watch::Receiver<bool>>>,
}

impl DownloadLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new lock for `path`, or hand back a waiter on the lock that
    /// is already registered. Check and insert happen under the same shard
    /// lock, so two callers can never both become the owner.
    pub fn try_acquire(&self, path: &Path) -> LockAttempt {
        match self.in_flight.entry(path.to_path_buf()) {
            Entry::Occupied(entry) => LockAttempt::Busy(LockWaiter {
                receiver: entry.get().clone(),
            }),
            Entry::Vacant(entry) => {
                let (sender, receiver) = watch::channel(false);
                entry.insert(receiver);
                LockAttempt::Acquired(DownloadLock {
                    path: path.to_path_buf(),
                    locks: self.clone(),
                    sender,
                })
            }
        }
    }

    /// Number of downloads currently in flight
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_locked(&self, path: &Path) -> bool {
        self.in_flight.contains_key(path)
    }
}

/// Outcome of [`DownloadLocks::try_acquire`]
#[derive(Debug)]
pub enum LockAttempt {
    /// No lock existed; the caller now coordinates the download
    Acquired(DownloadLock),
    /// Another coordinator is active
    Busy(LockWaiter),
}

impl LockAttempt {
    pub fn is_acquired(&self) -> bool {
        matches!(self, LockAttempt::Acquired(_))
    }
}

/// Exclusive lock held by the coordinator of one download.
///
/// Dropping it deregisters the path and wakes every waiter. Lock objects are
/// never reused: the next attempt for the same path registers a fresh one.
#[derive(Debug)]
pub struct DownloadLock {
    path: PathBuf,
    locks: DownloadLocks,
    sender: watch::Sender<bool>,
}

impl DownloadLock {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Explicitly release the lock. Equivalent to dropping it.
    pub fn release(self) {}
}

impl Drop for DownloadLock {
    fn drop(&mut self) {
        // Deregister before waking anyone, otherwise a woken waiter could
        // find this stale entry and wait on a lock that is already released.
        self.locks.in_flight.remove(&self.path);
        let _ = self.sender.send(true);
    }
}

/// Handle for waiting until another coordinator releases its lock
#[derive(Debug)]
pub struct LockWaiter {
    receiver: watch::Receiver<bool>,
}

impl LockWaiter {
    /// Resolves once the owning lock is released. Says nothing about whether
    /// the download succeeded; callers must re-check the disk.
    pub async fn released(mut self) {
        // A closed channel means the owner is gone, which is also a release.
        let _ = self.receiver.wait_for(|released| *released).await;
    }
}
