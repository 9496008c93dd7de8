//! Core coordination logic
//!
//! This module contains the concurrency engine: credential rotation and
//! eviction, the shared work queue, index allocation and the per-worker
//! retry state machine. It performs no I/O of its own; every external call
//! goes through the collaborator traits.

pub mod index;
pub mod naming;
pub mod pool;
pub mod queue;
pub mod runner;

pub use index::IndexAllocator;
pub use naming::output_stem;
pub use pool::{CredentialLease, CredentialPool, FailureVerdict, PoolSnapshot};
pub use queue::WorkQueue;
pub use runner::{ItemOutcome, ItemState, RunContext, RunnerReport, TaskRunner};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a std mutex, recovering the data if a holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
