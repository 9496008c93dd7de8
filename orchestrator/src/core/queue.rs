//! Shared work queue and completion bookkeeping

use std::collections::VecDeque;
use std::sync::Mutex;

use shared::WorkItem;

use super::lock;

/// FIFO of pending prompts plus the record of how each one ended
///
/// Dequeue never waits: an empty queue is the workers' signal to stop.
pub struct WorkQueue {
    pending: Mutex<VecDeque<WorkItem>>,
    completed: Mutex<Vec<WorkItem>>,
    abandoned: Mutex<Vec<WorkItem>>,
    total: usize,
}

impl WorkQueue {
    pub fn new(items: Vec<WorkItem>) -> Self {
        Self {
            total: items.len(),
            pending: Mutex::new(items.into()),
            completed: Mutex::new(Vec::new()),
            abandoned: Mutex::new(Vec::new()),
        }
    }

    /// Number of items the queue was seeded with
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn pending_len(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn try_dequeue(&self) -> Option<WorkItem> {
        lock(&self.pending).pop_front()
    }

    pub fn record_completed(&self, item: WorkItem) {
        lock(&self.completed).push(item);
    }

    pub fn record_abandoned(&self, item: WorkItem) {
        lock(&self.abandoned).push(item);
    }

    pub fn completed_len(&self) -> usize {
        lock(&self.completed).len()
    }

    /// Take every completed item recorded so far
    pub fn drain_completed(&self) -> Vec<WorkItem> {
        std::mem::take(&mut *lock(&self.completed))
    }

    /// Take every abandoned item recorded so far
    pub fn drain_abandoned(&self) -> Vec<WorkItem> {
        std::mem::take(&mut *lock(&self.abandoned))
    }
}
