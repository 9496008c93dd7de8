//! Rotating credential pool with consecutive-failure eviction
//!
//! Every credential is in exactly one place at a time: the available queue,
//! or a [`CredentialLease`] held by a single in-flight attempt. A lease is
//! settled by handing it back through [`CredentialPool::release`] (success)
//! or [`CredentialPool::report_failure`] (failure); the pool alone decides
//! whether a failed credential rotates back in or is evicted for the rest of
//! the run.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use shared::{Credential, CredentialId};
use tokio::sync::Notify;

use super::lock;
use crate::error::{OrchestratorError, OrchestratorResult};

/// What the pool did with a credential after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureVerdict {
    /// Back in rotation with this many consecutive failures on record
    Returned { consecutive_failures: u32 },
    /// Permanently dropped; `in_circulation` credentials remain
    Evicted { in_circulation: usize },
}

/// Point-in-time view of the pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub available: usize,
    pub in_circulation: usize,
    pub evicted: Vec<CredentialId>,
}

struct PoolState {
    available: VecDeque<Credential>,
    /// Survives checkout/return cycles; reset only by a success
    failures: HashMap<CredentialId, u32>,
    /// Available plus leased. Only ever shrinks.
    in_circulation: usize,
    evicted: Vec<CredentialId>,
}

struct PoolInner {
    state: Mutex<PoolState>,
    changed: Notify,
    eviction_threshold: u32,
}

impl PoolInner {
    fn put_back(&self, credential: Credential) {
        lock(&self.state).available.push_back(credential);
        self.changed.notify_one();
    }
}

/// Concurrency-safe pool of credentials, cheap to clone
#[derive(Clone)]
pub struct CredentialPool {
    inner: Arc<PoolInner>,
}

impl CredentialPool {
    pub fn new(credentials: Vec<Credential>, eviction_threshold: u32) -> Self {
        let in_circulation = credentials.len();
        let failures = credentials.iter().map(|c| (c.id(), 0)).collect();

        Self {
            inner: Arc::new(PoolInner {
                state: Mutex::new(PoolState {
                    available: credentials.into(),
                    failures,
                    in_circulation,
                    evicted: Vec::new(),
                }),
                changed: Notify::new(),
                eviction_threshold,
            }),
        }
    }

    /// Wait for a free credential and take it out of rotation.
    ///
    /// Fails with `PoolExhausted` once every credential has been evicted,
    /// instead of waiting forever on an empty pool.
    pub async fn checkout(&self) -> OrchestratorResult<CredentialLease> {
        loop {
            // Register interest before inspecting state so a release racing
            // with this check still wakes us.
            let notified = self.inner.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = lock(&self.inner.state);
                if let Some(credential) = state.available.pop_front() {
                    return Ok(CredentialLease {
                        id: credential.id(),
                        credential: Some(credential),
                        pool: Arc::clone(&self.inner),
                    });
                }
                if state.in_circulation == 0 {
                    return Err(OrchestratorError::PoolExhausted {
                        evicted: state.evicted.len(),
                    });
                }
            }

            notified.await;
        }
    }

    /// Success path: clear the failure streak and put the credential back
    pub fn release(&self, mut lease: CredentialLease) {
        let Some(credential) = lease.credential.take() else {
            return;
        };

        {
            let mut state = lock(&self.inner.state);
            state.failures.insert(credential.id(), 0);
            state.available.push_back(credential);
        }
        self.inner.changed.notify_one();
    }

    /// Failure path: extend the streak and either rotate the credential
    /// back in or evict it permanently
    pub fn report_failure(&self, mut lease: CredentialLease) -> FailureVerdict {
        let Some(credential) = lease.credential.take() else {
            return FailureVerdict::Returned {
                consecutive_failures: self.failure_count(lease.id),
            };
        };

        let verdict = {
            let mut state = lock(&self.inner.state);
            let streak = state.failures.entry(credential.id()).or_insert(0);
            *streak += 1;
            let consecutive_failures = *streak;

            if consecutive_failures >= self.inner.eviction_threshold {
                state.in_circulation -= 1;
                state.evicted.push(credential.id());
                FailureVerdict::Evicted {
                    in_circulation: state.in_circulation,
                }
            } else {
                state.available.push_back(credential);
                FailureVerdict::Returned { consecutive_failures }
            }
        };

        match verdict {
            FailureVerdict::Returned { .. } => self.inner.changed.notify_one(),
            // Every waiter must observe the now-empty pool and give up.
            FailureVerdict::Evicted { in_circulation: 0 } => self.inner.changed.notify_waiters(),
            FailureVerdict::Evicted { .. } => {}
        }
        verdict
    }

    /// Current consecutive-failure count for a credential
    pub fn failure_count(&self, id: CredentialId) -> u32 {
        lock(&self.inner.state).failures.get(&id).copied().unwrap_or(0)
    }

    pub fn is_evicted(&self, id: CredentialId) -> bool {
        lock(&self.inner.state).evicted.contains(&id)
    }

    /// Credentials not yet evicted, whether idle or leased
    pub fn in_circulation(&self) -> usize {
        lock(&self.inner.state).in_circulation
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        let state = lock(&self.inner.state);
        PoolSnapshot {
            available: state.available.len(),
            in_circulation: state.in_circulation,
            evicted: state.evicted.clone(),
        }
    }
}

/// Exclusive hold on one credential for the duration of an attempt
///
/// A lease dropped without being settled (a panicking or aborted worker)
/// returns its credential to rotation untouched.
pub struct CredentialLease {
    id: CredentialId,
    credential: Option<Credential>,
    pool: Arc<PoolInner>,
}

impl CredentialLease {
    pub fn id(&self) -> CredentialId {
        self.id
    }

    pub fn secret(&self) -> &str {
        self.credential.as_ref().map(Credential::secret).unwrap_or_default()
    }
}

impl Drop for CredentialLease {
    fn drop(&mut self) {
        if let Some(credential) = self.credential.take() {
            self.pool.put_back(credential);
        }
    }
}

impl std::fmt::Debug for CredentialLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialLease").field("id", &self.id).finish()
    }
}
