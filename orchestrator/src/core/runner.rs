//! Per-worker control loop
//!
//! A runner pulls prompts off the shared queue until it is empty. Each
//! prompt moves through an explicit state machine:
//!
//! ```text
//! Pending -> Attempt(1) -> Attempt(2) -> ... -> Completed | Abandoned
//! ```
//!
//! Every attempt leases a credential, makes one call to the generation
//! service and settles the lease: released on success, reported as a failure
//! otherwise. Quota failures and every other failure count the same against
//! the credential; the distinction only changes what gets logged.

use std::sync::Arc;

use shared::{logging, worker_debug, worker_info, worker_warn, WorkItem, WorkerId};

use super::{output_stem, CredentialPool, FailureVerdict, IndexAllocator, WorkQueue};
use crate::config::RunConfig;
use crate::error::OrchestratorResult;
use crate::traits::{GenerationService, OutputSink};

/// Where a single prompt is in its retry lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Pending,
    /// Attempt number n (1-based) is next or in flight
    Attempt(u32),
    Completed { attempts: u32, output_index: u64 },
    Abandoned { attempts: u32 },
}

impl ItemState {
    pub fn start(self) -> Self {
        match self {
            ItemState::Pending => ItemState::Attempt(1),
            other => other,
        }
    }

    pub fn on_success(self, output_index: u64) -> Self {
        match self {
            ItemState::Attempt(attempts) => ItemState::Completed { attempts, output_index },
            other => other,
        }
    }

    pub fn on_failure(self, max_attempts: u32) -> Self {
        match self {
            ItemState::Attempt(attempts) if attempts >= max_attempts => ItemState::Abandoned { attempts },
            ItemState::Attempt(attempts) => ItemState::Attempt(attempts + 1),
            other => other,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemState::Completed { .. } | ItemState::Abandoned { .. })
    }
}

/// Final result for one prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Completed { attempts: u32, output_index: u64 },
    Abandoned { attempts: u32 },
}

/// Tally of what one runner did before the queue ran dry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerReport {
    pub worker: WorkerId,
    pub completed: usize,
    pub abandoned: usize,
}

enum AttemptResult {
    Succeeded { output_index: u64 },
    Failed,
}

/// State shared by every runner of a run
pub struct RunContext<G, S> {
    pub pool: CredentialPool,
    pub queue: WorkQueue,
    pub output_index: IndexAllocator,
    pub progress: IndexAllocator,
    pub generator: Arc<G>,
    pub sink: Arc<S>,
    pub config: RunConfig,
}

impl<G, S> RunContext<G, S> {
    pub fn new(
        pool: CredentialPool,
        queue: WorkQueue,
        output_index: IndexAllocator,
        generator: Arc<G>,
        sink: Arc<S>,
        config: RunConfig,
    ) -> Self {
        Self {
            pool,
            queue,
            output_index,
            progress: IndexAllocator::default(),
            generator,
            sink,
            config,
        }
    }
}

/// One worker of the pool
pub struct TaskRunner<G, S> {
    worker: WorkerId,
    ctx: Arc<RunContext<G, S>>,
}

impl<G, S> TaskRunner<G, S>
where
    G: GenerationService + 'static,
    S: OutputSink + 'static,
{
    pub fn new(worker: WorkerId, ctx: Arc<RunContext<G, S>>) -> Self {
        Self { worker, ctx }
    }

    /// Process prompts until the queue is empty
    ///
    /// Only run-level failures (an exhausted pool) escape; everything that
    /// goes wrong with a single prompt is absorbed here.
    pub async fn run(self) -> OrchestratorResult<RunnerReport> {
        let mut report = RunnerReport {
            worker: self.worker,
            completed: 0,
            abandoned: 0,
        };

        while let Some(item) = self.ctx.queue.try_dequeue() {
            match self.process_item(item).await? {
                ItemOutcome::Completed { .. } => report.completed += 1,
                ItemOutcome::Abandoned { .. } => report.abandoned += 1,
            }
        }

        worker_debug!(
            self.worker,
            "Queue empty, stopping after {} completed and {} abandoned",
            report.completed,
            report.abandoned
        );
        Ok(report)
    }

    /// Drive one prompt to a terminal state
    pub async fn process_item(&self, item: WorkItem) -> OrchestratorResult<ItemOutcome> {
        let position = self.ctx.progress.next() + 1;
        let mut state = ItemState::Pending;

        loop {
            let attempt = match state {
                ItemState::Pending => {
                    state = state.start();
                    continue;
                }
                ItemState::Attempt(attempt) => attempt,
                ItemState::Completed { attempts, output_index } => {
                    return Ok(ItemOutcome::Completed { attempts, output_index });
                }
                ItemState::Abandoned { attempts } => {
                    worker_warn!(
                        self.worker,
                        "Failed to process prompt '{}' after {} attempts, leaving it in the backlog",
                        item,
                        attempts
                    );
                    self.ctx.queue.record_abandoned(item);
                    return Ok(ItemOutcome::Abandoned { attempts });
                }
            };

            state = match self.attempt(&item, position, attempt).await? {
                AttemptResult::Succeeded { output_index } => state.on_success(output_index),
                AttemptResult::Failed => state.on_failure(self.ctx.config.max_attempts),
            };
        }
    }

    async fn attempt(&self, item: &WorkItem, position: u64, attempt: u32) -> OrchestratorResult<AttemptResult> {
        let lease = self.ctx.pool.checkout().await?;
        let credential = lease.id();
        logging::log_progress(
            self.worker,
            position,
            self.ctx.queue.total(),
            &format!(
                "using credential {} (attempt {} of {})",
                credential, attempt, self.ctx.config.max_attempts
            ),
        );

        let result = match self.ctx.generator.generate(lease.secret(), item.as_str()).await {
            Ok(images) => {
                let output_index = self.ctx.output_index.next();
                let stem = output_stem(output_index, item.as_str());
                self.ctx
                    .sink
                    .persist(&stem, &images)
                    .await
                    .map(|files| (output_index, stem, files))
            }
            Err(failure) => Err(failure),
        };

        match result {
            Ok((output_index, stem, files)) => {
                self.ctx.queue.record_completed(item.clone());
                self.ctx.pool.release(lease);
                worker_info!(
                    self.worker,
                    "Saved {} image(s) for prompt {} as {}",
                    files.len(),
                    position,
                    stem
                );
                Ok(AttemptResult::Succeeded { output_index })
            }
            Err(failure) => {
                if failure.is_quota_exceeded() {
                    worker_warn!(
                        self.worker,
                        "Credential {} may have exceeded the daily limit, switching to next credential",
                        credential
                    );
                } else {
                    worker_warn!(
                        self.worker,
                        "Error with credential {}: {} (attempt {} of {})",
                        credential,
                        failure,
                        attempt,
                        self.ctx.config.max_attempts
                    );
                }

                match self.ctx.pool.report_failure(lease) {
                    FailureVerdict::Returned { consecutive_failures } => {
                        worker_debug!(
                            self.worker,
                            "Credential {} back in rotation with {} consecutive failure(s)",
                            credential,
                            consecutive_failures
                        );
                    }
                    FailureVerdict::Evicted { in_circulation } => {
                        worker_warn!(
                            self.worker,
                            "Credential {} removed after {} consecutive errors, {} left in circulation",
                            credential,
                            self.ctx.config.eviction_threshold,
                            in_circulation
                        );
                    }
                }
                Ok(AttemptResult::Failed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrchestratorError;
    use crate::traits::{MockGenerationService, MockOutputSink};
    use shared::{Credential, CredentialId, GeneratedImage, GenerationFailure};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn image() -> GeneratedImage {
        GeneratedImage {
            url: "https://example.test/a.jpg".to_string(),
            bytes: vec![0xFF, 0xD8],
        }
    }

    fn accepting_sink() -> MockOutputSink {
        let mut sink = MockOutputSink::new();
        sink.expect_persist()
            .returning(|stem, _| Ok(vec![PathBuf::from(format!("{stem}_0.jpeg"))]));
        sink
    }

    fn context(
        generator: MockGenerationService,
        sink: MockOutputSink,
        credential_count: u32,
        config: RunConfig,
        items: &[&str],
    ) -> Arc<RunContext<MockGenerationService, MockOutputSink>> {
        let credentials = (0..credential_count)
            .map(|i| Credential::new(CredentialId::new(i), format!("cookie-{i}")))
            .collect();
        Arc::new(RunContext::new(
            CredentialPool::new(credentials, config.eviction_threshold),
            WorkQueue::new(items.iter().map(|i| WorkItem::from(*i)).collect()),
            IndexAllocator::default(),
            Arc::new(generator),
            Arc::new(sink),
            config,
        ))
    }

    #[test]
    fn test_state_machine_success_path() {
        let state = ItemState::Pending.start();
        assert_eq!(state, ItemState::Attempt(1));

        let state = state.on_failure(3).on_success(42);
        assert_eq!(state, ItemState::Completed { attempts: 2, output_index: 42 });
        assert!(state.is_terminal());
    }

    #[test]
    fn test_state_machine_abandons_at_bound() {
        let mut state = ItemState::Pending.start();
        for _ in 0..3 {
            assert!(!state.is_terminal());
            state = state.on_failure(3);
        }
        assert_eq!(state, ItemState::Abandoned { attempts: 3 });

        // Terminal states absorb further events
        assert_eq!(state.on_failure(3), state);
        assert_eq!(state.on_success(1), state);
        assert_eq!(state.start(), state);
    }

    #[tokio::test]
    async fn test_first_attempt_success_releases_credential() {
        let mut generator = MockGenerationService::new();
        generator
            .expect_generate()
            .withf(|secret, prompt| secret == "cookie-0" && prompt == "a red apple")
            .times(1)
            .returning(|_, _| Ok(vec![image()]));

        let ctx = context(generator, accepting_sink(), 1, RunConfig::default(), &["a red apple"]);
        let runner = TaskRunner::new(WorkerId::Runner(0), Arc::clone(&ctx));

        let outcome = runner.process_item(WorkItem::from("a red apple")).await.unwrap();

        assert_eq!(outcome, ItemOutcome::Completed { attempts: 1, output_index: 0 });
        assert_eq!(ctx.queue.drain_completed(), vec![WorkItem::from("a red apple")]);
        assert_eq!(ctx.pool.snapshot().available, 1);
        assert_eq!(ctx.pool.failure_count(CredentialId::new(0)), 0);
    }

    #[tokio::test]
    async fn test_quota_every_time_evicts_and_abandons_after_three_attempts() {
        let mut generator = MockGenerationService::new();
        generator
            .expect_generate()
            .times(3)
            .returning(|_, _| Err(GenerationFailure::QuotaExceeded));
        let mut sink = MockOutputSink::new();
        sink.expect_persist().never();

        let ctx = context(generator, sink, 1, RunConfig::default(), &["pear"]);
        let runner = TaskRunner::new(WorkerId::Runner(0), Arc::clone(&ctx));

        let outcome = runner.process_item(WorkItem::from("pear")).await.unwrap();

        assert_eq!(outcome, ItemOutcome::Abandoned { attempts: 3 });
        assert!(ctx.pool.is_evicted(CredentialId::new(0)));
        assert!(ctx.queue.drain_completed().is_empty());
        assert_eq!(ctx.queue.drain_abandoned(), vec![WorkItem::from("pear")]);
        // No output index is consumed by failures
        assert_eq!(ctx.output_index.peek(), 0);
    }

    #[tokio::test]
    async fn test_storage_failure_counts_as_attempt_failure() {
        let mut generator = MockGenerationService::new();
        generator.expect_generate().times(2).returning(|_, _| Ok(vec![image()]));

        let calls = AtomicU32::new(0);
        let mut sink = MockOutputSink::new();
        sink.expect_persist().times(2).returning(move |stem, _| {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(GenerationFailure::Storage("disk full".to_string()))
            } else {
                Ok(vec![PathBuf::from(format!("{stem}_0.jpeg"))])
            }
        });

        let ctx = context(generator, sink, 1, RunConfig::default(), &["plum"]);
        let runner = TaskRunner::new(WorkerId::Runner(0), Arc::clone(&ctx));

        let outcome = runner.process_item(WorkItem::from("plum")).await.unwrap();

        // The index taken by the failed write is not reused
        assert_eq!(outcome, ItemOutcome::Completed { attempts: 2, output_index: 1 });
        assert_eq!(ctx.pool.failure_count(CredentialId::new(0)), 0);
        assert_eq!(ctx.queue.completed_len(), 1);
    }

    #[tokio::test]
    async fn test_pool_exhaustion_mid_item_is_fatal() {
        let mut generator = MockGenerationService::new();
        generator
            .expect_generate()
            .times(2)
            .returning(|_, _| Err(GenerationFailure::Network("reset".to_string())));

        let config = RunConfig {
            max_attempts: 3,
            eviction_threshold: 2,
        };
        let ctx = context(generator, accepting_sink(), 1, config, &["fig"]);
        let runner = TaskRunner::new(WorkerId::Runner(0), Arc::clone(&ctx));

        let result = runner.process_item(WorkItem::from("fig")).await;

        assert!(matches!(result, Err(OrchestratorError::PoolExhausted { evicted: 1 })));
        assert!(ctx.queue.drain_completed().is_empty());
        assert!(ctx.queue.drain_abandoned().is_empty());
    }

    #[tokio::test]
    async fn test_run_drains_queue_and_counts_progress() {
        let mut generator = MockGenerationService::new();
        generator.expect_generate().times(3).returning(|_, _| Ok(vec![image()]));

        let ctx = context(generator, accepting_sink(), 1, RunConfig::default(), &["a", "b", "c"]);
        let report = TaskRunner::new(WorkerId::Runner(2), Arc::clone(&ctx)).run().await.unwrap();

        assert_eq!(
            report,
            RunnerReport {
                worker: WorkerId::Runner(2),
                completed: 3,
                abandoned: 0,
            }
        );
        assert_eq!(ctx.progress.peek(), 3);
        assert_eq!(ctx.output_index.peek(), 3);
        assert_eq!(ctx.queue.pending_len(), 0);
    }
}
