//! Main orchestrator implementation
//!
//! Loads credentials and the backlog through injected services, launches
//! one task runner per credential, waits for all of them and writes the
//! unfinished backlog back, whether the run ended cleanly, failed or was
//! interrupted.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use shared::{logging, worker_debug, worker_error, worker_info, worker_warn, CredentialId, WorkItem, WorkerId};
use tokio::task::JoinHandle;

use crate::config::RunConfig;
use crate::core::{CredentialPool, IndexAllocator, RunContext, RunnerReport, TaskRunner, WorkQueue};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::{BacklogStore, CredentialSource, GenerationService, OutputSink};

type WorkerHandle = (WorkerId, JoinHandle<OrchestratorResult<RunnerReport>>);

/// What a finished run did with the backlog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub completed: Vec<WorkItem>,
    pub abandoned: Vec<WorkItem>,
    pub evicted: Vec<CredentialId>,
    /// Written back to the backlog store
    pub remaining: Vec<WorkItem>,
}

/// Remove every completed prompt (by value) from the original backlog,
/// keeping the original order of what is left
pub fn reconcile(original: &[WorkItem], completed: &[WorkItem]) -> Vec<WorkItem> {
    let done: HashSet<&WorkItem> = completed.iter().collect();
    original.iter().filter(|item| !done.contains(item)).cloned().collect()
}

/// Coordinates one run over a credential pool
pub struct PoolOrchestrator<C, B, G, S>
where
    C: CredentialSource,
    B: BacklogStore,
    G: GenerationService + 'static,
    S: OutputSink + 'static,
{
    credentials: C,
    backlog: B,
    generator: Arc<G>,
    sink: Arc<S>,
    config: RunConfig,
}

impl<C, B, G, S> PoolOrchestrator<C, B, G, S>
where
    C: CredentialSource,
    B: BacklogStore,
    G: GenerationService + 'static,
    S: OutputSink + 'static,
{
    /// Create new orchestrator with injected dependencies
    pub fn new(credentials: C, backlog: B, generator: G, sink: S) -> Self {
        Self {
            credentials,
            backlog,
            generator: Arc::new(generator),
            sink: Arc::new(sink),
            config: RunConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    /// Execute the run to completion
    pub async fn run(&self) -> OrchestratorResult<RunSummary> {
        self.run_until(std::future::pending()).await
    }

    /// Execute the run, stopping early when `shutdown` resolves
    ///
    /// Startup validation failures return before any worker starts and
    /// before the backlog is touched. Once workers have started, the
    /// backlog write-back always happens, then the first fatal error (if
    /// any) is returned. On shutdown the workers are aborted, their leases
    /// return to the pool, and the run ends with `Interrupted`.
    pub async fn run_until<F>(&self, shutdown: F) -> OrchestratorResult<RunSummary>
    where
        F: Future<Output = ()>,
    {
        let me = WorkerId::Orchestrator;
        self.config.validate()?;

        let credentials = self.credentials.load_credentials().await?;
        if credentials.is_empty() {
            return Err(OrchestratorError::NoCredentials);
        }
        worker_debug!(me, "🔑 Loaded {} credential(s)", credentials.len());

        let original = self.backlog.load().await?;
        if original.is_empty() {
            return Err(OrchestratorError::EmptyBacklog);
        }
        worker_debug!(me, "📝 Loaded {} prompt(s)", original.len());

        let existing = self.sink.existing_names().await?;
        let output_index = IndexAllocator::from_existing(&existing);
        worker_debug!(me, "🔢 Output numbering starts at {}", output_index.peek());

        let worker_count = credentials.len();
        let ctx = Arc::new(RunContext::new(
            CredentialPool::new(credentials, self.config.eviction_threshold),
            WorkQueue::new(original.clone()),
            output_index,
            Arc::clone(&self.generator),
            Arc::clone(&self.sink),
            self.config,
        ));

        worker_info!(
            me,
            "🏁 Processing {} prompt(s) across {} worker(s)",
            original.len(),
            worker_count
        );
        let mut handles = Self::spawn_workers(&ctx, worker_count);

        let outcome = tokio::select! {
            outcome = Self::join_workers(&mut handles) => outcome,
            _ = shutdown => {
                worker_warn!(me, "⚠️  Interrupted, stopping {} worker(s)", handles.len());
                Self::abort_workers(handles).await;
                Err(OrchestratorError::Interrupted)
            }
        };

        let completed = ctx.queue.drain_completed();
        let abandoned = ctx.queue.drain_abandoned();
        let remaining = reconcile(&original, &completed);
        let evicted = ctx.pool.snapshot().evicted;

        // Persist progress before surfacing any run failure, so a restart
        // never repeats finished prompts.
        if let Err(e) = self.backlog.write_back(&remaining).await {
            logging::log_error(me, "Backlog write-back", &e);
            return Err(match outcome {
                Err(run_error) => run_error,
                Ok(_) => e,
            });
        }
        worker_info!(me, "💾 {} prompt(s) left in the backlog", remaining.len());

        for report in outcome? {
            worker_debug!(
                report.worker,
                "Finished with {} completed and {} abandoned",
                report.completed,
                report.abandoned
            );
        }

        Ok(RunSummary {
            total: original.len(),
            completed,
            abandoned,
            evicted,
            remaining,
        })
    }

    /// Launch one runner per credential
    fn spawn_workers(ctx: &Arc<RunContext<G, S>>, worker_count: usize) -> Vec<WorkerHandle> {
        (0..worker_count)
            .map(|n| {
                let worker = WorkerId::Runner(n as u32);
                let runner = TaskRunner::new(worker, Arc::clone(ctx));
                (worker, tokio::spawn(runner.run()))
            })
            .collect()
    }

    /// Wait for every runner, keeping the most serious failure
    ///
    /// Finished runners are removed from `handles`, so whatever is left when
    /// this future is dropped early is still running.
    async fn join_workers(handles: &mut Vec<WorkerHandle>) -> OrchestratorResult<Vec<RunnerReport>> {
        let mut reports = Vec::with_capacity(handles.len());
        let mut first_error: Option<OrchestratorError> = None;

        while let Some((worker, handle)) = handles.first_mut() {
            let worker = *worker;
            let joined = handle.await;
            handles.remove(0);

            let error = match joined {
                Ok(Ok(report)) => {
                    reports.push(report);
                    continue;
                }
                Ok(Err(e)) => e,
                Err(join_error) => OrchestratorError::WorkerFailed {
                    worker: worker.to_string(),
                    message: join_error.to_string(),
                },
            };

            worker_error!(worker, "❌ Worker stopped: {}", error);
            // Pool exhaustion outranks an isolated worker failure.
            first_error = match first_error {
                Some(existing) if existing.is_fatal_run_error() => Some(existing),
                _ => Some(error),
            };
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(reports),
        }
    }

    /// Cancel every runner and wait until none can record more progress
    async fn abort_workers(handles: Vec<WorkerHandle>) {
        for (_, handle) in &handles {
            handle.abort();
        }
        for (worker, handle) in handles {
            if let Ok(Ok(report)) = handle.await {
                worker_debug!(worker, "Finished before the abort with {} completed", report.completed);
            }
        }
    }
}
