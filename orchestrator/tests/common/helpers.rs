//! Test helpers and builder patterns for orchestrator tests
//!
//! This module provides convenient helper functions and builder patterns
//! to reduce test boilerplate and improve maintainability.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use orchestrator::{
    GenerationService, MockBacklogStore, MockCredentialSource, MockGenerationService, MockOutputSink,
    OrchestratorError, PoolOrchestrator, RunConfig, RunSummary,
};
use shared::{Credential, GeneratedImage, GenerationFailure, WorkItem};
use tokio::sync::Notify;

use super::fixtures::TestFixtures;

/// Scripted generator behaviour: (secret, prompt, call number) -> result
pub type Script = Arc<dyn Fn(&str, &str, usize) -> Result<Vec<GeneratedImage>, GenerationFailure> + Send + Sync>;

pub type TestOrchestrator<G = MockGenerationService> = PoolOrchestrator<MockCredentialSource, MockBacklogStore, G, MockOutputSink>;

/// Generator that never answers for one prompt and succeeds for the rest
///
/// `stalled` is notified once a call for the stalled prompt is in flight.
pub struct StallingGenerator {
    stall_on: String,
    pub stalled: Arc<Notify>,
}

impl StallingGenerator {
    pub fn new(stall_on: &str) -> Self {
        Self {
            stall_on: stall_on.to_string(),
            stalled: Arc::new(Notify::new()),
        }
    }
}

#[async_trait::async_trait]
impl GenerationService for StallingGenerator {
    async fn generate(&self, _secret: &str, prompt: &str) -> Result<Vec<GeneratedImage>, GenerationFailure> {
        if prompt == self.stall_on {
            self.stalled.notify_one();
            std::future::pending::<()>().await;
        }
        Ok(TestFixtures::images(1))
    }
}

/// What the mocks observed during a run
#[derive(Clone, Default)]
pub struct RunRecorder {
    pub generate_calls: Arc<AtomicUsize>,
    pub persisted_stems: Arc<Mutex<Vec<String>>>,
    pub written_back: Arc<Mutex<Option<Vec<WorkItem>>>>,
}

impl RunRecorder {
    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn persisted_stems(&self) -> Vec<String> {
        self.persisted_stems.lock().unwrap().clone()
    }

    /// Backlog contents handed to `write_back`, if it was called
    pub fn written_back(&self) -> Option<Vec<WorkItem>> {
        self.written_back.lock().unwrap().clone()
    }
}

/// Builder pattern for creating test orchestrators with sensible defaults
pub struct OrchestratorBuilder {
    credentials: Vec<Credential>,
    backlog: Vec<WorkItem>,
    existing_names: Vec<String>,
    script: Script,
    failing_persists: usize,
    failing_write_back: bool,
    config: RunConfig,
}

impl OrchestratorBuilder {
    /// Two credentials, five prompts, every generation succeeds
    pub fn new() -> Self {
        Self {
            credentials: TestFixtures::credentials(2),
            backlog: TestFixtures::numbered_prompts(5),
            existing_names: Vec::new(),
            script: Arc::new(|_, _, _| Ok(TestFixtures::images(2))),
            failing_persists: 0,
            failing_write_back: false,
            config: RunConfig::default(),
        }
    }

    pub fn with_credentials(mut self, credentials: Vec<Credential>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_backlog(mut self, backlog: Vec<WorkItem>) -> Self {
        self.backlog = backlog;
        self
    }

    pub fn with_existing_names(mut self, names: &[&str]) -> Self {
        self.existing_names = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn with_script<F>(mut self, script: F) -> Self
    where
        F: Fn(&str, &str, usize) -> Result<Vec<GeneratedImage>, GenerationFailure> + Send + Sync + 'static,
    {
        self.script = Arc::new(script);
        self
    }

    /// Every generation fails with the given failure
    pub fn always_failing(self, failure: GenerationFailure) -> Self {
        self.with_script(move |_, _, _| Err(failure.clone()))
    }

    /// The first `count` persists fail with a storage error
    pub fn with_failing_persists(mut self, count: usize) -> Self {
        self.failing_persists = count;
        self
    }

    pub fn with_failing_write_back(mut self) -> Self {
        self.failing_write_back = true;
        self
    }

    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> (TestOrchestrator, RunRecorder) {
        let recorder = RunRecorder::default();

        let mut generator = MockGenerationService::new();
        let calls = Arc::clone(&recorder.generate_calls);
        let script = Arc::clone(&self.script);
        generator
            .expect_generate()
            .returning(move |secret, prompt| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                script(secret, prompt, n)
            })
            .times(0..);

        self.assemble(generator, recorder)
    }

    /// Build around a hand-written generator; `generate_calls` is not tracked
    pub fn build_with_generator<G>(self, generator: G) -> (TestOrchestrator<G>, RunRecorder)
    where
        G: GenerationService + 'static,
    {
        self.assemble(generator, RunRecorder::default())
    }

    fn assemble<G>(self, generator: G, recorder: RunRecorder) -> (TestOrchestrator<G>, RunRecorder)
    where
        G: GenerationService + 'static,
    {
        let mut credentials = MockCredentialSource::new();
        let loaded = self.credentials.clone();
        credentials
            .expect_load_credentials()
            .returning(move || Ok(loaded.clone()))
            .times(0..);

        let mut backlog = MockBacklogStore::new();
        let stored = self.backlog.clone();
        backlog.expect_load().returning(move || Ok(stored.clone())).times(0..);
        let written_back = Arc::clone(&recorder.written_back);
        let failing_write_back = self.failing_write_back;
        backlog
            .expect_write_back()
            .returning(move |remaining| {
                *written_back.lock().unwrap() = Some(remaining.to_vec());
                if failing_write_back {
                    Err(OrchestratorError::Backlog {
                        path: "prompts.json".to_string(),
                        message: "disk full".to_string(),
                    })
                } else {
                    Ok(())
                }
            })
            .times(0..);

        let mut sink = MockOutputSink::new();
        let existing = self.existing_names.clone();
        sink.expect_existing_names()
            .returning(move || Ok(existing.clone()))
            .times(0..);
        let stems = Arc::clone(&recorder.persisted_stems);
        let persists = Arc::new(AtomicUsize::new(0));
        let failing_persists = self.failing_persists;
        sink.expect_persist()
            .returning(move |stem, images| {
                if persists.fetch_add(1, Ordering::SeqCst) < failing_persists {
                    return Err(GenerationFailure::Storage("disk full".to_string()));
                }
                stems.lock().unwrap().push(stem.to_string());
                Ok((0..images.len()).map(|n| PathBuf::from(format!("{stem}_{n}.jpeg"))).collect())
            })
            .times(0..);

        let orchestrator = PoolOrchestrator::new(credentials, backlog, generator, sink).with_config(self.config);
        (orchestrator, recorder)
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Test helper functions for common test scenarios
pub struct TestHelpers;

impl TestHelpers {
    /// Leading output index of a persisted stem
    pub fn stem_index(stem: &str) -> u64 {
        stem.split('_').next().unwrap().parse().unwrap()
    }

    /// Completed and remaining partition the original backlog
    pub fn assert_partition(original: &[WorkItem], summary: &RunSummary) {
        let completed: HashSet<&WorkItem> = summary.completed.iter().collect();
        let remaining: HashSet<&WorkItem> = summary.remaining.iter().collect();
        let all: HashSet<&WorkItem> = original.iter().collect();

        assert!(completed.is_disjoint(&remaining), "an item was both completed and remaining");
        let union: HashSet<&WorkItem> = completed.union(&remaining).copied().collect();
        assert_eq!(union, all, "completed and remaining must cover the original backlog");
    }
}
