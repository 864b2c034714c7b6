use std::sync::Arc;

use async_trait::async_trait;

use indexflow::error::{OrchestratorError, Result};
use indexflow::job::{JobRecord, JobStatus};
use indexflow::progress::CallbackDispatcher;
use indexflow::runner::{IndexingEngine, JobRunner};
use indexflow::store::{JobStore, MemoryJobStore};

/// Scripted engine: runs its stages by emitting the events a real engine
/// would, with a chosen set of stages failing.
struct FakeEngine {
    stages: Vec<String>,
    failing: Vec<String>,
    /// When set, the engine itself errors out after the first stage.
    break_after_first: bool,
}

impl FakeEngine {
    fn succeeding(stages: &[&str]) -> Self {
        Self {
            stages: stages.iter().map(|s| s.to_string()).collect(),
            failing: Vec::new(),
            break_after_first: false,
        }
    }

    fn with_failing(stages: &[&str], failing: &[&str]) -> Self {
        Self {
            stages: stages.iter().map(|s| s.to_string()).collect(),
            failing: failing.iter().map(|s| s.to_string()).collect(),
            break_after_first: false,
        }
    }
}

#[async_trait]
impl IndexingEngine for FakeEngine {
    fn workflows(&self) -> Vec<String> {
        self.stages.clone()
    }

    async fn run(&self, _record: &JobRecord, callbacks: &CallbackDispatcher) -> Result<()> {
        for (i, stage) in self.stages.iter().enumerate() {
            callbacks.workflow_start(stage).await;
            if self.failing.contains(stage) {
                callbacks.error(Some(stage), "stage blew up").await;
            } else {
                callbacks.workflow_end(stage).await;
            }
            if self.break_after_first && i == 0 {
                return Err(OrchestratorError::Engine("engine crashed".into()));
            }
        }
        Ok(())
    }
}

async fn scheduled_job(store: &MemoryJobStore) {
    store
        .create(JobRecord::new("my index", "storage"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_successful_run_completes_at_100_percent() {
    let store = Arc::new(MemoryJobStore::new());
    scheduled_job(&store).await;

    let engine = Arc::new(FakeEngine::succeeding(&["extract", "summarize", "report"]));
    let runner = JobRunner::new(store.clone(), engine);
    runner.run("my-index").await.unwrap();

    let record = store.load("my-index").await.unwrap();
    assert_eq!(record.status, JobStatus::Complete);
    assert_eq!(record.percent_complete, 100.0);
    assert_eq!(record.all_workflows.len(), 3);
    assert_eq!(record.completed_workflows.len(), 3);
    assert!(record.failed_workflows.is_empty());
    assert_eq!(record.progress, "Indexing complete");
}

#[tokio::test]
async fn test_failed_workflow_fails_the_job() {
    let store = Arc::new(MemoryJobStore::new());
    scheduled_job(&store).await;

    let engine = Arc::new(FakeEngine::with_failing(
        &["extract", "summarize", "report"],
        &["summarize"],
    ));
    let runner = JobRunner::new(store.clone(), engine);

    // The runner reports failure so the process can exit non-zero.
    let err = runner.run("my-index").await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Engine(_)));

    let record = store.load("my-index").await.unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(record.failed_workflows, vec!["summarize".to_string()]);
    // The stages around the failing one still ran.
    assert_eq!(
        record.completed_workflows,
        vec!["extract".to_string(), "report".to_string()]
    );
    assert!(record.progress.contains("1 of 3 workflows failed"));
}

#[tokio::test]
async fn test_engine_error_fails_the_job() {
    let store = Arc::new(MemoryJobStore::new());
    scheduled_job(&store).await;

    let engine = Arc::new(FakeEngine {
        stages: vec!["extract".into(), "summarize".into()],
        failing: Vec::new(),
        break_after_first: true,
    });
    let runner = JobRunner::new(store.clone(), engine);

    let err = runner.run("my-index").await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Engine(_)));

    let record = store.load("my-index").await.unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert!(record.progress.contains("engine crashed"));
    // The stage that finished before the crash was persisted.
    assert_eq!(record.completed_workflows, vec!["extract".to_string()]);
}

#[tokio::test]
async fn test_run_populates_all_workflows_before_driving() {
    let store = Arc::new(MemoryJobStore::new());
    scheduled_job(&store).await;

    // Stale lists from a previous run must not leak into this one.
    let mut record = store.load("my-index").await.unwrap();
    record.all_workflows = vec!["old".into()];
    record.completed_workflows = vec!["old".into()];
    record.status = JobStatus::Failed;
    store.save(&record).await.unwrap();

    let engine = Arc::new(FakeEngine::succeeding(&["extract"]));
    let runner = JobRunner::new(store.clone(), engine);
    runner.run("my-index").await.unwrap();

    let record = store.load("my-index").await.unwrap();
    assert_eq!(record.all_workflows, vec!["extract".to_string()]);
    assert_eq!(record.completed_workflows, vec!["extract".to_string()]);
}

#[tokio::test]
async fn test_unknown_job_id_is_fatal() {
    let store = Arc::new(MemoryJobStore::new());
    let engine = Arc::new(FakeEngine::succeeding(&["extract"]));
    let runner = JobRunner::new(store, engine);

    let err = runner.run("ghost").await.unwrap_err();
    assert!(matches!(err, OrchestratorError::JobNotFound(_)));
}
