//! The job entry point: the process started inside a scheduled workload.
//!
//! Loads its job record, transitions it to RUNNING, drives the indexing
//! engine with progress callbacks wired in, and finalizes the record to
//! COMPLETE or FAILED. The surrounding process exits non-zero on FAILED so
//! the cluster runtime sees the failure too.

pub mod engine;

use std::sync::Arc;

use crate::error::{OrchestratorError, Result};
use crate::progress::{CallbackDispatcher, LogCallback, ProgressReporter, StageCallback};
use crate::store::JobStore;

pub use engine::{CommandEngine, IndexingEngine};

pub struct JobRunner {
    store: Arc<dyn JobStore>,
    engine: Arc<dyn IndexingEngine>,
}

impl JobRunner {
    pub fn new(store: Arc<dyn JobStore>, engine: Arc<dyn IndexingEngine>) -> Self {
        Self { store, engine }
    }

    /// Run one indexing job to completion.
    ///
    /// Returns `Err` when the job does not finish COMPLETE, so the caller
    /// can exit non-zero. A missing record is fatal: the workload was
    /// submitted for an id the store does not know.
    pub async fn run(&self, job_id: &str) -> Result<()> {
        let mut record = self.store.load(job_id).await?;
        tracing::info!(job_id, index = %record.human_readable_index_name, "Starting indexing run");

        record.start_run(self.engine.workflows());
        self.store.save(&record).await?;

        let callbacks: Vec<Arc<dyn StageCallback>> = vec![
            Arc::new(ProgressReporter::new(self.store.clone(), job_id)),
            Arc::new(LogCallback),
        ];
        let dispatcher = CallbackDispatcher::new(callbacks);

        let engine_result = self.engine.run(&record, &dispatcher).await;

        // Reload: the reporter has been writing the record while the
        // engine ran.
        let mut record = self.store.load(job_id).await?;
        match engine_result {
            Err(e) => {
                record.mark_failed(format!("Indexing engine failed: {e}"));
                self.store.save(&record).await?;
                tracing::error!(job_id, error = %e, "Indexing engine failed");
                Err(e)
            }
            Ok(()) if !record.failed_workflows.is_empty() => {
                let note = format!(
                    "{} of {} workflows failed",
                    record.failed_workflows.len(),
                    record.all_workflows.len()
                );
                record.mark_failed(note.clone());
                self.store.save(&record).await?;
                tracing::error!(job_id, failed = record.failed_workflows.len(), "Indexing run failed");
                Err(OrchestratorError::Engine(note))
            }
            Ok(()) => {
                record.mark_complete();
                self.store.save(&record).await?;
                tracing::info!(job_id, "Indexing run complete");
                Ok(())
            }
        }
    }
}
