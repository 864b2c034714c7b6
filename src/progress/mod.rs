//! Stage-lifecycle notifications for a running indexing job.
//!
//! The job entry point publishes start/end/error events as the engine
//! works through its workflows; subscribers consume them independently.
//! [`ProgressReporter`] is the subscriber that keeps the job record
//! current; [`LogCallback`] mirrors the same events into the log stream.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::job::JobStatus;
use crate::store::JobStore;

#[async_trait]
pub trait StageCallback: Send + Sync {
    async fn on_workflow_start(&self, name: &str) -> Result<()>;

    async fn on_workflow_end(&self, name: &str) -> Result<()>;

    /// `workflow` is the stage the error happened in, when known.
    async fn on_error(&self, workflow: Option<&str>, message: &str) -> Result<()>;
}

/// Ordered fan-out over stage callbacks.
///
/// Every subscriber sees every event; a failing subscriber is logged and
/// does not block the others. Events are delivered synchronously in the
/// order the engine emits them, so a subscriber that persists state has
/// done so before the engine moves on.
#[derive(Default)]
pub struct CallbackDispatcher {
    callbacks: Vec<Arc<dyn StageCallback>>,
}

impl CallbackDispatcher {
    pub fn new(callbacks: Vec<Arc<dyn StageCallback>>) -> Self {
        Self { callbacks }
    }

    pub async fn workflow_start(&self, name: &str) {
        for callback in &self.callbacks {
            if let Err(e) = callback.on_workflow_start(name).await {
                tracing::warn!(workflow = name, error = %e, "Stage-start callback failed");
            }
        }
    }

    pub async fn workflow_end(&self, name: &str) {
        for callback in &self.callbacks {
            if let Err(e) = callback.on_workflow_end(name).await {
                tracing::warn!(workflow = name, error = %e, "Stage-end callback failed");
            }
        }
    }

    pub async fn error(&self, workflow: Option<&str>, message: &str) {
        for callback in &self.callbacks {
            if let Err(e) = callback.on_error(workflow, message).await {
                tracing::warn!(workflow = ?workflow, error = %e, "Error callback failed");
            }
        }
    }
}

/// Persists stage progress into the job record.
///
/// Every hook loads the record fresh, mutates it in memory, and saves the
/// full record before returning, so a crash right after a hook loses at
/// most the in-flight stage.
pub struct ProgressReporter {
    store: Arc<dyn JobStore>,
    job_id: String,
}

impl ProgressReporter {
    pub fn new(store: Arc<dyn JobStore>, job_id: impl Into<String>) -> Self {
        Self {
            store,
            job_id: job_id.into(),
        }
    }
}

#[async_trait]
impl StageCallback for ProgressReporter {
    async fn on_workflow_start(&self, name: &str) -> Result<()> {
        let mut record = self.store.load(&self.job_id).await?;
        // A stage-start event can arrive before the explicit initial
        // transition; force Running rather than losing the event.
        if record.status != JobStatus::Running {
            record.status = JobStatus::Running;
        }
        record.progress = format!("Workflow {name} started");
        self.store.save(&record).await
    }

    async fn on_workflow_end(&self, name: &str) -> Result<()> {
        let mut record = self.store.load(&self.job_id).await?;
        // Append-only, no deduplication: a stage reported twice is
        // recorded twice.
        record.completed_workflows.push(name.to_string());
        record.recompute_percent();
        record.progress = format!(
            "Workflow {name} complete ({:.2}% of workflows)",
            record.percent_complete
        );
        self.store.save(&record).await
    }

    async fn on_error(&self, workflow: Option<&str>, message: &str) -> Result<()> {
        let mut record = self.store.load(&self.job_id).await?;
        if let Some(workflow) = workflow {
            record.failed_workflows.push(workflow.to_string());
            record.progress = format!("Workflow {workflow} failed: {message}");
        } else {
            record.progress = format!("Error: {message}");
        }
        self.store.save(&record).await
    }
}

/// Mirrors stage events into the log stream; stateless.
pub struct LogCallback;

#[async_trait]
impl StageCallback for LogCallback {
    async fn on_workflow_start(&self, name: &str) -> Result<()> {
        tracing::info!(workflow = name, "Workflow started");
        Ok(())
    }

    async fn on_workflow_end(&self, name: &str) -> Result<()> {
        tracing::info!(workflow = name, "Workflow complete");
        Ok(())
    }

    async fn on_error(&self, workflow: Option<&str>, message: &str) -> Result<()> {
        tracing::error!(workflow = ?workflow, message, "Workflow error");
        Ok(())
    }
}
