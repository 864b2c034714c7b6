use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::PipelineSpec;
use crate::error::Result;
use crate::job::JobRecord;
use crate::progress::CallbackDispatcher;

/// Seam to the external indexing engine.
///
/// The orchestrator never looks inside a workflow; it only needs the
/// ordered stage names up front and the start/end/error events while the
/// engine runs them.
#[async_trait]
pub trait IndexingEngine: Send + Sync {
    /// Ordered stage names for one run, known before the run starts.
    fn workflows(&self) -> Vec<String>;

    /// Drive the pipeline, emitting an event pair (or an error event) per
    /// stage through `callbacks`. An `Err` means the engine itself broke,
    /// not that a stage failed.
    async fn run(&self, record: &JobRecord, callbacks: &CallbackDispatcher) -> Result<()>;
}

/// Runs each pipeline stage as an external command via `sh -c`.
///
/// The job id and storage name reach the stage command through
/// environment variables. A failing stage is reported through the error
/// event and the remaining stages still run; the record's
/// `failed_workflows` decides the final job status.
pub struct CommandEngine {
    spec: PipelineSpec,
}

impl CommandEngine {
    pub fn new(spec: PipelineSpec) -> Self {
        Self { spec }
    }
}

#[async_trait]
impl IndexingEngine for CommandEngine {
    fn workflows(&self) -> Vec<String> {
        self.spec.stage_names()
    }

    async fn run(&self, record: &JobRecord, callbacks: &CallbackDispatcher) -> Result<()> {
        for stage in &self.spec.stages {
            callbacks.workflow_start(&stage.name).await;

            let result = Command::new("sh")
                .arg("-c")
                .arg(&stage.command)
                .env("INDEXFLOW_JOB_ID", &record.id)
                .env("INDEXFLOW_STORAGE", &record.sanitized_storage_name)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output()
                .await;

            match result {
                Ok(output) if output.status.success() => {
                    callbacks.workflow_end(&stage.name).await;
                }
                Ok(output) => {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    let message = if stderr.trim().is_empty() {
                        format!("exit code {:?}", output.status.code())
                    } else {
                        stderr.trim().to_string()
                    };
                    callbacks.error(Some(&stage.name), &message).await;
                }
                Err(e) => {
                    callbacks.error(Some(&stage.name), &e.to_string()).await;
                }
            }
        }
        Ok(())
    }
}
