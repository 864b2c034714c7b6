use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};

/// Cluster object names are capped at 63 characters.
const MAX_NAME_LEN: usize = 63;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Scheduled,
    Running,
    Failed,
    Complete,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Scheduled => write!(f, "SCHEDULED"),
            JobStatus::Running => write!(f, "RUNNING"),
            JobStatus::Failed => write!(f, "FAILED"),
            JobStatus::Complete => write!(f, "COMPLETE"),
        }
    }
}

/// Derive the stable job identifier from a user-supplied name.
///
/// Lowercases, keeps ASCII alphanumerics, collapses every other run of
/// characters into a single `-`, and trims to the cluster name limit.
/// Deterministic, so create and load agree on the id.
pub fn sanitize_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_dash = false;
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
            pending_dash = false;
        } else {
            pending_dash = true;
        }
    }
    out.truncate(MAX_NAME_LEN);
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Durable state of one indexing request.
///
/// The record carries no version token; every mutation must be followed by
/// a full `JobStore::save`, and the last writer wins. Mutations are batched
/// in memory and persisted once by the caller rather than per field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Sanitized index name; primary key, immutable once created
    pub id: String,
    /// Unix timestamp of the request; sole ordering key for scheduling
    pub epoch_request_time: i64,
    pub human_readable_index_name: String,
    pub sanitized_storage_name: String,
    pub human_readable_storage_name: String,
    /// Stage names for the current run, set when the run starts
    pub all_workflows: Vec<String>,
    /// Append-only during a run; reset only on reschedule
    pub completed_workflows: Vec<String>,
    pub failed_workflows: Vec<String>,
    pub status: JobStatus,
    pub percent_complete: f64,
    /// Free-text status line, last writer wins
    pub progress: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_extraction_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summarize_descriptions_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community_report_prompt: Option<String>,
}

impl JobRecord {
    /// Build a freshly requested record in `Scheduled` state.
    pub fn new(index_name: &str, storage_name: &str) -> Self {
        Self {
            id: sanitize_name(index_name),
            epoch_request_time: Utc::now().timestamp(),
            human_readable_index_name: index_name.to_string(),
            sanitized_storage_name: sanitize_name(storage_name),
            human_readable_storage_name: storage_name.to_string(),
            all_workflows: Vec::new(),
            completed_workflows: Vec::new(),
            failed_workflows: Vec::new(),
            status: JobStatus::Scheduled,
            percent_complete: 0.0,
            progress: String::new(),
            entity_extraction_prompt: None,
            summarize_descriptions_prompt: None,
            community_report_prompt: None,
        }
    }

    /// Recompute `percent_complete` from the workflow lists, 2 decimal
    /// places, `0.0` while `all_workflows` is empty.
    pub fn recompute_percent(&mut self) {
        self.percent_complete = if self.all_workflows.is_empty() {
            0.0
        } else {
            let raw =
                100.0 * self.completed_workflows.len() as f64 / self.all_workflows.len() as f64;
            (raw * 100.0).round() / 100.0
        };
    }

    /// Begin a run: `Running` status with a fresh set of stage names and
    /// empty completion lists. Does not persist.
    pub fn start_run(&mut self, workflows: Vec<String>) {
        self.status = JobStatus::Running;
        self.all_workflows = workflows;
        self.completed_workflows.clear();
        self.failed_workflows.clear();
        self.recompute_percent();
        self.progress = "Indexing started".to_string();
    }

    pub fn mark_complete(&mut self) {
        self.status = JobStatus::Complete;
        self.percent_complete = 100.0;
        self.progress = "Indexing complete".to_string();
    }

    pub fn mark_failed(&mut self, note: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.progress = note.into();
    }

    /// Reset a failed record so the scheduler will pick it up again.
    ///
    /// Only valid from `Failed`; `Complete` is terminal and `Scheduled`/
    /// `Running` records are still owned by the scheduler. The new request
    /// time is strictly greater than the old one so a reschedule never
    /// jumps the queue.
    pub fn reset_for_reschedule(&mut self, now: i64) -> Result<()> {
        if self.status != JobStatus::Failed {
            return Err(OrchestratorError::InvalidTransition {
                job_id: self.id.clone(),
                from: self.status.to_string(),
                to: JobStatus::Scheduled.to_string(),
            });
        }
        self.status = JobStatus::Scheduled;
        self.epoch_request_time = now.max(self.epoch_request_time + 1);
        self.all_workflows.clear();
        self.completed_workflows.clear();
        self.failed_workflows.clear();
        self.percent_complete = 0.0;
        self.progress = String::new();
        Ok(())
    }
}
