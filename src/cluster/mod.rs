//! Cluster-execution adapter.
//!
//! Translates a job id into a batch workload on the shared cluster. The
//! workload name derives deterministically from the job id, which makes a
//! repeated submit for the same job idempotent at the naming level and
//! lets the scheduler match live workloads back to job records.

pub mod kubectl;

use async_trait::async_trait;

use crate::error::Result;

/// Prefix shared by every workload the orchestrator creates; also the
/// name-prefix used to find leftover execution units during teardown.
pub const WORKLOAD_PREFIX: &str = "indexing-job-";

/// Deterministic workload name for a job id.
pub fn workload_name(job_id: &str) -> String {
    format!("{WORKLOAD_PREFIX}{job_id}")
}

#[async_trait]
pub trait ClusterExecutor: Send + Sync {
    /// Create the workload that runs the job entry point for `job_id`.
    /// A submit error must be turned into a FAILED record by the caller,
    /// never left as a silently stuck SCHEDULED job.
    async fn submit(&self, job_id: &str) -> Result<()>;

    /// Remove the workload and any execution units it spawned. Two ordered
    /// best-effort sub-steps: the workload object first, then leftover
    /// units found by name prefix. A missing workload is a no-op, so
    /// retrying teardown is always safe.
    async fn teardown(&self, job_id: &str) -> Result<()>;

    /// Names of the orchestrator's currently active workloads.
    async fn list_active(&self) -> Result<Vec<String>>;
}

pub use kubectl::KubectlExecutor;
