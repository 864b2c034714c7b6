//! The periodic scheduling cycle.
//!
//! Each cycle reconciles cluster state against the job store, marks
//! orphaned RUNNING records as failed, and submits the oldest SCHEDULED
//! job when nothing is active. One scheduler instance is assumed; the
//! scan-then-submit sequence has no internal mutual exclusion, so
//! overlapping invocations could double-schedule.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::cluster::{workload_name, ClusterExecutor};
use crate::error::Result;
use crate::job::JobStatus;
use crate::store::JobStore;

pub struct Scheduler {
    store: Arc<dyn JobStore>,
    executor: Arc<dyn ClusterExecutor>,
}

impl Scheduler {
    pub fn new(store: Arc<dyn JobStore>, executor: Arc<dyn ClusterExecutor>) -> Self {
        Self { store, executor }
    }

    /// One reconcile-and-submit cycle.
    ///
    /// 1. List the orchestrator's active workloads.
    /// 2. Every RUNNING record without a matching workload crashed
    ///    (process kill, OOM): mark it failed. If any RUNNING record still
    ///    has a live workload, stop here - at most one job runs at a time.
    ///    A cycle that marked a crash also stops: reconcile first,
    ///    schedule on the next cycle.
    /// 3. Submit the SCHEDULED record with the smallest request time; ties
    ///    fall to store iteration order. A submission error marks that
    ///    record failed instead of retrying another candidate; the next
    ///    cycle moves on to the following job.
    pub async fn run_once(&self) -> Result<()> {
        let active = self.executor.list_active().await?;
        let records = self.store.list().await?;

        let mut live_run = false;
        let mut marked_crashed = false;
        for record in records.iter().filter(|r| r.status == JobStatus::Running) {
            if active.contains(&workload_name(&record.id)) {
                live_run = true;
                continue;
            }
            tracing::warn!(job_id = %record.id, "Running job has no workload, marking failed");
            let mut crashed = record.clone();
            crashed.mark_failed("Indexing workload disappeared before the run finished");
            self.store.save(&crashed).await?;
            marked_crashed = true;
        }
        if live_run || marked_crashed {
            tracing::debug!("Reconcile found running or crashed jobs, nothing scheduled");
            return Ok(());
        }

        let Some(next) = records
            .iter()
            .filter(|r| r.status == JobStatus::Scheduled)
            .min_by_key(|r| r.epoch_request_time)
        else {
            tracing::debug!("No scheduled jobs");
            return Ok(());
        };

        match self.executor.submit(&next.id).await {
            Ok(()) => {
                tracing::info!(
                    job_id = %next.id,
                    epoch_request_time = next.epoch_request_time,
                    "Submitted indexing job"
                );
            }
            Err(e) => {
                // Persisting the failure keeps a broken cluster from
                // re-selecting the same job forever.
                tracing::error!(job_id = %next.id, error = %e, "Workload submission failed");
                let mut failed = next.clone();
                failed.mark_failed(format!("Workload submission failed: {e}"));
                self.store.save(&failed).await?;
            }
        }
        Ok(())
    }

    /// Daemon mode: run a cycle per tick until the token is cancelled.
    /// Cycle errors are logged, never fatal to the loop.
    pub async fn run_forever(&self, interval: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        tracing::error!(error = %e, "Scheduler cycle failed");
                    }
                }
                _ = shutdown.cancelled() => {
                    tracing::info!("Scheduler shutting down");
                    break;
                }
            }
        }
    }

    /// Put a failed job back in the queue.
    ///
    /// The record must already be FAILED before anything touches the
    /// cluster: a rejected reschedule has no side effects, so a typo
    /// against a RUNNING job cannot kill its live workload. Only then is
    /// the previous workload torn down - a leftover workload under the
    /// same deterministic name would collide with the resubmission - and
    /// the record reset with a fresh request time.
    pub async fn reschedule(&self, job_id: &str) -> Result<()> {
        let mut record = self.store.load(job_id).await?;
        record.reset_for_reschedule(Utc::now().timestamp())?;
        self.executor.teardown(job_id).await?;
        self.store.save(&record).await?;
        tracing::info!(job_id, "Job rescheduled");
        Ok(())
    }
}
