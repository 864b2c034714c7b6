//! Persistence for job records.
//!
//! The store is the single source of truth for job state. Callers read a
//! record fresh, batch mutations in memory, and write it back with a single
//! [`JobStore::save`]. There is no version token: concurrent writers to the
//! same record clobber each other, which the orchestrator accepts because
//! exactly one actor owns a record at any point of its lifecycle.

pub mod file;
pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::job::JobRecord;

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new record. Fails with `JobAlreadyExists` when the id is
    /// taken (conditional read before write; the narrow TOCTOU window is
    /// benign because ids derive from stable names and a double create
    /// just reports a redundant error).
    async fn create(&self, record: JobRecord) -> Result<()>;

    /// Load a record. A missing id is `JobNotFound`, never an empty record.
    async fn load(&self, id: &str) -> Result<JobRecord>;

    async fn exists(&self, id: &str) -> Result<bool>;

    /// Idempotent full-record overwrite keyed by `record.id`.
    async fn save(&self, record: &JobRecord) -> Result<()>;

    /// All records; the scheduler filters by status on top of this.
    async fn list(&self) -> Result<Vec<JobRecord>>;
}

pub use file::FileJobStore;
pub use memory::MemoryJobStore;
