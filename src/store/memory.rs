use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{OrchestratorError, Result};
use crate::job::JobRecord;
use crate::store::JobStore;

/// In-memory job store, used as the deterministic fake in tests.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    records: RwLock<HashMap<String, JobRecord>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, record: JobRecord) -> Result<()> {
        if record.id.is_empty() {
            return Err(OrchestratorError::InvalidJobId(
                record.human_readable_index_name,
            ));
        }
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(OrchestratorError::JobAlreadyExists(record.id));
        }
        records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<JobRecord> {
        self.records
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| OrchestratorError::JobNotFound(id.to_string()))
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.records.read().await.contains_key(id))
    }

    async fn save(&self, record: &JobRecord) -> Result<()> {
        self.records
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<JobRecord>> {
        Ok(self.records.read().await.values().cloned().collect())
    }
}
