use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{OrchestratorError, Result};
use crate::job::JobRecord;
use crate::store::JobStore;

/// File-backed job store: one JSON document per record under a directory.
///
/// `save` writes to a temp file and renames it into place so a record on
/// disk is always a complete document, matching the full-record-overwrite
/// contract.
#[derive(Debug, Clone)]
pub struct FileJobStore {
    dir: PathBuf,
}

impl FileJobStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    async fn read_record(&self, path: &Path) -> Result<JobRecord> {
        let raw = tokio::fs::read_to_string(path).await?;
        serde_json::from_str(&raw).map_err(|e| {
            OrchestratorError::Store(format!("malformed record at {}: {e}", path.display()))
        })
    }

    async fn write_record(&self, record: &JobRecord) -> Result<()> {
        let body = serde_json::to_string_pretty(record)?;
        let tmp = self.dir.join(format!(".{}.json.tmp", record.id));
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, self.record_path(&record.id)).await?;
        Ok(())
    }
}

#[async_trait]
impl JobStore for FileJobStore {
    async fn create(&self, record: JobRecord) -> Result<()> {
        // An empty id would persist as a dot-file that list() skips,
        // leaving a job the scheduler can never see.
        if record.id.is_empty() {
            return Err(OrchestratorError::InvalidJobId(
                record.human_readable_index_name,
            ));
        }
        // Conditional read before write, not an atomic CAS.
        if self.exists(&record.id).await? {
            return Err(OrchestratorError::JobAlreadyExists(record.id));
        }
        self.write_record(&record).await
    }

    async fn load(&self, id: &str) -> Result<JobRecord> {
        let path = self.record_path(id);
        if !tokio::fs::try_exists(&path).await? {
            return Err(OrchestratorError::JobNotFound(id.to_string()));
        }
        self.read_record(&path).await
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.record_path(id)).await?)
    }

    async fn save(&self, record: &JobRecord) -> Result<()> {
        self.write_record(record).await
    }

    async fn list(&self) -> Result<Vec<JobRecord>> {
        let mut records = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_record = path.extension().is_some_and(|e| e == "json")
                && !entry.file_name().to_string_lossy().starts_with('.');
            if is_record {
                records.push(self.read_record(&path).await?);
            }
        }
        Ok(records)
    }
}
