use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job already exists: {0}")]
    JobAlreadyExists(String),

    #[error("No usable job id could be derived from {0:?}")]
    InvalidJobId(String),

    #[error("Invalid transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: String,
        from: String,
        to: String,
    },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Cluster error: {0}")]
    Cluster(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
