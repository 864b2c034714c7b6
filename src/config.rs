use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Configuration for submitting indexing workloads to the cluster.
///
/// The executor only fills placeholders in the workload manifest; every
/// other manifest field is fixed by the template.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Namespace the workloads are created in
    pub namespace: String,
    /// Container image the workload runs (must contain the indexflow binary)
    pub image: String,
    /// Service account attached to the workload pod
    pub service_account: String,
    /// Path to the kubectl binary
    pub kubectl_path: String,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            image: "indexflow:latest".to_string(),
            service_account: "default".to_string(),
            kubectl_path: "kubectl".to_string(),
        }
    }
}

/// Top-level orchestrator configuration shared by the scheduler daemon
/// and the job entry point.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Directory the file-backed job store persists records in
    pub store_dir: PathBuf,
    /// Seconds between scheduler reconcile cycles in daemon mode
    pub interval_secs: u64,
    pub cluster: ClusterConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from("jobs"),
            interval_secs: 60,
            cluster: ClusterConfig::default(),
        }
    }
}

/// One named stage of the indexing pipeline, executed as a shell command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSpec {
    pub name: String,
    pub command: String,
}

/// Ordered list of pipeline stages driven by the job entry point.
///
/// Loaded from a JSON document, e.g.:
/// `{"stages": [{"name": "extract_graph", "command": "indexer extract"}]}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub stages: Vec<StageSpec>,
}

impl PipelineSpec {
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn stage_names(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_config_default() {
        let cfg = ClusterConfig::default();
        assert_eq!(cfg.namespace, "default");
        assert_eq!(cfg.image, "indexflow:latest");
        assert_eq!(cfg.service_account, "default");
        assert_eq!(cfg.kubectl_path, "kubectl");
    }

    #[test]
    fn orchestrator_config_default() {
        let cfg = OrchestratorConfig::default();
        assert_eq!(cfg.store_dir, PathBuf::from("jobs"));
        assert_eq!(cfg.interval_secs, 60);
    }

    #[test]
    fn pipeline_spec_parses_and_lists_stage_names() {
        let raw = r#"{
            "stages": [
                {"name": "extract_graph", "command": "indexer extract"},
                {"name": "summarize", "command": "indexer summarize"}
            ]
        }"#;
        let spec: PipelineSpec = serde_json::from_str(raw).unwrap();
        assert_eq!(spec.stages.len(), 2);
        assert_eq!(spec.stage_names(), vec!["extract_graph", "summarize"]);
    }

    #[test]
    fn pipeline_spec_rejects_missing_fields() {
        let raw = r#"{"stages": [{"name": "extract_graph"}]}"#;
        assert!(serde_json::from_str::<PipelineSpec>(raw).is_err());
    }
}
