use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::cluster::{workload_name, ClusterExecutor, WORKLOAD_PREFIX};
use crate::config::ClusterConfig;
use crate::error::{OrchestratorError, Result};

/// Parameterized batch-Job manifest. The executor only fills the
/// placeholders; every other field is fixed.
const MANIFEST_TEMPLATE: &str = r#"apiVersion: batch/v1
kind: Job
metadata:
  name: {{workload_name}}
  namespace: {{namespace}}
  labels:
    app: indexflow
spec:
  backoffLimit: 0
  template:
    metadata:
      labels:
        app: indexflow
    spec:
      serviceAccountName: {{service_account}}
      restartPolicy: Never
      containers:
        - name: indexer
          image: {{image}}
          args: ["job", "run", "{{job_id}}"]
"#;

/// Drives the cluster through the `kubectl` CLI.
#[derive(Debug, Clone)]
pub struct KubectlExecutor {
    config: ClusterConfig,
}

impl KubectlExecutor {
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    fn render_manifest(&self, job_id: &str) -> String {
        MANIFEST_TEMPLATE
            .replace("{{workload_name}}", &workload_name(job_id))
            .replace("{{namespace}}", &self.config.namespace)
            .replace("{{service_account}}", &self.config.service_account)
            .replace("{{image}}", &self.config.image)
            .replace("{{job_id}}", job_id)
    }

    async fn kubectl(&self, args: &[&str]) -> Result<std::process::Output> {
        let output = Command::new(&self.config.kubectl_path)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;
        Ok(output)
    }

    /// Delete leftover pods whose name carries the workload prefix for
    /// this job. The workload delete alone can orphan its pod, which keeps
    /// consuming cluster resources.
    async fn delete_pods_by_prefix(&self, prefix: &str) -> Result<()> {
        let output = self
            .kubectl(&["get", "pods", "-n", &self.config.namespace, "-o", "json"])
            .await?;
        if !output.status.success() {
            return Err(OrchestratorError::Cluster(format!(
                "pod listing failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let parsed: serde_json::Value = serde_json::from_slice(&output.stdout)?;
        let names: Vec<String> = parsed["items"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|item| item["metadata"]["name"].as_str())
            .filter(|name| name.starts_with(prefix))
            .map(str::to_string)
            .collect();

        for name in names {
            let output = self
                .kubectl(&[
                    "delete",
                    "pod",
                    &name,
                    "-n",
                    &self.config.namespace,
                    "--ignore-not-found",
                ])
                .await?;
            if !output.status.success() {
                tracing::warn!(
                    pod = %name,
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "Failed to delete leftover pod"
                );
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ClusterExecutor for KubectlExecutor {
    async fn submit(&self, job_id: &str) -> Result<()> {
        let manifest = self.render_manifest(job_id);
        tracing::info!(job_id, workload = %workload_name(job_id), "Submitting workload");

        let mut child = Command::new(&self.config.kubectl_path)
            .args(["apply", "-n", &self.config.namespace, "-f", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(manifest.as_bytes()).await?;
        }
        let output = child.wait_with_output().await?;

        if !output.status.success() {
            return Err(OrchestratorError::Cluster(format!(
                "workload submission failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    async fn teardown(&self, job_id: &str) -> Result<()> {
        let name = workload_name(job_id);
        tracing::info!(job_id, workload = %name, "Tearing down workload");

        // Step 1: the workload object. --ignore-not-found keeps a repeat
        // teardown a no-op. A failure here must not skip step 2.
        let workload_result = self
            .kubectl(&[
                "delete",
                "job",
                &name,
                "-n",
                &self.config.namespace,
                "--ignore-not-found",
            ])
            .await
            .and_then(|output| {
                if output.status.success() {
                    Ok(())
                } else {
                    Err(OrchestratorError::Cluster(format!(
                        "workload delete failed: {}",
                        String::from_utf8_lossy(&output.stderr).trim()
                    )))
                }
            });

        // Step 2: leftover execution units by name prefix.
        let pods_result = self.delete_pods_by_prefix(&name).await;

        workload_result.and(pods_result)
    }

    async fn list_active(&self) -> Result<Vec<String>> {
        let output = self
            .kubectl(&["get", "jobs", "-n", &self.config.namespace, "-o", "json"])
            .await?;
        if !output.status.success() {
            return Err(OrchestratorError::Cluster(format!(
                "workload listing failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let parsed: serde_json::Value = serde_json::from_slice(&output.stdout)?;
        let active = parsed["items"]
            .as_array()
            .into_iter()
            .flatten()
            .filter(|item| item["status"]["active"].as_i64().unwrap_or(0) > 0)
            .filter_map(|item| item["metadata"]["name"].as_str())
            .filter(|name| name.starts_with(WORKLOAD_PREFIX))
            .map(str::to_string)
            .collect();
        Ok(active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_fills_all_placeholders() {
        let executor = KubectlExecutor::new(ClusterConfig {
            namespace: "indexing".to_string(),
            image: "registry.local/indexflow:1.2".to_string(),
            service_account: "indexer-sa".to_string(),
            kubectl_path: "kubectl".to_string(),
        });
        let manifest = executor.render_manifest("my-index");

        assert!(manifest.contains("name: indexing-job-my-index"));
        assert!(manifest.contains("namespace: indexing"));
        assert!(manifest.contains("serviceAccountName: indexer-sa"));
        assert!(manifest.contains("image: registry.local/indexflow:1.2"));
        assert!(manifest.contains(r#"args: ["job", "run", "my-index"]"#));
        assert!(!manifest.contains("{{"));
    }
}
