//! Release Operations Adapter: a thin contract-level wrapper around an
//! external `helm`-compatible CLI. This crate never re-implements chart
//! rendering or release storage; it shells out and parses JSON output.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum ReleaseOpsError {
    #[error("release CLI not found on PATH: {0}")]
    CliMissing(String),
    #[error("release CLI exited with status {status}: {stderr}")]
    CliFailed { status: i32, stderr: String },
    #[error("failed to parse release CLI output: {0}")]
    BadOutput(#[from] serde_json::Error),
    #[error("io error launching release CLI: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ReleaseSummary {
    pub name: String,
    pub namespace: String,
    pub revision: u32,
    pub status: String,
    pub chart: String,
    pub app_version: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ReleaseHistoryEntry {
    pub revision: u32,
    pub status: String,
    pub description: String,
}

#[derive(Serialize)]
pub struct ReleaseOutcome {
    pub ok: bool,
    pub message: String,
}

#[async_trait]
pub trait ReleaseOps: Send + Sync {
    async fn list(&self, namespace: &str) -> Result<Vec<ReleaseSummary>, ReleaseOpsError>;
    async fn get(&self, namespace: &str, name: &str) -> Result<ReleaseSummary, ReleaseOpsError>;
    async fn manifest(&self, namespace: &str, name: &str) -> Result<String, ReleaseOpsError>;
    async fn values(&self, namespace: &str, name: &str) -> Result<serde_json::Value, ReleaseOpsError>;
    async fn diff(&self, namespace: &str, name: &str, chart: &str, values: &serde_json::Value) -> Result<String, ReleaseOpsError>;
    async fn history(&self, namespace: &str, name: &str) -> Result<Vec<ReleaseHistoryEntry>, ReleaseOpsError>;
    async fn rollback(&self, namespace: &str, name: &str, revision: u32) -> Result<ReleaseOutcome, ReleaseOpsError>;
    async fn upgrade(&self, namespace: &str, name: &str, chart: &str, values: &serde_json::Value) -> Result<ReleaseOutcome, ReleaseOpsError>;
    async fn upgrade_check(&self, namespace: &str, name: &str, chart: &str, values: &serde_json::Value) -> Result<String, ReleaseOpsError>;
    async fn uninstall(&self, namespace: &str, name: &str) -> Result<ReleaseOutcome, ReleaseOpsError>;
}

/// Shells out to the binary named by `binary` (normally `"helm"`),
/// parsing its JSON output where the CLI supports `-o json`.
pub struct CliReleaseOps {
    binary: String,
}

impl CliReleaseOps {
    pub fn new(binary: String) -> CliReleaseOps {
        CliReleaseOps { binary }
    }

    async fn run(&self, args: &[&str]) -> Result<String, ReleaseOpsError> {
        let output = Command::new(&self.binary)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ReleaseOpsError::CliMissing(self.binary.clone())
                } else {
                    ReleaseOpsError::Io(e)
                }
            })?;

        if !output.status.success() {
            return Err(ReleaseOpsError::CliFailed {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl ReleaseOps for CliReleaseOps {
    async fn list(&self, namespace: &str) -> Result<Vec<ReleaseSummary>, ReleaseOpsError> {
        let out = self.run(&["list", "-n", namespace, "-o", "json"]).await?;
        Ok(serde_json::from_str(&out)?)
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<ReleaseSummary, ReleaseOpsError> {
        let out = self.run(&["status", name, "-n", namespace, "-o", "json"]).await?;
        Ok(serde_json::from_str(&out)?)
    }

    async fn manifest(&self, namespace: &str, name: &str) -> Result<String, ReleaseOpsError> {
        self.run(&["get", "manifest", name, "-n", namespace]).await
    }

    async fn values(&self, namespace: &str, name: &str) -> Result<serde_json::Value, ReleaseOpsError> {
        let out = self.run(&["get", "values", name, "-n", namespace, "-o", "json"]).await?;
        Ok(serde_json::from_str(&out)?)
    }

    async fn diff(
        &self,
        namespace: &str,
        name: &str,
        chart: &str,
        values: &serde_json::Value,
    ) -> Result<String, ReleaseOpsError> {
        let values_file = write_values_tempfile(values)?;
        self.run(&[
            "diff",
            "upgrade",
            name,
            chart,
            "-n",
            namespace,
            "-f",
            values_file.to_str().unwrap_or_default(),
        ])
        .await
    }

    async fn history(&self, namespace: &str, name: &str) -> Result<Vec<ReleaseHistoryEntry>, ReleaseOpsError> {
        let out = self.run(&["history", name, "-n", namespace, "-o", "json"]).await?;
        Ok(serde_json::from_str(&out)?)
    }

    async fn rollback(&self, namespace: &str, name: &str, revision: u32) -> Result<ReleaseOutcome, ReleaseOpsError> {
        self.run(&["rollback", name, &revision.to_string(), "-n", namespace]).await?;
        Ok(ReleaseOutcome {
            ok: true,
            message: format!("rolled back {name} to revision {revision}"),
        })
    }

    async fn upgrade(
        &self,
        namespace: &str,
        name: &str,
        chart: &str,
        values: &serde_json::Value,
    ) -> Result<ReleaseOutcome, ReleaseOpsError> {
        let values_file = write_values_tempfile(values)?;
        self.run(&[
            "upgrade",
            "--install",
            name,
            chart,
            "-n",
            namespace,
            "-f",
            values_file.to_str().unwrap_or_default(),
        ])
        .await?;
        Ok(ReleaseOutcome {
            ok: true,
            message: format!("upgraded {name}"),
        })
    }

    async fn upgrade_check(
        &self,
        namespace: &str,
        name: &str,
        chart: &str,
        values: &serde_json::Value,
    ) -> Result<String, ReleaseOpsError> {
        let values_file = write_values_tempfile(values)?;
        self.run(&[
            "upgrade",
            name,
            chart,
            "-n",
            namespace,
            "-f",
            values_file.to_str().unwrap_or_default(),
            "--dry-run",
        ])
        .await
    }

    async fn uninstall(&self, namespace: &str, name: &str) -> Result<ReleaseOutcome, ReleaseOpsError> {
        self.run(&["uninstall", name, "-n", namespace]).await?;
        Ok(ReleaseOutcome {
            ok: true,
            message: format!("uninstalled {name}"),
        })
    }
}

fn write_values_tempfile(values: &serde_json::Value) -> Result<std::path::PathBuf, ReleaseOpsError> {
    let path = std::env::temp_dir().join(format!("kviewd-values-{}.json", uuid::Uuid::new_v4()));
    std::fs::write(&path, serde_json::to_vec(values).unwrap_or_default())?;
    Ok(path)
}
