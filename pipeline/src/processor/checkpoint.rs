use chrono::{DateTime, Utc};
use common::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::storage::join_key;
use crate::storage::s3::ObjectStorage;
use crate::utils::paths::job_timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Succeeded,
    Failed,
}

/// One stage execution as recorded under the jobs prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRun {
    pub job_name: String,
    pub run_id: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub metrics: BTreeMap<String, u64>,
    pub outputs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_sha256: Option<String>,
}

impl JobRun {
    pub fn start(job_name: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            job_name: job_name.to_string(),
            run_id: Uuid::new_v4().to_string(),
            status: RunStatus::Failed,
            started_at,
            finished_at: started_at,
            error: None,
            metrics: BTreeMap::new(),
            outputs: Vec::new(),
            input_sha256: None,
        }
    }

    pub fn metric(&mut self, name: &str, value: usize) {
        self.metrics.insert(name.to_string(), value as u64);
    }

    pub fn succeed(&mut self) {
        self.status = RunStatus::Succeeded;
        self.error = None;
        self.finished_at = Utc::now();
    }

    pub fn fail(&mut self, error: &common::Error) {
        self.status = RunStatus::Failed;
        self.error = Some(error.to_string());
        self.finished_at = Utc::now();
    }
}

pub fn sha256_hex(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Persists run records; the equivalent of committing a job bookmark.
pub struct JobTracker {
    storage: Arc<dyn ObjectStorage>,
    jobs_prefix: String,
}

impl JobTracker {
    pub fn new(storage: Arc<dyn ObjectStorage>, jobs_prefix: &str) -> Self {
        Self {
            storage,
            jobs_prefix: jobs_prefix.to_string(),
        }
    }

    pub fn run_key(&self, run: &JobRun) -> String {
        join_key(
            &self.jobs_prefix,
            &format!(
                "{}/run_{}_{}.json",
                run.job_name,
                job_timestamp(run.started_at),
                run.run_id
            ),
        )
    }

    pub async fn commit(&self, run: &JobRun) -> Result<String> {
        let key = self.run_key(run);
        let body = serde_json::to_vec_pretty(run)?;
        self.storage.put_object(&key, &body).await?;
        info!(job = %run.job_name, status = ?run.status, key = %key, "Job checkpoint written");
        Ok(key)
    }

    /// Commits without letting a checkpoint failure replace the stage outcome.
    pub async fn commit_quietly(&self, run: &JobRun) {
        if let Err(e) = self.commit(run).await {
            error!(job = %run.job_name, error = %e, "Failed to write job checkpoint");
        }
    }

    pub async fn runs(&self, job_name: &str) -> Result<Vec<JobRun>> {
        let prefix = join_key(&self.jobs_prefix, &format!("{}/", job_name));
        let mut keys = self.storage.list_objects(&prefix).await?;
        keys.sort();

        let mut runs = Vec::with_capacity(keys.len());
        for key in keys {
            let body = self.storage.get_object(&key).await?;
            runs.push(serde_json::from_slice(&body)?);
        }
        Ok(runs)
    }
}
