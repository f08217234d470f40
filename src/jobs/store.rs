//! Volatile job storage.
//!
//! One struct owns the in-memory map; every read and write goes through this
//! narrow API. Swapping in a durable store means reimplementing these methods,
//! nothing else.

use super::types::{Job, JobAccessError, JobStatus, JobStatusView, JobSummary};
use crate::orchestrator::OrchestratedResult;
use std::collections::HashMap;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::RwLock;

/// Process-lifetime map of jobs keyed by identifier.
#[derive(Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<String, Job>>,
}

impl JobStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly created job.
    pub async fn insert(&self, job: Job) {
        let mut jobs = self.jobs.write().await;
        jobs.insert(job.id.clone(), job);
    }

    /// Flip a PROCESSING job to COMPLETED with its result.
    ///
    /// Returns false (and changes nothing) when the job is unknown or already
    /// terminal; terminal states never regress.
    pub async fn complete(&self, id: &str, result: OrchestratedResult) -> bool {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(id) else {
            tracing::warn!(job_id = id, "Completion recorded for an unknown job");
            return false;
        };
        if job.status.is_terminal() {
            tracing::warn!(job_id = id, status = ?job.status, "Ignored transition on a terminal job");
            return false;
        }
        job.status = JobStatus::Completed;
        job.result = Some(result);
        job.completed_at = Some(OffsetDateTime::now_utc());
        true
    }

    /// Flip a PROCESSING job to ERROR with a failure description.
    ///
    /// Same monotonicity rules as [`complete`](Self::complete).
    pub async fn fail(&self, id: &str, error: String) -> bool {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(id) else {
            tracing::warn!(job_id = id, "Failure recorded for an unknown job");
            return false;
        };
        if job.status.is_terminal() {
            tracing::warn!(job_id = id, status = ?job.status, "Ignored transition on a terminal job");
            return false;
        }
        job.status = JobStatus::Error;
        job.error = Some(error);
        job.completed_at = Some(OffsetDateTime::now_utc());
        true
    }

    /// Owner-checked status lookup.
    pub async fn view(&self, id: &str, caller: &str) -> Result<JobStatusView, JobAccessError> {
        let jobs = self.jobs.read().await;
        let job = jobs.get(id).ok_or(JobAccessError::NotFound)?;
        if job.owner != caller {
            return Err(JobAccessError::Forbidden);
        }
        Ok(JobStatusView::from_job(job))
    }

    /// The caller's jobs, newest first, capped at `limit`.
    pub async fn history(&self, caller: &str, limit: usize) -> Vec<JobSummary> {
        let jobs = self.jobs.read().await;
        let mut own: Vec<&Job> = jobs.values().filter(|job| job.owner == caller).collect();
        own.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        own.into_iter()
            .take(limit)
            .map(JobSummary::from_job)
            .collect()
    }

    /// Owner-checked removal of a job record.
    pub async fn remove(&self, id: &str, caller: &str) -> Result<(), JobAccessError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get(id).ok_or(JobAccessError::NotFound)?;
        if job.owner != caller {
            return Err(JobAccessError::Forbidden);
        }
        jobs.remove(id);
        Ok(())
    }

    /// Drop every job older than the retention window, regardless of status.
    /// Returns the number removed.
    pub async fn sweep_expired(&self, retention: Duration) -> usize {
        let cutoff = OffsetDateTime::now_utc() - retention;
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| job.created_at > cutoff);
        before - jobs.len()
    }

    /// Number of jobs currently held.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// True when the store holds no jobs.
    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}
