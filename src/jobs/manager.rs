//! Job lifecycle manager: submission, async dispatch, and read paths.
//!
//! Dispatch is fire-and-track: the caller gets a receipt immediately while a
//! spawned task runs the orchestrator. The task can never leave a job stuck —
//! panics are caught and written into the job's ERROR state, and staged upload
//! files are deleted exactly once whatever the outcome.

use super::store::JobStore;
use super::types::{
    Job, JobAccessError, JobStatusView, JobSummary, SubmitError, SubmitReceipt, estimate_time,
};
use crate::config::get_config;
use crate::metrics::{GatewayMetrics, MetricsSnapshot};
use crate::orchestrator::{CapabilityCatalog, HealthReport, Orchestrator};
use crate::query::{FileDescriptor, QueryRequest};
use async_trait::async_trait;
use futures_util::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Submission ceilings enforced before a job is created.
#[derive(Debug, Clone, Copy)]
pub struct SubmitLimits {
    /// Maximum number of files per submission.
    pub max_files: usize,
    /// Maximum size of a single file in bytes.
    pub max_file_bytes: u64,
    /// History entries returned per lookup.
    pub history_limit: usize,
}

impl SubmitLimits {
    /// Read the ceilings from global configuration.
    pub fn from_config() -> Self {
        let config = get_config();
        Self {
            max_files: config.max_upload_files,
            max_file_bytes: config.max_upload_bytes,
            history_limit: config.history_limit,
        }
    }
}

/// Metrics snapshot extended with the live job count.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GatewaySnapshot {
    /// Counter values since startup.
    #[serde(flatten)]
    pub counters: MetricsSnapshot,
    /// Jobs currently held in the store.
    pub active_jobs: usize,
}

/// Service interface the HTTP layer is generic over.
#[async_trait]
pub trait GatewayApi: Send + Sync {
    /// Validate and accept a submission; spawns the dispatch task.
    async fn submit(&self, request: QueryRequest) -> Result<SubmitReceipt, SubmitError>;

    /// Owner-checked job status lookup.
    async fn job_view(&self, id: &str, caller: &str) -> Result<JobStatusView, JobAccessError>;

    /// The caller's own jobs, newest first.
    async fn history(&self, caller: &str) -> Vec<JobSummary>;

    /// Owner-checked job removal.
    async fn delete_job(&self, id: &str, caller: &str) -> Result<(), JobAccessError>;

    /// Aggregated capability catalog.
    fn capabilities(&self) -> CapabilityCatalog;

    /// Per-handler availability probe.
    async fn health(&self) -> HealthReport;

    /// Gateway counters plus the live job count.
    async fn snapshot(&self) -> GatewaySnapshot;
}

/// Owns the job store and drives dispatched work through the orchestrator.
pub struct JobManager {
    store: Arc<JobStore>,
    orchestrator: Arc<Orchestrator>,
    metrics: Arc<GatewayMetrics>,
    limits: SubmitLimits,
}

impl JobManager {
    /// Build a manager around an orchestrator with explicit ceilings.
    pub fn new(orchestrator: Orchestrator, limits: SubmitLimits) -> Self {
        Self {
            store: Arc::new(JobStore::new()),
            orchestrator: Arc::new(orchestrator),
            metrics: Arc::new(GatewayMetrics::new()),
            limits,
        }
    }

    /// Start the periodic retention sweeper.
    pub fn spawn_sweeper(
        &self,
        interval: Duration,
        retention: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = store.sweep_expired(retention).await;
                if removed > 0 {
                    tracing::info!(removed, "Swept expired jobs");
                }
            }
        })
    }

    /// Direct access to the store, for sweeping and tests.
    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    fn validate(&self, request: &QueryRequest) -> Result<(), SubmitError> {
        if !request.has_text() && request.files.is_empty() {
            return Err(SubmitError::EmptySubmission);
        }
        if request.files.len() > self.limits.max_files {
            return Err(SubmitError::TooManyFiles {
                limit: self.limits.max_files,
            });
        }
        if let Some(file) = request
            .files
            .iter()
            .find(|file| file.size_bytes > self.limits.max_file_bytes)
        {
            return Err(SubmitError::FileTooLarge {
                filename: file.filename.clone(),
                limit: self.limits.max_file_bytes,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl GatewayApi for JobManager {
    async fn submit(&self, request: QueryRequest) -> Result<SubmitReceipt, SubmitError> {
        if let Err(error) = self.validate(&request) {
            // Rejected submissions never create a job, but their uploads are
            // already staged and must not leak.
            cleanup_files(&request.files).await;
            return Err(error);
        }

        let id = Uuid::new_v4().to_string();
        let estimated_time = estimate_time(&request.files);
        self.store
            .insert(Job::new(id.clone(), request.user_id.clone(), estimated_time))
            .await;
        self.metrics.record_submission();
        tracing::info!(
            job_id = %id,
            user = %request.user_id,
            files = request.files.len(),
            "Accepted query submission"
        );

        let store = Arc::clone(&self.store);
        let orchestrator = Arc::clone(&self.orchestrator);
        let metrics = Arc::clone(&self.metrics);
        let job_id = id.clone();
        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(orchestrator.handle(&request))
                .catch_unwind()
                .await;
            cleanup_files(&request.files).await;

            match outcome {
                Ok(result) if result.success => {
                    metrics.record_completion(request.files.len() as u64);
                    store.complete(&job_id, result).await;
                }
                Ok(result) => {
                    metrics.record_failure();
                    let error = result
                        .error
                        .clone()
                        .unwrap_or_else(|| "Processing failed".to_string());
                    tracing::warn!(job_id = %job_id, error = %error, "Job finished in error");
                    store.fail(&job_id, error).await;
                }
                Err(_panic) => {
                    metrics.record_failure();
                    tracing::error!(job_id = %job_id, "Dispatch task panicked");
                    store
                        .fail(&job_id, "Internal processing failure".to_string())
                        .await;
                }
            }
        });

        Ok(SubmitReceipt {
            query_id: id,
            estimated_time,
        })
    }

    async fn job_view(&self, id: &str, caller: &str) -> Result<JobStatusView, JobAccessError> {
        self.store.view(id, caller).await
    }

    async fn history(&self, caller: &str) -> Vec<JobSummary> {
        self.store.history(caller, self.limits.history_limit).await
    }

    async fn delete_job(&self, id: &str, caller: &str) -> Result<(), JobAccessError> {
        self.store.remove(id, caller).await
    }

    fn capabilities(&self) -> CapabilityCatalog {
        self.orchestrator.aggregate_capabilities()
    }

    async fn health(&self) -> HealthReport {
        self.orchestrator.health_check().await
    }

    async fn snapshot(&self) -> GatewaySnapshot {
        GatewaySnapshot {
            counters: self.metrics.snapshot(),
            active_jobs: self.store.len().await,
        }
    }
}

/// Delete staged upload files. Failures are logged and never propagate.
async fn cleanup_files(files: &[FileDescriptor]) {
    for file in files {
        if let Err(error) = tokio::fs::remove_file(&file.storage_path).await {
            tracing::warn!(
                path = %file.storage_path.display(),
                error = %error,
                "Failed to delete staged upload"
            );
        } else {
            tracing::debug!(path = %file.storage_path.display(), "Deleted staged upload");
        }
    }
}
