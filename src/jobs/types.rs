//! Job records and their caller-facing projections.

use crate::orchestrator::OrchestratedResult;
use crate::query::{FileDescriptor, truncate_chars};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Characters kept when truncating previews for history payloads.
pub(crate) const PREVIEW_CHARS: usize = 200;

/// Lifecycle state of a job. Transitions are monotonic: PROCESSING may move
/// to COMPLETED or ERROR exactly once; both terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    /// Dispatched, result not yet recorded.
    Processing,
    /// Finished with a recorded result.
    Completed,
    /// Finished with a failure.
    Error,
}

impl JobStatus {
    /// True for COMPLETED and ERROR.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Processing)
    }
}

/// One tracked unit of asynchronous work.
#[derive(Debug, Clone)]
pub struct Job {
    /// Opaque, caller-unguessable identifier (UUID v4).
    pub id: String,
    /// Identity of the submitting user; all reads are scoped to this owner.
    pub owner: String,
    /// Current lifecycle state.
    pub status: JobStatus,
    /// Coarse completion hint shown while the job is processing.
    pub estimated_time: &'static str,
    /// When the job was created.
    pub created_at: OffsetDateTime,
    /// When the job reached a terminal state.
    pub completed_at: Option<OffsetDateTime>,
    /// Orchestrated result, present once COMPLETED.
    pub result: Option<OrchestratedResult>,
    /// Failure description, present once ERROR.
    pub error: Option<String>,
}

impl Job {
    /// Fresh job in the PROCESSING state.
    pub fn new(id: String, owner: String, estimated_time: &'static str) -> Self {
        Self {
            id,
            owner,
            status: JobStatus::Processing,
            estimated_time,
            created_at: OffsetDateTime::now_utc(),
            completed_at: None,
            result: None,
            error: None,
        }
    }
}

/// Synchronous receipt returned from a successful submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceipt {
    /// Identifier to poll with.
    pub query_id: String,
    /// Coarse completion hint, for UX only.
    pub estimated_time: &'static str,
}

/// Rejections raised before a job is created.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Neither text nor files were provided.
    #[error("Query must include text or at least one file")]
    EmptySubmission,
    /// More files than the configured ceiling.
    #[error("Too many files: at most {limit} per query")]
    TooManyFiles {
        /// Configured maximum file count.
        limit: usize,
    },
    /// A single file exceeded the size ceiling.
    #[error("File {filename} exceeds the {limit}-byte size limit")]
    FileTooLarge {
        /// Offending filename.
        filename: String,
        /// Configured per-file byte ceiling.
        limit: u64,
    },
}

/// Failures when reading or deleting a job record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobAccessError {
    /// No job with that identifier.
    #[error("Query not found")]
    NotFound,
    /// The job exists but belongs to another user.
    #[error("Access denied")]
    Forbidden,
}

/// Caller-safe projection of one job, served from status lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    /// Job identifier.
    pub query_id: String,
    /// Current lifecycle state.
    pub status: JobStatus,
    /// Completion hint, present while PROCESSING.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<String>,
    /// Full result, present once COMPLETED.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<OrchestratedResult>,
    /// Failure description, present once ERROR.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Creation timestamp, RFC 3339.
    pub created_at: String,
    /// Completion timestamp, RFC 3339, once terminal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

impl JobStatusView {
    /// Project a job into its owner-facing view. Internal fields stay behind.
    pub fn from_job(job: &Job) -> Self {
        Self {
            query_id: job.id.clone(),
            status: job.status,
            estimated_time: (job.status == JobStatus::Processing)
                .then(|| job.estimated_time.to_string()),
            result: job.result.clone(),
            error: job.error.clone(),
            created_at: rfc3339(job.created_at),
            completed_at: job.completed_at.map(rfc3339),
        }
    }
}

/// Bounded history entry; previews are truncated to keep payloads small.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    /// Job identifier.
    pub query_id: String,
    /// Current lifecycle state.
    pub status: JobStatus,
    /// Handler that processed the query, once known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_used: Option<String>,
    /// Truncated response or error preview.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    /// Number of files the query carried, once classified.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_count: Option<usize>,
    /// Creation timestamp, RFC 3339.
    pub created_at: String,
}

impl JobSummary {
    /// Project a job into a bounded history entry.
    pub fn from_job(job: &Job) -> Self {
        let preview = match job.status {
            JobStatus::Processing => None,
            JobStatus::Completed => job
                .result
                .as_ref()
                .map(|result| truncate_chars(&result.response, PREVIEW_CHARS)),
            JobStatus::Error => job
                .error
                .as_deref()
                .map(|error| truncate_chars(error, PREVIEW_CHARS)),
        };
        Self {
            query_id: job.id.clone(),
            status: job.status,
            agent_used: job.result.as_ref().map(|result| result.agent_used.clone()),
            preview,
            file_count: job
                .result
                .as_ref()
                .map(|result| result.classification.file_count),
            created_at: rfc3339(job.created_at),
        }
    }
}

/// Coarse completion hint derived from the file set, fixed precedence.
pub fn estimate_time(files: &[FileDescriptor]) -> &'static str {
    let images = files
        .iter()
        .filter(|file| file.is_mime_class("image"))
        .count();
    if files.iter().any(|file| file.is_mime_class("video")) {
        "30-120 seconds"
    } else if files.iter().any(|file| file.is_mime_class("audio")) {
        "15-60 seconds"
    } else if images > 3 {
        "20-90 seconds"
    } else if files.len() > 5 {
        "15-45 seconds"
    } else if !files.is_empty() {
        "10-30 seconds"
    } else {
        "5-15 seconds"
    }
}

pub(crate) fn rfc3339(timestamp: OffsetDateTime) -> String {
    timestamp
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn file(mime: &str) -> FileDescriptor {
        FileDescriptor {
            filename: "sample".into(),
            mime_type: mime.into(),
            size_bytes: 1,
            storage_path: PathBuf::from("/tmp/sample"),
        }
    }

    #[test]
    fn estimate_precedence_video_beats_everything() {
        let files = vec![file("video/mp4"), file("audio/mpeg"), file("image/png")];
        assert_eq!(estimate_time(&files), "30-120 seconds");
    }

    #[test]
    fn estimate_covers_each_branch() {
        assert_eq!(estimate_time(&[file("audio/mpeg")]), "15-60 seconds");
        assert_eq!(estimate_time(&vec![file("image/png"); 4]), "20-90 seconds");
        assert_eq!(
            estimate_time(&vec![file("application/pdf"); 6]),
            "15-45 seconds"
        );
        assert_eq!(estimate_time(&[file("application/pdf")]), "10-30 seconds");
        assert_eq!(estimate_time(&[]), "5-15 seconds");
    }

    #[test]
    fn three_images_is_still_the_small_batch_estimate() {
        assert_eq!(estimate_time(&vec![file("image/png"); 3]), "10-30 seconds");
    }

    #[test]
    fn processing_view_hides_result_fields() {
        let job = Job::new("job-1".into(), "user-1".into(), "10-30 seconds");
        let view = JobStatusView::from_job(&job);

        assert_eq!(view.status, JobStatus::Processing);
        assert_eq!(view.estimated_time.as_deref(), Some("10-30 seconds"));
        assert!(view.result.is_none());
        assert!(view.error.is_none());
        assert!(view.completed_at.is_none());
    }

    #[test]
    fn error_summary_previews_the_error_text() {
        let mut job = Job::new("job-1".into(), "user-1".into(), "5-15 seconds");
        job.status = JobStatus::Error;
        job.error = Some("x".repeat(500));

        let summary = JobSummary::from_job(&job);
        let preview = summary.preview.expect("preview");
        assert!(preview.chars().count() <= PREVIEW_CHARS + 1);
        assert!(preview.ends_with('…'));
    }
}
