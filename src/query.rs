//! Query domain types shared across the dispatch pipeline.

use std::path::PathBuf;
use time::OffsetDateTime;

/// A single uploaded file staged on disk and awaiting processing.
#[derive(Debug, Clone)]
pub struct FileDescriptor {
    /// Original filename supplied by the caller.
    pub filename: String,
    /// MIME type reported for the upload.
    pub mime_type: String,
    /// Size of the staged file in bytes.
    pub size_bytes: u64,
    /// Server-side staging path; deleted once processing finishes.
    pub storage_path: PathBuf,
}

impl FileDescriptor {
    /// True when the descriptor's MIME type falls under the given top-level type.
    pub fn is_mime_class(&self, class: &str) -> bool {
        self.mime_type
            .split('/')
            .next()
            .is_some_and(|top| top.eq_ignore_ascii_case(class))
    }
}

/// An accepted submission, immutable for the lifetime of its job.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    /// Identifier of the submitting user; jobs are scoped to this owner.
    pub user_id: String,
    /// Free-text portion of the query, if any.
    pub text: Option<String>,
    /// Files staged for processing.
    pub files: Vec<FileDescriptor>,
    /// Submission timestamp in RFC 3339.
    pub submitted_at: String,
    /// Where the request entered the system (currently always the HTTP surface).
    pub origin: String,
}

impl QueryRequest {
    /// Build a request stamped with the current time.
    pub fn new(user_id: impl Into<String>, text: Option<String>, files: Vec<FileDescriptor>) -> Self {
        Self {
            user_id: user_id.into(),
            text,
            files,
            submitted_at: current_timestamp_rfc3339(),
            origin: "http".to_string(),
        }
    }

    /// True when the query carries non-whitespace text.
    pub fn has_text(&self) -> bool {
        self.text
            .as_deref()
            .is_some_and(|text| !text.trim().is_empty())
    }

    /// Number of files attached to the query.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

/// Current timestamp formatted for wire payloads and job records.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Cap a string at `max` characters, appending an ellipsis when truncated.
///
/// Counts characters rather than bytes so multi-byte text never splits mid
/// code point.
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push('…');
    out
}
