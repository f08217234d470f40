//! Specialist handlers and the shared per-file processing engine.
//!
//! One handler per modality, all implementing [`QueryHandler`]. A handler never
//! returns an error from `process`: adapter failures become per-file `error`
//! outcomes (or degraded local outcomes when the fallback flag is on), and one
//! file's failure never aborts its siblings.

mod audio;
mod document;
mod image;
mod video;

pub use audio::AudioHandler;
pub use document::DocumentHandler;
pub use image::ImageHandler;
pub use video::VideoHandler;

use crate::backend::{BackendClient, ProcessingResponse};
use crate::classify::HandlerKind;
use crate::config::get_config;
use crate::query::{FileDescriptor, QueryRequest, truncate_chars};
use async_trait::async_trait;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;

/// How many similarity matches are folded into an enriched analysis.
const SIMILAR_LIMIT: usize = 3;

/// Terminal state of a single file within a handler run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// The backend (or local fallback) produced an analysis.
    Processed,
    /// Processing failed; the `error` field says why.
    Error,
    /// The file is outside this handler's modality.
    Skipped,
}

/// Immutable record of what happened to one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOutcome {
    /// Original filename.
    pub filename: String,
    /// MIME type the file was submitted with.
    pub mime_type: String,
    /// Terminal status for this file.
    pub status: FileStatus,
    /// Opaque analysis payload from the backend, when processing succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Value>,
    /// Short human-readable note about the outcome.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    /// Identifier assigned by `store-analysis`, when embeddings were stored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_id: Option<String>,
    /// Failure description when `status` is `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Counters and timing attached to every handler result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerMetadata {
    /// Wall-clock processing time in milliseconds.
    pub processing_ms: u64,
    /// Files that produced an analysis.
    pub processed: usize,
    /// Files that failed.
    pub failed: usize,
    /// Files outside the handler's modality.
    pub skipped: usize,
}

impl HandlerMetadata {
    /// Metadata for a run that touched no files.
    pub fn empty(elapsed: Duration) -> Self {
        Self {
            processing_ms: elapsed.as_millis() as u64,
            processed: 0,
            failed: 0,
            skipped: 0,
        }
    }

    pub(crate) fn summarize(elapsed: Duration, outcomes: &[FileOutcome]) -> Self {
        let count =
            |status: FileStatus| outcomes.iter().filter(|o| o.status == status).count();
        Self {
            processing_ms: elapsed.as_millis() as u64,
            processed: count(FileStatus::Processed),
            failed: count(FileStatus::Error),
            skipped: count(FileStatus::Skipped),
        }
    }
}

/// What a handler can do, advertised through the capability catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityDescriptor {
    /// Handler name as it appears in routing records.
    pub name: String,
    /// Modality this handler serves.
    pub modality: HandlerKind,
    /// MIME types or type patterns the handler accepts.
    pub formats: Vec<String>,
    /// Operation names forwarded to the processing backend.
    pub operations: Vec<String>,
    /// Feature flags (backend processing, local fallback, embedding store, ...).
    pub features: Vec<String>,
    /// Per-file size ceiling in bytes.
    pub max_file_bytes: u64,
}

/// Everything a handler produced for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerResult {
    /// False only when every attempted file failed.
    pub success: bool,
    /// Aggregate human-readable response.
    pub response: String,
    /// Per-file outcomes, one per submitted file, in submission order.
    pub files: Vec<FileOutcome>,
    /// Capability snapshot of the handler that ran.
    pub capabilities: CapabilityDescriptor,
    /// Counters and timing for the run.
    pub metadata: HandlerMetadata,
    /// Aggregate failure description, when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Knobs shared by every specialist handler.
#[derive(Debug, Clone, Copy)]
pub struct HandlerSettings {
    /// Degrade to local metadata-only processing when the backend is down.
    pub local_fallback: bool,
    /// Per-file size ceiling advertised in capability descriptors.
    pub max_file_bytes: u64,
}

impl HandlerSettings {
    /// Read the handler knobs from global configuration.
    pub fn from_config() -> Self {
        let config = get_config();
        Self {
            local_fallback: config.local_fallback_enabled,
            max_file_bytes: config.max_upload_bytes,
        }
    }
}

/// Interface every modality specialist implements.
#[async_trait]
pub trait QueryHandler: Send + Sync {
    /// Registry key for this handler.
    fn kind(&self) -> HandlerKind;

    /// Handler name as it appears in routing records.
    fn name(&self) -> &'static str {
        crate::routing::handler_name(self.kind())
    }

    /// Static capability descriptor.
    fn capabilities(&self) -> CapabilityDescriptor;

    /// Whether the handler can currently take work.
    async fn check_available(&self) -> bool;

    /// Process a request. Infallible by contract: every failure is absorbed
    /// into per-file outcomes or the result's error field.
    async fn process(&self, request: &QueryRequest) -> HandlerResult;
}

/// Which MIME types a specialist claims.
pub(crate) enum MimeAcceptance {
    /// A single top-level MIME class such as `image`.
    Class(&'static str),
    /// Everything that is not image, video, or audio.
    NonAudiovisual,
}

impl MimeAcceptance {
    pub(crate) fn accepts(&self, file: &FileDescriptor) -> bool {
        match self {
            Self::Class(class) => file.is_mime_class(class),
            Self::NonAudiovisual => {
                !["image", "video", "audio"]
                    .iter()
                    .any(|class| file.is_mime_class(class))
            }
        }
    }
}

/// Shared per-file engine the four specialists delegate to.
pub(crate) struct Specialist {
    pub(crate) backend: BackendClient,
    pub(crate) kind: HandlerKind,
    pub(crate) operations: &'static [&'static str],
    pub(crate) acceptance: MimeAcceptance,
    pub(crate) settings: HandlerSettings,
    pub(crate) store_embeddings: bool,
    pub(crate) enrich_similar: bool,
}

impl Specialist {
    /// Process every file concurrently; outcomes keep submission order.
    pub(crate) async fn run(&self, request: &QueryRequest) -> (Vec<FileOutcome>, HandlerMetadata) {
        let started = std::time::Instant::now();
        let outcomes = join_all(request.files.iter().map(|file| self.process_one(file))).await;
        let metadata = HandlerMetadata::summarize(started.elapsed(), &outcomes);
        (outcomes, metadata)
    }

    async fn process_one(&self, file: &FileDescriptor) -> FileOutcome {
        if !self.acceptance.accepts(file) {
            return FileOutcome {
                filename: file.filename.clone(),
                mime_type: file.mime_type.clone(),
                status: FileStatus::Skipped,
                analysis: None,
                excerpt: Some(format!(
                    "{} is outside the {} handler's modality",
                    file.filename, self.kind
                )),
                storage_id: None,
                error: None,
            };
        }

        match self.backend.process_file(file, self.operations).await {
            Ok(response) => self.complete_processed(file, response).await,
            Err(error) if self.settings.local_fallback => {
                tracing::warn!(
                    file = %file.filename,
                    error = %error,
                    "Backend unavailable; degrading to local metadata"
                );
                FileOutcome {
                    filename: file.filename.clone(),
                    mime_type: file.mime_type.clone(),
                    status: FileStatus::Processed,
                    analysis: Some(json!({
                        "mode": "local",
                        "filename": file.filename,
                        "mimeType": file.mime_type,
                        "sizeBytes": file.size_bytes,
                    })),
                    excerpt: Some(format!(
                        "Recorded metadata for {} locally; backend unavailable",
                        file.filename
                    )),
                    storage_id: None,
                    error: None,
                }
            }
            Err(error) => {
                tracing::error!(
                    file = %file.filename,
                    error = %error,
                    "File processing failed"
                );
                FileOutcome {
                    filename: file.filename.clone(),
                    mime_type: file.mime_type.clone(),
                    status: FileStatus::Error,
                    analysis: None,
                    excerpt: None,
                    storage_id: None,
                    error: Some(error.to_string()),
                }
            }
        }
    }

    async fn complete_processed(
        &self,
        file: &FileDescriptor,
        response: ProcessingResponse,
    ) -> FileOutcome {
        let ProcessingResponse {
            mut analysis,
            embeddings,
        } = response;

        let mut storage_id = None;
        if let Some(embeddings) = embeddings.as_deref().filter(|e| !e.is_empty()) {
            if self.store_embeddings {
                match self.backend.store_analysis(&analysis, embeddings).await {
                    Ok(id) => storage_id = Some(id),
                    Err(error) => tracing::warn!(
                        file = %file.filename,
                        error = %error,
                        "Failed to store analysis; continuing without a storage id"
                    ),
                }
            }
            if self.enrich_similar {
                let matches = self.backend.search_similar(embeddings, SIMILAR_LIMIT).await;
                if !matches.is_empty()
                    && let Some(object) = analysis.as_object_mut()
                {
                    object.insert("related".into(), json!(matches));
                }
            }
        }

        let excerpt = excerpt_from_analysis(&analysis)
            .unwrap_or_else(|| format!("Processed {}", file.filename));
        FileOutcome {
            filename: file.filename.clone(),
            mime_type: file.mime_type.clone(),
            status: FileStatus::Processed,
            analysis: Some(analysis),
            excerpt: Some(excerpt),
            storage_id,
            error: None,
        }
    }

    /// A handler with local fallback enabled stays available through backend outages.
    pub(crate) async fn available(&self) -> bool {
        self.settings.local_fallback || self.backend.health().await
    }

    pub(crate) fn descriptor(
        &self,
        name: &'static str,
        formats: &[&str],
        extra_features: &[&str],
    ) -> CapabilityDescriptor {
        let mut features = vec!["backend-processing".to_string()];
        if self.settings.local_fallback {
            features.push("local-fallback".into());
        }
        if self.store_embeddings {
            features.push("embedding-store".into());
        }
        if self.enrich_similar {
            features.push("similarity-enrichment".into());
        }
        features.extend(extra_features.iter().map(|feature| feature.to_string()));

        CapabilityDescriptor {
            name: name.to_string(),
            modality: self.kind,
            formats: formats.iter().map(|format| format.to_string()).collect(),
            operations: self
                .operations
                .iter()
                .map(|operation| operation.to_string())
                .collect(),
            features,
            max_file_bytes: self.settings.max_file_bytes,
        }
    }

    /// Assemble the final result from outcomes and a handler-written response.
    pub(crate) fn finish(
        &self,
        capabilities: CapabilityDescriptor,
        response: String,
        files: Vec<FileOutcome>,
        metadata: HandlerMetadata,
    ) -> HandlerResult {
        let (success, error) = resolve_success(&files);
        HandlerResult {
            success,
            response,
            files,
            capabilities,
            metadata,
            error,
        }
    }
}

/// A run fails only when every attempted file errored.
pub(crate) fn resolve_success(outcomes: &[FileOutcome]) -> (bool, Option<String>) {
    let errored = outcomes
        .iter()
        .filter(|o| o.status == FileStatus::Error)
        .count();
    let processed = outcomes
        .iter()
        .filter(|o| o.status == FileStatus::Processed)
        .count();

    if errored == 0 || processed > 0 {
        (true, None)
    } else {
        (false, Some(format!("All {errored} file(s) failed to process")))
    }
}

/// Build the aggregate response text from per-file outcomes.
pub(crate) fn compose_response(noun: &str, outcomes: &[FileOutcome]) -> String {
    let processed = outcomes
        .iter()
        .filter(|o| o.status == FileStatus::Processed)
        .count();
    let failed = outcomes
        .iter()
        .filter(|o| o.status == FileStatus::Error)
        .count();
    let skipped = outcomes
        .iter()
        .filter(|o| o.status == FileStatus::Skipped)
        .count();

    let mut response = format!("Processed {processed} of {} {noun} file(s)", outcomes.len());
    if failed > 0 {
        response.push_str(&format!("; {failed} failed"));
    }
    if skipped > 0 {
        response.push_str(&format!("; {skipped} outside this handler's modality"));
    }
    response.push('.');

    if let Some(excerpt) = outcomes
        .iter()
        .find(|o| o.status == FileStatus::Processed)
        .and_then(|o| o.excerpt.as_deref())
    {
        response.push(' ');
        response.push_str(excerpt);
    }
    response
}

/// Pull a short quotable excerpt out of an analysis payload.
pub(crate) fn excerpt_from_analysis(analysis: &Value) -> Option<String> {
    for key in ["summary", "text", "transcript", "description"] {
        if let Some(text) = analysis.get(key).and_then(Value::as_str) {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                return Some(truncate_chars(trimmed, 200));
            }
        }
    }
    None
}
