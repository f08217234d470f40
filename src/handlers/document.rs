//! Document specialist.
//!
//! Owns everything that is not audiovisual, including text-only queries that
//! carry no files at all.

use super::{
    CapabilityDescriptor, HandlerMetadata, HandlerResult, HandlerSettings, MimeAcceptance,
    QueryHandler, Specialist, compose_response,
};
use crate::backend::{BackendClient, BackendError};
use crate::classify::HandlerKind;
use crate::query::{QueryRequest, truncate_chars};
use async_trait::async_trait;
use std::time::Instant;

const OPERATIONS: &[&str] = &["extract_text", "summarize", "analyze_structure"];
const FORMATS: &[&str] = &["application/*", "text/*"];

/// Specialist for documents and text-only queries.
pub struct DocumentHandler {
    engine: Specialist,
}

impl DocumentHandler {
    /// Build the handler against the configured document backend.
    pub fn from_config() -> Result<Self, BackendError> {
        Ok(Self::with_backend(
            BackendClient::for_modality(HandlerKind::Document)?,
            HandlerSettings::from_config(),
        ))
    }

    /// Build the handler around an explicit backend client.
    pub fn with_backend(backend: BackendClient, settings: HandlerSettings) -> Self {
        Self {
            engine: Specialist {
                backend,
                kind: HandlerKind::Document,
                operations: OPERATIONS,
                acceptance: MimeAcceptance::NonAudiovisual,
                settings,
                store_embeddings: false,
                enrich_similar: false,
            },
        }
    }
}

#[async_trait]
impl QueryHandler for DocumentHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Document
    }

    fn capabilities(&self) -> CapabilityDescriptor {
        self.engine.descriptor(
            self.name(),
            FORMATS,
            &["text-extraction", "summarization", "structure-analysis", "text-queries"],
        )
    }

    async fn check_available(&self) -> bool {
        self.engine.available().await
    }

    async fn process(&self, request: &QueryRequest) -> HandlerResult {
        if request.files.is_empty() {
            let started = Instant::now();
            let response = match request.text.as_deref().map(str::trim) {
                Some(text) if !text.is_empty() => format!(
                    "Received your text query: \"{}\". No files were attached, so the \
                     query was handled as plain text.",
                    truncate_chars(text, 200)
                ),
                // Submit validation rejects empty queries; this stays for callers
                // that bypass the manager.
                _ => "Received an empty query with no files attached.".to_string(),
            };
            return self.engine.finish(
                self.capabilities(),
                response,
                Vec::new(),
                HandlerMetadata::empty(started.elapsed()),
            );
        }

        let (files, metadata) = self.engine.run(request).await;
        let response = compose_response("document", &files);
        self.engine
            .finish(self.capabilities(), response, files, metadata)
    }
}
