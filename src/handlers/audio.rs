//! Audio specialist.
//!
//! Transcripts that arrive with embeddings are stored so they can be found
//! later by similarity search on the backend side; the handler itself does
//! not search.

use super::{
    CapabilityDescriptor, HandlerResult, HandlerSettings, MimeAcceptance, QueryHandler, Specialist,
    compose_response,
};
use crate::backend::{BackendClient, BackendError};
use crate::classify::HandlerKind;
use crate::query::QueryRequest;
use async_trait::async_trait;

const OPERATIONS: &[&str] = &["transcribe", "analyze", "extract_features"];
const FORMATS: &[&str] = &["audio/*"];

/// Specialist for audio content.
pub struct AudioHandler {
    engine: Specialist,
}

impl AudioHandler {
    /// Build the handler against the configured audio backend.
    pub fn from_config() -> Result<Self, BackendError> {
        Ok(Self::with_backend(
            BackendClient::for_modality(HandlerKind::Audio)?,
            HandlerSettings::from_config(),
        ))
    }

    /// Build the handler around an explicit backend client.
    pub fn with_backend(backend: BackendClient, settings: HandlerSettings) -> Self {
        Self {
            engine: Specialist {
                backend,
                kind: HandlerKind::Audio,
                operations: OPERATIONS,
                acceptance: MimeAcceptance::Class("audio"),
                settings,
                store_embeddings: true,
                enrich_similar: false,
            },
        }
    }
}

#[async_trait]
impl QueryHandler for AudioHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Audio
    }

    fn capabilities(&self) -> CapabilityDescriptor {
        self.engine.descriptor(
            self.name(),
            FORMATS,
            &["transcription", "audio-analysis", "feature-extraction"],
        )
    }

    async fn check_available(&self) -> bool {
        self.engine.available().await
    }

    async fn process(&self, request: &QueryRequest) -> HandlerResult {
        let (files, metadata) = self.engine.run(request).await;
        let response = compose_response("audio", &files);
        self.engine
            .finish(self.capabilities(), response, files, metadata)
    }
}
