//! Video specialist.

use super::{
    CapabilityDescriptor, HandlerResult, HandlerSettings, MimeAcceptance, QueryHandler, Specialist,
    compose_response,
};
use crate::backend::{BackendClient, BackendError};
use crate::classify::HandlerKind;
use crate::query::QueryRequest;
use async_trait::async_trait;

const OPERATIONS: &[&str] = &["extract_frames", "analyze_scenes", "get_metadata"];
const FORMATS: &[&str] = &["video/*"];

/// Specialist for video content.
pub struct VideoHandler {
    engine: Specialist,
}

impl VideoHandler {
    /// Build the handler against the configured video backend.
    pub fn from_config() -> Result<Self, BackendError> {
        Ok(Self::with_backend(
            BackendClient::for_modality(HandlerKind::Video)?,
            HandlerSettings::from_config(),
        ))
    }

    /// Build the handler around an explicit backend client.
    pub fn with_backend(backend: BackendClient, settings: HandlerSettings) -> Self {
        Self {
            engine: Specialist {
                backend,
                kind: HandlerKind::Video,
                operations: OPERATIONS,
                acceptance: MimeAcceptance::Class("video"),
                settings,
                store_embeddings: false,
                enrich_similar: false,
            },
        }
    }
}

#[async_trait]
impl QueryHandler for VideoHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Video
    }

    fn capabilities(&self) -> CapabilityDescriptor {
        self.engine.descriptor(
            self.name(),
            FORMATS,
            &["frame-extraction", "scene-analysis", "metadata"],
        )
    }

    async fn check_available(&self) -> bool {
        self.engine.available().await
    }

    async fn process(&self, request: &QueryRequest) -> HandlerResult {
        let (files, metadata) = self.engine.run(request).await;
        let response = compose_response("video", &files);
        self.engine
            .finish(self.capabilities(), response, files, metadata)
    }
}
