//! Image specialist.
//!
//! Beyond backend processing, image analyses that come back with embeddings
//! are persisted through `store-analysis` and enriched with up to three
//! similar stored analyses. Both steps are best-effort.

use super::{
    CapabilityDescriptor, HandlerResult, HandlerSettings, MimeAcceptance, QueryHandler, Specialist,
    compose_response,
};
use crate::backend::{BackendClient, BackendError};
use crate::classify::HandlerKind;
use crate::query::QueryRequest;
use async_trait::async_trait;

const OPERATIONS: &[&str] = &["detect_objects", "extract_text", "analyze_colors"];
const FORMATS: &[&str] = &["image/*"];

/// Specialist for still images.
pub struct ImageHandler {
    engine: Specialist,
}

impl ImageHandler {
    /// Build the handler against the configured image backend.
    pub fn from_config() -> Result<Self, BackendError> {
        Ok(Self::with_backend(
            BackendClient::for_modality(HandlerKind::Image)?,
            HandlerSettings::from_config(),
        ))
    }

    /// Build the handler around an explicit backend client.
    pub fn with_backend(backend: BackendClient, settings: HandlerSettings) -> Self {
        Self {
            engine: Specialist {
                backend,
                kind: HandlerKind::Image,
                operations: OPERATIONS,
                acceptance: MimeAcceptance::Class("image"),
                settings,
                store_embeddings: true,
                enrich_similar: true,
            },
        }
    }
}

#[async_trait]
impl QueryHandler for ImageHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Image
    }

    fn capabilities(&self) -> CapabilityDescriptor {
        self.engine.descriptor(
            self.name(),
            FORMATS,
            &["object-detection", "ocr", "color-analysis"],
        )
    }

    async fn check_available(&self) -> bool {
        self.engine.available().await
    }

    async fn process(&self, request: &QueryRequest) -> HandlerResult {
        let (files, metadata) = self.engine.run(request).await;
        let response = compose_response("image", &files);
        self.engine
            .finish(self.capabilities(), response, files, metadata)
    }
}
