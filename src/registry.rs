//! Capability registry: the enum-keyed map of specialist handlers.
//!
//! Dispatch looks handlers up by [`HandlerKind`], never by free-form string.
//! A missing entry is a configuration defect the orchestrator turns into an
//! error envelope.

use crate::backend::BackendError;
use crate::classify::HandlerKind;
use crate::handlers::{AudioHandler, DocumentHandler, ImageHandler, QueryHandler, VideoHandler};
use std::collections::HashMap;
use std::sync::Arc;

/// Holds one handler per modality.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<HandlerKind, Arc<dyn QueryHandler>>,
}

impl HandlerRegistry {
    /// Empty registry; handlers are added with [`register`](Self::register).
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with all four specialists built from configuration.
    pub fn from_config() -> Result<Self, BackendError> {
        let mut registry = Self::new();
        registry.register(Arc::new(DocumentHandler::from_config()?));
        registry.register(Arc::new(ImageHandler::from_config()?));
        registry.register(Arc::new(VideoHandler::from_config()?));
        registry.register(Arc::new(AudioHandler::from_config()?));
        Ok(registry)
    }

    /// Install a handler under its own kind, replacing any previous entry.
    pub fn register(&mut self, handler: Arc<dyn QueryHandler>) {
        let kind = handler.kind();
        if self.handlers.insert(kind, handler).is_some() {
            tracing::warn!(handler = %kind, "Replaced an already-registered handler");
        }
    }

    /// Look up the handler for a modality.
    pub fn get(&self, kind: HandlerKind) -> Option<&Arc<dyn QueryHandler>> {
        self.handlers.get(&kind)
    }

    /// Registered handlers in stable modality order.
    pub fn handlers(&self) -> impl Iterator<Item = &Arc<dyn QueryHandler>> {
        HandlerKind::ALL
            .iter()
            .filter_map(|kind| self.handlers.get(kind))
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// True when no handler has been registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
