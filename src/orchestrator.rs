//! Orchestration of the dispatch pipeline.
//!
//! `handle` runs classify → route → registry lookup → handler invocation and
//! merges everything into one envelope. It never returns an error: a registry
//! gap produces a synthetic failure envelope so every caller sees the same
//! shape.

use crate::classify::{Classification, Classifier};
use crate::handlers::{CapabilityDescriptor, FileOutcome, HandlerMetadata};
use crate::query::{QueryRequest, current_timestamp_rfc3339};
use crate::registry::HandlerRegistry;
use crate::routing::{self, RoutingDecision};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Version tag stamped on every orchestrated result and capability catalog.
pub const ORCHESTRATOR_VERSION: &str = "2.0";

/// Final envelope produced for every dispatched request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratedResult {
    /// Outcome flag from the handler (false for synthetic error envelopes).
    pub success: bool,
    /// Aggregate human-readable response.
    pub response: String,
    /// Per-file outcomes in submission order.
    pub files: Vec<FileOutcome>,
    /// Capability snapshot of the handler that ran, absent on dispatch failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<CapabilityDescriptor>,
    /// Handler counters and timing, absent on dispatch failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HandlerMetadata>,
    /// Failure description when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Classification the pipeline produced.
    pub classification: Classification,
    /// Routing decision, kept denormalized for audit and history display.
    pub routing: RoutingDecision,
    /// Name of the handler that ran, or "unknown" for error envelopes.
    pub agent_used: String,
    /// Classification confidence echoed at the top level.
    pub confidence: f64,
    /// Orchestrator version that produced this result.
    pub orchestrator_version: String,
    /// Wall-clock time spent in the pipeline, milliseconds.
    pub total_ms: u64,
    /// When the envelope was assembled, RFC 3339.
    pub completed_at: String,
}

/// Merged capability catalog across every registered handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityCatalog {
    /// Orchestrator version the catalog was generated by.
    pub orchestrator_version: String,
    /// Names of the registered handlers.
    pub supported_handlers: Vec<String>,
    /// Per-handler capability descriptors.
    pub handlers: Vec<CapabilityDescriptor>,
    /// Catalog generation timestamp, RFC 3339.
    pub generated_at: String,
}

/// Overall service health derived from per-handler availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Every handler reports available.
    Healthy,
    /// More than half of the handlers report available.
    Degraded,
    /// Half or fewer handlers available, or none registered.
    Unhealthy,
}

/// Availability of one handler at probe time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerAvailability {
    /// Handler name.
    pub name: String,
    /// Whether the handler reported itself able to take work.
    pub available: bool,
}

/// Result of a health probe across all handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// Aggregate status.
    pub status: HealthStatus,
    /// Per-handler availability.
    pub handlers: Vec<HandlerAvailability>,
    /// Probe timestamp, RFC 3339.
    pub checked_at: String,
}

/// Sequences classification, routing, and handler dispatch.
pub struct Orchestrator {
    classifier: Classifier,
    registry: HandlerRegistry,
}

impl Orchestrator {
    /// Build an orchestrator over an explicit classifier and registry.
    pub fn new(classifier: Classifier, registry: HandlerRegistry) -> Self {
        Self {
            classifier,
            registry,
        }
    }

    /// Run the full pipeline for one request. Infallible by contract.
    pub async fn handle(&self, request: &QueryRequest) -> OrchestratedResult {
        let started = Instant::now();
        let classification = self.classifier.classify(request).await;
        tracing::info!(
            modality = %classification.classification,
            handler = %classification.agent_type,
            confidence = classification.confidence,
            files = classification.file_count,
            "Classified query"
        );

        let Some(handler) = self.registry.get(classification.agent_type) else {
            tracing::error!(
                handler = %classification.agent_type,
                "No handler registered for classified modality"
            );
            return error_envelope(classification, started);
        };

        let routing = routing::route(&classification);
        let result = handler.process(request).await;
        tracing::info!(
            handler = %routing.target_agent,
            success = result.success,
            files = result.files.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Handler finished"
        );

        OrchestratedResult {
            success: result.success,
            response: result.response,
            files: result.files,
            capabilities: Some(result.capabilities),
            metadata: Some(result.metadata),
            error: result.error,
            agent_used: routing.target_agent.clone(),
            confidence: classification.confidence,
            classification,
            routing,
            orchestrator_version: ORCHESTRATOR_VERSION.to_string(),
            total_ms: started.elapsed().as_millis() as u64,
            completed_at: current_timestamp_rfc3339(),
        }
    }

    /// Merge every handler's capability descriptor into one catalog.
    pub fn aggregate_capabilities(&self) -> CapabilityCatalog {
        let handlers: Vec<CapabilityDescriptor> = self
            .registry
            .handlers()
            .map(|handler| handler.capabilities())
            .collect();
        CapabilityCatalog {
            orchestrator_version: ORCHESTRATOR_VERSION.to_string(),
            supported_handlers: handlers
                .iter()
                .map(|descriptor| descriptor.name.clone())
                .collect(),
            handlers,
            generated_at: current_timestamp_rfc3339(),
        }
    }

    /// Probe every handler concurrently and derive an aggregate status.
    pub async fn health_check(&self) -> HealthReport {
        let probes = self.registry.handlers().map(|handler| async move {
            HandlerAvailability {
                name: handler.name().to_string(),
                available: handler.check_available().await,
            }
        });
        let handlers = join_all(probes).await;

        let total = handlers.len();
        let available = handlers.iter().filter(|probe| probe.available).count();
        let status = if total == 0 {
            HealthStatus::Unhealthy
        } else if available == total {
            HealthStatus::Healthy
        } else if available * 2 > total {
            HealthStatus::Degraded
        } else {
            HealthStatus::Unhealthy
        };

        HealthReport {
            status,
            handlers,
            checked_at: current_timestamp_rfc3339(),
        }
    }
}

/// Well-formed failure envelope for requests no handler could take.
fn error_envelope(classification: Classification, started: Instant) -> OrchestratedResult {
    OrchestratedResult {
        success: false,
        response: "Sorry, something went wrong while processing your query. \
                   Please try again later."
            .to_string(),
        files: Vec::new(),
        capabilities: None,
        metadata: None,
        error: Some(format!(
            "No handler registered for modality {}",
            classification.agent_type
        )),
        agent_used: "unknown".to_string(),
        confidence: classification.confidence,
        routing: routing::sentinel_route(&classification),
        classification,
        orchestrator_version: ORCHESTRATOR_VERSION.to_string(),
        total_ms: started.elapsed().as_millis() as u64,
        completed_at: current_timestamp_rfc3339(),
    }
}
