//! Static routing from a classification to exactly one specialist handler.
//!
//! The table is pure and side-effect free: the same classification always
//! produces the same decision. Unknown handler names never reach this layer;
//! classification coerces them to `document` before routing.

use crate::classify::{Classification, HandlerKind, Priority};
use serde::{Deserialize, Serialize};

/// Sentinel target recorded when the registry cannot resolve a handler.
pub const ERROR_HANDLER: &str = "ErrorHandler";

/// Which handler runs the query, with the inputs that led there.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingDecision {
    /// Name of the handler the query is dispatched to.
    pub target_agent: String,
    /// The classification the decision was made from.
    pub classification: Classification,
    /// Condensed rationale record.
    pub routing_decision: RoutingRationale,
}

/// Condensed rationale carried alongside every routing decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingRationale {
    /// Handler key the decision resolved to.
    pub agent: HandlerKind,
    /// Priority inherited from the classification.
    pub priority: Priority,
    /// Confidence inherited from the classification.
    pub confidence: f64,
    /// Rationale inherited from the classification.
    pub reasoning: String,
}

/// Handler name for a given registry key.
pub fn handler_name(kind: HandlerKind) -> &'static str {
    match kind {
        HandlerKind::Document => "DocumentHandler",
        HandlerKind::Image => "ImageHandler",
        HandlerKind::Video => "VideoHandler",
        HandlerKind::Audio => "AudioHandler",
    }
}

/// Resolve a classification to its routing decision.
pub fn route(classification: &Classification) -> RoutingDecision {
    let handler = classification.agent_type;
    RoutingDecision {
        target_agent: handler_name(handler).to_string(),
        classification: classification.clone(),
        routing_decision: RoutingRationale {
            agent: handler,
            priority: classification.priority,
            confidence: classification.confidence,
            reasoning: classification.reasoning.clone(),
        },
    }
}

/// Routing record pointing at the error sentinel, used when dispatch fails
/// before a handler ever runs.
pub fn sentinel_route(classification: &Classification) -> RoutingDecision {
    RoutingDecision {
        target_agent: ERROR_HANDLER.to_string(),
        classification: classification.clone(),
        routing_decision: RoutingRationale {
            agent: classification.agent_type,
            priority: classification.priority,
            confidence: classification.confidence,
            reasoning: "No handler registered for the classified modality".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{Modality, Priority};

    fn classification(kind: HandlerKind) -> Classification {
        Classification {
            classification: Modality::Image,
            agent_type: kind,
            priority: Priority::High,
            confidence: 0.9,
            reasoning: "test".into(),
            file_count: 1,
            has_text: false,
            timestamp: "2025-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn table_covers_every_handler_kind() {
        let expected = [
            (HandlerKind::Document, "DocumentHandler"),
            (HandlerKind::Image, "ImageHandler"),
            (HandlerKind::Video, "VideoHandler"),
            (HandlerKind::Audio, "AudioHandler"),
        ];
        for (kind, name) in expected {
            assert_eq!(route(&classification(kind)).target_agent, name);
        }
    }

    #[test]
    fn routing_is_pure() {
        let input = classification(HandlerKind::Audio);
        let first = serde_json::to_value(route(&input)).expect("serialize");
        let second = serde_json::to_value(route(&input)).expect("serialize");
        assert_eq!(first, second);
    }

    #[test]
    fn rationale_copies_classification_fields() {
        let decision = route(&classification(HandlerKind::Video));
        assert_eq!(decision.routing_decision.agent, HandlerKind::Video);
        assert_eq!(decision.routing_decision.priority, Priority::High);
        assert!((decision.routing_decision.confidence - 0.9).abs() < f64::EPSILON);
        assert_eq!(decision.routing_decision.reasoning, "test");
    }

    #[test]
    fn sentinel_route_targets_the_error_handler() {
        let decision = sentinel_route(&classification(HandlerKind::Image));
        assert_eq!(decision.target_agent, ERROR_HANDLER);
        assert_eq!(decision.routing_decision.agent, HandlerKind::Image);
    }
}
