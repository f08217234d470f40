//! Query classification: deciding which modality a submission belongs to.
//!
//! Classification is a total function. Every request maps to one of the closed
//! modality values, no matter how malformed the inputs or how badly the optional
//! inference provider misbehaves. The pipeline is: text-only short circuit,
//! then best-effort inference (when configured), then the deterministic MIME
//! heuristic. Inference output is parsed against a strict schema and coerced
//! field by field; anything unusable degrades rather than failing the request.

mod heuristics;
mod inference;

pub use inference::{
    InferenceClient, InferenceError, InferredClassification, get_inference_client,
};

use crate::query::{QueryRequest, current_timestamp_rfc3339};
use serde::{Deserialize, Serialize};

/// Confidence assigned to text-only submissions.
const TEXT_ONLY_CONFIDENCE: f64 = 0.8;
/// Confidence substituted when a provider returns an unusable value.
const DEFAULT_CONFIDENCE: f64 = 0.8;

/// Closed set of content modalities the gateway recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
    /// Plain text with no attached files.
    Text,
    /// Document-like content (PDFs, office files, generic binaries).
    Document,
    /// Still images.
    Image,
    /// Video content.
    Video,
    /// Audio content.
    Audio,
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            Self::Text => "TEXT",
            Self::Document => "DOCUMENT",
            Self::Image => "IMAGE",
            Self::Video => "VIDEO",
            Self::Audio => "AUDIO",
        };
        f.write_str(tag)
    }
}

/// Closed set of specialist handlers; also the registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerKind {
    /// Document specialist.
    Document,
    /// Image specialist.
    Image,
    /// Video specialist.
    Video,
    /// Audio specialist.
    Audio,
}

impl HandlerKind {
    /// All handler kinds in registration order.
    pub const ALL: [Self; 4] = [Self::Document, Self::Image, Self::Video, Self::Audio];
}

impl std::fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            Self::Document => "document",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
        };
        f.write_str(tag)
    }
}

impl std::str::FromStr for HandlerKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "document" => Ok(Self::Document),
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            _ => Err(()),
        }
    }
}

/// Processing priority attached to a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Front of the line.
    High,
    /// Default ordering.
    Medium,
    /// Best effort.
    Low,
}

impl std::str::FromStr for Priority {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(()),
        }
    }
}

/// Validated classification attached to every job and result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    /// Modality tag; always one of the closed enum values.
    pub classification: Modality,
    /// Specialist handler the router will dispatch to.
    pub agent_type: HandlerKind,
    /// Processing priority.
    pub priority: Priority,
    /// Confidence in the decision, always within `[0, 1]`.
    pub confidence: f64,
    /// Human-readable rationale for the decision.
    pub reasoning: String,
    /// Number of files attached to the request.
    pub file_count: usize,
    /// Whether the request carried non-whitespace text.
    pub has_text: bool,
    /// When the classification was produced, RFC 3339.
    pub timestamp: String,
}

/// Decides the modality of incoming requests.
///
/// Owns the optional inference client; when none is configured every decision
/// comes from the deterministic MIME heuristic.
pub struct Classifier {
    inference: Option<Box<dyn InferenceClient + Send + Sync>>,
}

impl Classifier {
    /// Build a classifier around an explicit inference client (or none).
    pub fn new(inference: Option<Box<dyn InferenceClient + Send + Sync>>) -> Self {
        Self { inference }
    }

    /// Build a classifier using the provider selected by configuration.
    pub fn from_config() -> Self {
        Self::new(get_inference_client())
    }

    /// Classify a request. Total: never fails, never returns an open value.
    pub async fn classify(&self, request: &QueryRequest) -> Classification {
        if request.files.is_empty() {
            return self.stamp(
                request,
                Modality::Text,
                HandlerKind::Document,
                Priority::Medium,
                TEXT_ONLY_CONFIDENCE,
                "No files attached; treating the query as plain text".to_string(),
            );
        }

        if let Some(client) = &self.inference {
            match client.infer(request).await {
                Ok(inferred) => return self.validate(request, inferred),
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        "Inference classification failed; falling back to MIME heuristic"
                    );
                }
            }
        }

        let verdict = heuristics::classify_by_mime(&request.files);
        self.stamp(
            request,
            verdict.modality,
            verdict.handler,
            Priority::Medium,
            verdict.confidence,
            verdict.reasoning,
        )
    }

    /// Coerce raw inference output into a valid classification.
    fn validate(&self, request: &QueryRequest, inferred: InferredClassification) -> Classification {
        let agent_type = coerce_handler(inferred.agent_type.as_deref());
        let priority = coerce_priority(inferred.priority.as_deref());
        let confidence = normalize_confidence(inferred.confidence);
        let reasoning = inferred
            .reasoning
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| "Model-supplied classification".to_string());
        self.stamp(
            request,
            inferred.classification,
            agent_type,
            priority,
            confidence,
            reasoning,
        )
    }

    /// Attach the request-derived fields every classification carries.
    fn stamp(
        &self,
        request: &QueryRequest,
        classification: Modality,
        agent_type: HandlerKind,
        priority: Priority,
        confidence: f64,
        reasoning: String,
    ) -> Classification {
        Classification {
            classification,
            agent_type,
            priority,
            confidence,
            reasoning,
            file_count: request.file_count(),
            has_text: request.has_text(),
            timestamp: current_timestamp_rfc3339(),
        }
    }
}

fn coerce_handler(raw: Option<&str>) -> HandlerKind {
    let Some(raw) = raw else {
        return HandlerKind::Document;
    };
    raw.parse().unwrap_or_else(|()| {
        tracing::debug!(agent = raw, "Unrecognized handler name; defaulting to document");
        HandlerKind::Document
    })
}

fn coerce_priority(raw: Option<&str>) -> Priority {
    let Some(raw) = raw else {
        return Priority::Medium;
    };
    raw.parse().unwrap_or_else(|()| {
        tracing::debug!(priority = raw, "Unrecognized priority; defaulting to medium");
        Priority::Medium
    })
}

fn normalize_confidence(raw: Option<f64>) -> f64 {
    match raw {
        Some(value) if value.is_finite() && (0.0..=1.0).contains(&value) => value,
        _ => DEFAULT_CONFIDENCE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::FileDescriptor;
    use async_trait::async_trait;
    use std::path::PathBuf;

    fn file(name: &str, mime: &str) -> FileDescriptor {
        FileDescriptor {
            filename: name.into(),
            mime_type: mime.into(),
            size_bytes: 128,
            storage_path: PathBuf::from(format!("/tmp/{name}")),
        }
    }

    struct FixedInference(InferredClassification);

    #[async_trait]
    impl InferenceClient for FixedInference {
        async fn infer(
            &self,
            _request: &QueryRequest,
        ) -> Result<InferredClassification, InferenceError> {
            Ok(self.0.clone())
        }
    }

    struct FailingInference;

    #[async_trait]
    impl InferenceClient for FailingInference {
        async fn infer(
            &self,
            _request: &QueryRequest,
        ) -> Result<InferredClassification, InferenceError> {
            Err(InferenceError::GenerationFailed("boom".into()))
        }
    }

    #[tokio::test]
    async fn text_only_requests_classify_as_text() {
        let classifier = Classifier::new(None);
        let request = QueryRequest::new("user-1", Some("summarize my notes".into()), Vec::new());

        let classification = classifier.classify(&request).await;

        assert_eq!(classification.classification, Modality::Text);
        assert_eq!(classification.agent_type, HandlerKind::Document);
        assert_eq!(classification.priority, Priority::Medium);
        assert!((classification.confidence - 0.8).abs() < f64::EPSILON);
        assert_eq!(classification.file_count, 0);
        assert!(classification.has_text);
    }

    #[tokio::test]
    async fn inference_output_is_coerced_into_closed_sets() {
        let inferred = InferredClassification {
            classification: Modality::Image,
            agent_type: Some("pixel-wizard".into()),
            priority: Some("urgent".into()),
            confidence: Some(7.5),
            reasoning: Some("  ".into()),
        };
        let classifier = Classifier::new(Some(Box::new(FixedInference(inferred))));
        let request = QueryRequest::new("user-1", None, vec![file("cat.png", "image/png")]);

        let classification = classifier.classify(&request).await;

        assert_eq!(classification.classification, Modality::Image);
        assert_eq!(classification.agent_type, HandlerKind::Document);
        assert_eq!(classification.priority, Priority::Medium);
        assert!((classification.confidence - 0.8).abs() < f64::EPSILON);
        assert_eq!(classification.reasoning, "Model-supplied classification");
        assert_eq!(classification.file_count, 1);
        assert!(!classification.has_text);
    }

    #[tokio::test]
    async fn inference_failure_falls_back_to_heuristic() {
        let classifier = Classifier::new(Some(Box::new(FailingInference)));
        let request = QueryRequest::new(
            "user-1",
            None,
            vec![
                file("clip.mp4", "video/mp4"),
                file("notes.pdf", "application/pdf"),
            ],
        );

        let classification = classifier.classify(&request).await;

        assert_eq!(classification.classification, Modality::Video);
        assert_eq!(classification.agent_type, HandlerKind::Video);
        assert!((classification.confidence - 0.9).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn valid_inference_fields_pass_through() {
        let inferred = InferredClassification {
            classification: Modality::Audio,
            agent_type: Some("audio".into()),
            priority: Some("high".into()),
            confidence: Some(0.95),
            reasoning: Some("waveform attachment".into()),
        };
        let classifier = Classifier::new(Some(Box::new(FixedInference(inferred))));
        let request = QueryRequest::new("user-1", None, vec![file("take.mp3", "audio/mpeg")]);

        let classification = classifier.classify(&request).await;

        assert_eq!(classification.agent_type, HandlerKind::Audio);
        assert_eq!(classification.priority, Priority::High);
        assert!((classification.confidence - 0.95).abs() < f64::EPSILON);
        assert_eq!(classification.reasoning, "waveform attachment");
    }

    #[test]
    fn confidence_normalization_covers_the_pathological_cases() {
        assert!((normalize_confidence(Some(0.4)) - 0.4).abs() < f64::EPSILON);
        assert!((normalize_confidence(Some(-0.1)) - 0.8).abs() < f64::EPSILON);
        assert!((normalize_confidence(Some(1.1)) - 0.8).abs() < f64::EPSILON);
        assert!((normalize_confidence(Some(f64::NAN)) - 0.8).abs() < f64::EPSILON);
        assert!((normalize_confidence(None) - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn wire_shape_uses_the_original_field_names() {
        let classification = Classification {
            classification: Modality::Audio,
            agent_type: HandlerKind::Audio,
            priority: Priority::Medium,
            confidence: 0.9,
            reasoning: "test".into(),
            file_count: 1,
            has_text: false,
            timestamp: "2025-01-01T00:00:00Z".into(),
        };

        let value = serde_json::to_value(&classification).expect("serialize");
        assert_eq!(value["classification"], "AUDIO");
        assert_eq!(value["agentType"], "audio");
        assert_eq!(value["priority"], "medium");
        assert_eq!(value["fileCount"], 1);
        assert_eq!(value["hasText"], false);
    }
}
