//! Best-effort classification via a local inference provider.
//!
//! Inference is optional; when no provider is configured (or the provider
//! misbehaves) the classifier falls back to the deterministic MIME heuristic.
//! The Ollama-backed client issues HTTP requests directly to the runtime and
//! demands a structured JSON reply, parsed against a strict schema.

use crate::classify::Modality;
use crate::config::{InferenceProvider, get_config};
use crate::query::QueryRequest;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_INFERENCE_MODEL: &str = "llama3.2";

/// Errors surfaced while attempting inference-backed classification.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// Provider was explicitly disabled or unreachable.
    #[error("Inference provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate classification: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed into the expected schema.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Raw classification fields produced by the provider, before coercion.
///
/// The modality tag is parsed strictly; a response with an unknown tag is
/// rejected wholesale. The remaining fields are optional and validated
/// downstream so a partially usable reply still contributes.
#[derive(Debug, Clone, Deserialize)]
pub struct InferredClassification {
    /// Modality tag; must be one of the closed enum values.
    pub classification: Modality,
    /// Handler name as returned by the model.
    #[serde(default, rename = "agentType")]
    pub agent_type: Option<String>,
    /// Priority as returned by the model.
    #[serde(default)]
    pub priority: Option<String>,
    /// Confidence as returned by the model.
    #[serde(default)]
    pub confidence: Option<f64>,
    /// Free-text rationale.
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// Interface implemented by classification inference providers.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Ask the provider to classify the request into a structured result.
    async fn infer(
        &self,
        request: &QueryRequest,
    ) -> Result<InferredClassification, InferenceError>;
}

/// Build an inference client based on configuration.
pub fn get_inference_client() -> Option<Box<dyn InferenceClient + Send + Sync>> {
    let config = get_config();
    match config.inference_provider {
        InferenceProvider::None => None,
        InferenceProvider::Ollama => {
            let base_url = config
                .ollama_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
            let model = config
                .inference_model
                .clone()
                .unwrap_or_else(|| DEFAULT_INFERENCE_MODEL.to_string());
            Some(Box::new(OllamaInferenceClient::new(base_url, model)))
        }
    }
}

struct OllamaInferenceClient {
    http: Client,
    base_url: String,
    model: String,
}

impl OllamaInferenceClient {
    fn new(base_url: String, model: String) -> Self {
        let http = Client::builder()
            .user_agent("modalgate/inference")
            .build()
            .expect("Failed to construct reqwest::Client for inference");
        Self {
            http,
            base_url,
            model,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

fn build_prompt(request: &QueryRequest) -> String {
    let mut prompt = String::from(
        "Classify the following multimodal query for dispatch.\n\
         Respond with a single JSON object and nothing else, using exactly these fields:\n\
         {\"classification\": \"TEXT|DOCUMENT|IMAGE|VIDEO|AUDIO\", \
         \"agentType\": \"document|image|video|audio\", \
         \"priority\": \"high|medium|low\", \
         \"confidence\": 0.0, \"reasoning\": \"...\"}\n\n",
    );

    match request.text.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => {
            prompt.push_str("Query text: ");
            prompt.push_str(text);
            prompt.push('\n');
        }
        _ => prompt.push_str("Query text: (none)\n"),
    }

    prompt.push_str("Attached files:\n");
    for file in &request.files {
        prompt.push_str(&format!(
            "- {} ({}, {} bytes)\n",
            file.filename, file.mime_type, file.size_bytes
        ));
    }

    prompt
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    done: bool,
}

#[async_trait]
impl InferenceClient for OllamaInferenceClient {
    async fn infer(
        &self,
        request: &QueryRequest,
    ) -> Result<InferredClassification, InferenceError> {
        let payload = json!({
            "model": self.model,
            "prompt": build_prompt(request),
            "stream": false,
            "format": "json",
            "options": {
                // Lower temperature for stable structured output.
                "temperature": 0.1,
            }
        });

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                InferenceError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(InferenceError::ProviderUnavailable(format!(
                "Ollama endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaResponse = response.json().await.map_err(|error| {
            InferenceError::InvalidResponse(format!("failed to decode Ollama response: {error}"))
        })?;

        if !body.done {
            return Err(InferenceError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        serde_json::from_str(body.response.trim()).map_err(|error| {
            InferenceError::InvalidResponse(format!(
                "classification payload did not match the expected schema: {error}"
            ))
        })
    }
}
