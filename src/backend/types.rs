//! Shared types used by the processing backend clients.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors returned while interacting with a processing backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Backend responded with an unexpected status code.
    #[error("Unexpected backend response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the backend.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Staged file could not be read back from disk.
    #[error("Failed to read staged file {path}: {source}")]
    FileRead {
        /// Staging path that failed.
        path: String,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },
}

/// Parsed reply from a `process-{modality}` call.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessingResponse {
    /// Opaque analysis payload produced by the backend.
    pub analysis: Value,
    /// Embedding vector accompanying the analysis, when the backend computes one.
    #[serde(default)]
    pub embeddings: Option<Vec<f32>>,
}

/// A single hit returned by a similarity lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarMatch {
    /// Identifier of the stored analysis.
    pub id: String,
    /// Similarity score reported by the backend.
    pub score: f32,
    /// Stored payload, when the backend returns one.
    #[serde(default)]
    pub payload: Option<Value>,
}

#[derive(Deserialize)]
pub(crate) struct StoreAnalysisResponse {
    pub(crate) id: String,
}

#[derive(Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub(crate) matches: Vec<SimilarMatch>,
}
