//! HTTP client wrapper for the per-modality processing backends.

use crate::backend::types::{
    BackendError, ProcessingResponse, SearchResponse, SimilarMatch, StoreAnalysisResponse,
};
use crate::classify::HandlerKind;
use crate::config::get_config;
use crate::query::{FileDescriptor, current_timestamp_rfc3339};
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde_json::{Value, json};
use std::time::Duration;

/// Lightweight HTTP client for one modality's processing backend.
pub struct BackendClient {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) modality: HandlerKind,
}

impl BackendClient {
    /// Construct a client for an explicit base URL and timeout.
    pub fn new(
        modality: HandlerKind,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = Client::builder()
            .user_agent("modalgate/0.2")
            .timeout(timeout)
            .build()?;
        let base_url = normalize_base_url(base_url).map_err(BackendError::InvalidUrl)?;
        tracing::debug!(
            modality = %modality,
            url = %base_url,
            "Initialized processing backend client"
        );
        Ok(Self {
            client,
            base_url,
            modality,
        })
    }

    /// Construct a client for the given modality using configuration derived from the environment.
    pub fn for_modality(modality: HandlerKind) -> Result<Self, BackendError> {
        let config = get_config();
        Self::new(
            modality,
            config.backend_url(modality),
            Duration::from_secs(config.backend_timeout_secs),
        )
    }

    /// Ship a staged file to the backend for processing.
    ///
    /// The file travels as a multipart `file` part (bytes, filename, MIME) next to
    /// an `operations` part holding the requested operation names as a JSON array.
    pub async fn process_file(
        &self,
        file: &FileDescriptor,
        operations: &[&str],
    ) -> Result<ProcessingResponse, BackendError> {
        let bytes = tokio::fs::read(&file.storage_path)
            .await
            .map_err(|source| BackendError::FileRead {
                path: file.storage_path.display().to_string(),
                source,
            })?;

        let mime = if file.mime_type.trim().is_empty() {
            "application/octet-stream"
        } else {
            &file.mime_type
        };
        let part = Part::bytes(bytes)
            .file_name(file.filename.clone())
            .mime_str(mime)?;
        let form = Form::new()
            .part("file", part)
            .text("operations", json!(operations).to_string());

        let endpoint = format_endpoint(&self.base_url, &format!("process-{}", self.modality));
        let response = self.client.post(endpoint).multipart(form).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = BackendError::UnexpectedStatus { status, body };
            tracing::error!(
                modality = %self.modality,
                file = %file.filename,
                error = %error,
                "Backend processing failed"
            );
            return Err(error);
        }

        Ok(response.json().await?)
    }

    /// Persist an analysis and its embeddings for later similarity lookups.
    pub async fn store_analysis(
        &self,
        analysis: &Value,
        embeddings: &[f32],
    ) -> Result<String, BackendError> {
        let body = json!({
            "analysis": analysis,
            "embeddings": embeddings,
            "timestamp": current_timestamp_rfc3339(),
        });

        let response = self
            .client
            .post(format_endpoint(&self.base_url, "store-analysis"))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = BackendError::UnexpectedStatus { status, body };
            tracing::error!(modality = %self.modality, error = %error, "Failed to store analysis");
            return Err(error);
        }

        let payload: StoreAnalysisResponse = response.json().await?;
        Ok(payload.id)
    }

    /// Search stored analyses near the given embedding.
    ///
    /// Similarity search is an enhancement: any failure returns an empty list
    /// instead of propagating.
    pub async fn search_similar(&self, embeddings: &[f32], limit: usize) -> Vec<SimilarMatch> {
        match self.try_search(embeddings, limit).await {
            Ok(matches) => matches,
            Err(error) => {
                tracing::warn!(
                    modality = %self.modality,
                    error = %error,
                    "Similarity search failed; returning no matches"
                );
                Vec::new()
            }
        }
    }

    async fn try_search(
        &self,
        embeddings: &[f32],
        limit: usize,
    ) -> Result<Vec<SimilarMatch>, BackendError> {
        let body = json!({
            "embeddings": embeddings,
            "limit": limit,
        });

        let response = self
            .client
            .post(format_endpoint(&self.base_url, "search-similar"))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::UnexpectedStatus { status, body });
        }

        let payload: SearchResponse = response.json().await?;
        Ok(payload.matches)
    }

    /// Probe backend liveness with a lightweight GET.
    pub async fn health(&self) -> bool {
        let endpoint = format_endpoint(&self.base_url, "health");
        match self.client.get(endpoint).send().await {
            Ok(response) => response.status().is_success(),
            Err(error) => {
                tracing::debug!(
                    modality = %self.modality,
                    error = %error,
                    "Backend health probe failed"
                );
                false
            }
        }
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
