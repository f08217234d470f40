use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the Modal Gate server.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Base URL of the document processing backend.
    pub document_backend_url: String,
    /// Base URL of the image processing backend.
    pub image_backend_url: String,
    /// Base URL of the video processing backend.
    pub video_backend_url: String,
    /// Base URL of the audio processing backend.
    pub audio_backend_url: String,
    /// Directory where uploaded files are staged before processing.
    pub upload_dir: String,
    /// Hours a finished or in-flight job is retained before the sweeper removes it.
    pub job_retention_hours: u64,
    /// Seconds between retention sweeps.
    pub job_sweep_interval_secs: u64,
    /// Maximum number of files accepted in a single submission.
    pub max_upload_files: usize,
    /// Maximum size in bytes accepted for a single uploaded file.
    pub max_upload_bytes: u64,
    /// Request timeout applied to every processing backend call.
    pub backend_timeout_secs: u64,
    /// Whether handlers degrade to local metadata-only processing when a backend is down.
    pub local_fallback_enabled: bool,
    /// Maximum number of entries returned by a history lookup.
    pub history_limit: usize,
    /// Inference provider consulted for classification before the MIME heuristic.
    pub inference_provider: InferenceProvider,
    /// Model identifier passed to the inference provider.
    pub inference_model: Option<String>,
    /// Base URL of the local Ollama runtime.
    pub ollama_url: Option<String>,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported classification inference providers.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferenceProvider {
    /// No inference; classification relies on the MIME heuristic alone.
    None,
    /// Local Ollama runtime.
    Ollama,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            document_backend_url: load_env("DOCUMENT_BACKEND_URL")?,
            image_backend_url: load_env("IMAGE_BACKEND_URL")?,
            video_backend_url: load_env("VIDEO_BACKEND_URL")?,
            audio_backend_url: load_env("AUDIO_BACKEND_URL")?,
            upload_dir: load_env_optional("UPLOAD_DIR").unwrap_or_else(|| "uploads".to_string()),
            job_retention_hours: load_env_parsed("JOB_RETENTION_HOURS", 24)?,
            job_sweep_interval_secs: load_env_parsed("JOB_SWEEP_INTERVAL_SECS", 3600)?,
            max_upload_files: load_env_parsed("MAX_UPLOAD_FILES", 10)?,
            max_upload_bytes: load_env_parsed("MAX_UPLOAD_BYTES", 52_428_800)?,
            backend_timeout_secs: load_env_parsed("BACKEND_TIMEOUT_SECS", 30)?,
            local_fallback_enabled: load_env_optional("LOCAL_FALLBACK_ENABLED")
                .map(|value| parse_bool("LOCAL_FALLBACK_ENABLED", &value))
                .transpose()?
                .unwrap_or(false),
            history_limit: load_env_parsed("HISTORY_LIMIT", 50)?,
            inference_provider: load_env_optional("INFERENCE_PROVIDER")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|()| ConfigError::InvalidValue("INFERENCE_PROVIDER".to_string()))
                })
                .transpose()?
                .unwrap_or(InferenceProvider::None),
            inference_model: load_env_optional("INFERENCE_MODEL"),
            ollama_url: load_env_optional("OLLAMA_URL"),
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        })
    }

    /// Base URL configured for the given modality backend.
    pub fn backend_url(&self, modality: crate::classify::HandlerKind) -> &str {
        match modality {
            crate::classify::HandlerKind::Document => &self.document_backend_url,
            crate::classify::HandlerKind::Image => &self.image_backend_url,
            crate::classify::HandlerKind::Video => &self.video_backend_url,
            crate::classify::HandlerKind::Audio => &self.audio_backend_url,
        }
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_env_parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
        .map(|value| value.unwrap_or(default))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue(key.to_string())),
    }
}

impl std::str::FromStr for InferenceProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        document_backend = %config.document_backend_url,
        image_backend = %config.image_backend_url,
        video_backend = %config.video_backend_url,
        audio_backend = %config.audio_backend_url,
        upload_dir = %config.upload_dir,
        server_port = ?config.server_port,
        inference_provider = ?config.inference_provider,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
