//! HTTP surface for Modal Gate.
//!
//! A compact Axum router over a [`GatewayApi`] service:
//!
//! - `POST /queries` – multipart submission (`text_query`, `user_id`, `files`),
//!   answered with 202 and a poll token.
//! - `GET /queries/{id}` / `GET /queries/{id}/status` – poll a job; 202 while
//!   processing, 200 once terminal.
//! - `DELETE /queries/{id}` – owner-checked removal of a job record.
//! - `GET /history/{user_id}` – the caller's recent jobs.
//! - `GET /system/capabilities` – aggregated handler capability catalog.
//! - `GET /system/health` – per-handler availability; 503 when unhealthy.
//! - `GET /metrics` – gateway counters.
//! - `GET /commands` – machine-readable command catalog for quick discovery.
//!
//! Caller identity travels in the `x-user-id` header on reads and deletes; the
//! submit form's `user_id` field is authoritative on POST and must agree with
//! the header when both are present.

use crate::config::get_config;
use crate::jobs::{GatewayApi, JobAccessError, JobStatus, SubmitError};
use crate::orchestrator::HealthStatus;
use crate::query::{FileDescriptor, QueryRequest};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// Build the HTTP router exposing the gateway API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: GatewayApi + 'static,
{
    let config = get_config();
    let body_limit =
        (config.max_upload_bytes as usize).saturating_mul(config.max_upload_files) + 1_048_576;

    Router::new()
        .route("/queries", post(submit_query::<S>))
        .route(
            "/queries/:id",
            get(get_query::<S>).delete(delete_query::<S>),
        )
        .route("/queries/:id/status", get(get_query::<S>))
        .route("/history/:user_id", get(get_history::<S>))
        .route("/system/capabilities", get(get_capabilities::<S>))
        .route("/system/health", get(get_health::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(service)
}

/// Accept a multipart submission and hand it to the job manager.
async fn submit_query<S>(
    State(service): State<Arc<S>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, ApiError>
where
    S: GatewayApi,
{
    let submission = stage_submission(multipart).await?;

    let Some(user_id) = submission
        .user_id
        .clone()
        .filter(|user| !user.trim().is_empty())
    else {
        remove_staged(&submission.files).await;
        return Err(ApiError::Validation("user_id is required".into()));
    };
    if let Some(header_user) = caller_header(&headers)
        && header_user != user_id
    {
        remove_staged(&submission.files).await;
        return Err(ApiError::Forbidden(
            "x-user-id header does not match the submitted user_id".into(),
        ));
    }

    let request = QueryRequest::new(user_id, submission.text_query, submission.files);
    let receipt = service.submit(request).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "success": true,
            "queryId": receipt.query_id,
            "status": "processing",
            "estimatedTime": receipt.estimated_time,
        })),
    )
        .into_response())
}

/// Poll a job: 202 with the view while processing, 200 once terminal.
async fn get_query<S>(
    State(service): State<Arc<S>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError>
where
    S: GatewayApi,
{
    let caller = require_caller(&headers)?;
    let view = service.job_view(&id, &caller).await?;
    let status = if view.status == JobStatus::Processing {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(view)).into_response())
}

/// Owner-checked removal of a job record.
async fn delete_query<S>(
    State(service): State<Arc<S>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError>
where
    S: GatewayApi,
{
    let caller = require_caller(&headers)?;
    service.delete_job(&id, &caller).await?;
    Ok(Json(json!({ "success": true })))
}

/// The caller's own jobs, newest first.
async fn get_history<S>(
    State(service): State<Arc<S>>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError>
where
    S: GatewayApi,
{
    let caller = require_caller(&headers)?;
    if caller != user_id {
        return Err(ApiError::Forbidden(
            "History is limited to your own queries".into(),
        ));
    }
    let queries = service.history(&caller).await;
    Ok(Json(json!({
        "success": true,
        "userId": user_id,
        "count": queries.len(),
        "queries": queries,
    })))
}

/// Aggregated capability catalog. No auth.
async fn get_capabilities<S>(State(service): State<Arc<S>>) -> Json<crate::orchestrator::CapabilityCatalog>
where
    S: GatewayApi,
{
    Json(service.capabilities())
}

/// Health envelope. 200 while healthy or degraded, 503 when unhealthy. No auth.
async fn get_health<S>(State(service): State<Arc<S>>) -> Response
where
    S: GatewayApi,
{
    let report = service.health().await;
    let status = if report.status == HealthStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (status, Json(report)).into_response()
}

/// Gateway counters plus the live job count.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<crate::jobs::GatewaySnapshot>
where
    S: GatewayApi,
{
    Json(service.snapshot().await)
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "submit",
                method: "POST",
                path: "/queries",
                description: "Submit a multipart query (text_query, user_id, files). Returns 202 with { \"queryId\": string, \"estimatedTime\": string }.",
            },
            CommandDescriptor {
                name: "status",
                method: "GET",
                path: "/queries/{id}/status",
                description: "Poll a submitted query. 202 while processing, 200 with the result once finished. Requires the x-user-id header.",
            },
            CommandDescriptor {
                name: "delete",
                method: "DELETE",
                path: "/queries/{id}",
                description: "Remove a query record you own. Requires the x-user-id header.",
            },
            CommandDescriptor {
                name: "history",
                method: "GET",
                path: "/history/{user_id}",
                description: "Return your most recent queries, newest first. Requires a matching x-user-id header.",
            },
            CommandDescriptor {
                name: "capabilities",
                method: "GET",
                path: "/system/capabilities",
                description: "Aggregated capability catalog across all registered handlers.",
            },
            CommandDescriptor {
                name: "health",
                method: "GET",
                path: "/system/health",
                description: "Per-handler availability and an overall healthy/degraded/unhealthy status.",
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Gateway counters useful for observability dashboards.",
            },
        ],
    })
}

/// Fields pulled out of a multipart submission, uploads already staged.
struct StagedSubmission {
    text_query: Option<String>,
    user_id: Option<String>,
    files: Vec<FileDescriptor>,
}

/// Drain the multipart stream, staging each upload under a unique name.
///
/// On any mid-stream error the files staged so far are removed before the
/// error propagates.
async fn stage_submission(mut multipart: Multipart) -> Result<StagedSubmission, ApiError> {
    let upload_dir = PathBuf::from(&get_config().upload_dir);
    if let Err(error) = tokio::fs::create_dir_all(&upload_dir).await {
        return Err(ApiError::Internal(format!(
            "failed to create upload directory: {error}"
        )));
    }

    let mut submission = StagedSubmission {
        text_query: None,
        user_id: None,
        files: Vec::new(),
    };

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(error) => {
                remove_staged(&submission.files).await;
                return Err(ApiError::Validation(format!(
                    "malformed multipart body: {error}"
                )));
            }
        };

        match field.name() {
            Some("text_query") => match field.text().await {
                Ok(text) => submission.text_query = Some(text),
                Err(error) => {
                    remove_staged(&submission.files).await;
                    return Err(ApiError::Validation(format!(
                        "unreadable text_query field: {error}"
                    )));
                }
            },
            Some("user_id") => match field.text().await {
                Ok(user) => submission.user_id = Some(user),
                Err(error) => {
                    remove_staged(&submission.files).await;
                    return Err(ApiError::Validation(format!(
                        "unreadable user_id field: {error}"
                    )));
                }
            },
            Some("files") => {
                let filename = sanitize_filename(field.file_name().unwrap_or("upload"));
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = match field.bytes().await {
                    Ok(bytes) => bytes,
                    Err(error) => {
                        remove_staged(&submission.files).await;
                        return Err(ApiError::TooLarge(format!(
                            "failed to read upload {filename}: {error}"
                        )));
                    }
                };

                let staged_path = upload_dir.join(format!("{}_{filename}", Uuid::new_v4()));
                if let Err(error) = tokio::fs::write(&staged_path, &bytes).await {
                    remove_staged(&submission.files).await;
                    return Err(ApiError::Internal(format!(
                        "failed to stage upload {filename}: {error}"
                    )));
                }
                tracing::debug!(
                    file = %filename,
                    staged = %staged_path.display(),
                    bytes = bytes.len(),
                    "Staged upload"
                );
                submission.files.push(FileDescriptor {
                    filename,
                    mime_type,
                    size_bytes: bytes.len() as u64,
                    storage_path: staged_path,
                });
            }
            _ => {}
        }
    }

    Ok(submission)
}

/// Keep only the final path component of a client-supplied filename.
fn sanitize_filename(raw: &str) -> String {
    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();
    if name.is_empty() { "upload".to_string() } else { name }
}

/// Remove files staged for a submission that never became a job.
async fn remove_staged(files: &[FileDescriptor]) {
    for file in files {
        if let Err(error) = tokio::fs::remove_file(&file.storage_path).await {
            tracing::warn!(
                path = %file.storage_path.display(),
                error = %error,
                "Failed to remove staged upload"
            );
        }
    }
}

fn caller_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn require_caller(headers: &HeaderMap) -> Result<String, ApiError> {
    caller_header(headers)
        .ok_or_else(|| ApiError::Forbidden("Missing x-user-id header".into()))
}

/// API failure mapped to an HTTP status and a uniform error envelope.
enum ApiError {
    Validation(String),
    Forbidden(String),
    NotFound(String),
    TooLarge(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Validation(message) => (StatusCode::BAD_REQUEST, message),
            Self::Forbidden(message) => (StatusCode::FORBIDDEN, message),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message),
            Self::TooLarge(message) => (StatusCode::PAYLOAD_TOO_LARGE, message),
            Self::Internal(message) => {
                tracing::error!(error = %message, "Internal API failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

impl From<SubmitError> for ApiError {
    fn from(error: SubmitError) -> Self {
        match error {
            SubmitError::EmptySubmission => Self::Validation(error.to_string()),
            SubmitError::TooManyFiles { .. } | SubmitError::FileTooLarge { .. } => {
                Self::TooLarge(error.to_string())
            }
        }
    }
}

impl From<JobAccessError> for ApiError {
    fn from(error: JobAccessError) -> Self {
        match error {
            JobAccessError::NotFound => Self::NotFound(error.to_string()),
            JobAccessError::Forbidden => Self::Forbidden(error.to_string()),
        }
    }
}
