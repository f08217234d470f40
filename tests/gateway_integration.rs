//! End-to-end tests driving the HTTP router against a real job manager with
//! mocked processing backends.

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use httpmock::{Method::POST, MockServer};
use modalgate::classify::Classifier;
use modalgate::config::{CONFIG, Config, InferenceProvider};
use modalgate::handlers::{
    AudioHandler, DocumentHandler, HandlerSettings, ImageHandler, VideoHandler,
};
use modalgate::jobs::{Job, JobManager, JobStatus, SubmitLimits};
use modalgate::orchestrator::Orchestrator;
use modalgate::registry::HandlerRegistry;
use modalgate::{api, backend::BackendClient, classify::HandlerKind};
use serde_json::{Value, json};
use std::sync::{Arc, Once};
use std::time::Duration;
use tower::ServiceExt;

const BOUNDARY: &str = "gateway-it-boundary";

fn ensure_config() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let upload_dir = std::env::temp_dir().join("modalgate-it-uploads");
        let _ = CONFIG.set(Config {
            document_backend_url: "http://127.0.0.1:1".into(),
            image_backend_url: "http://127.0.0.1:1".into(),
            video_backend_url: "http://127.0.0.1:1".into(),
            audio_backend_url: "http://127.0.0.1:1".into(),
            upload_dir: upload_dir.display().to_string(),
            job_retention_hours: 24,
            job_sweep_interval_secs: 3600,
            max_upload_files: 10,
            max_upload_bytes: 1_048_576,
            backend_timeout_secs: 5,
            local_fallback_enabled: false,
            history_limit: 50,
            inference_provider: InferenceProvider::None,
            inference_model: None,
            ollama_url: None,
            server_port: None,
        });
    });
}

/// Real service wired so every modality backend points at the mock server.
fn build_gateway(server: &MockServer) -> (Router, Arc<JobManager>) {
    ensure_config();
    let settings = HandlerSettings {
        local_fallback: false,
        max_file_bytes: 1_048_576,
    };
    let backend = |modality: HandlerKind| {
        BackendClient::new(modality, &server.base_url(), Duration::from_secs(5))
            .expect("backend client")
    };

    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(DocumentHandler::with_backend(
        backend(HandlerKind::Document),
        settings,
    )));
    registry.register(Arc::new(ImageHandler::with_backend(
        backend(HandlerKind::Image),
        settings,
    )));
    registry.register(Arc::new(VideoHandler::with_backend(
        backend(HandlerKind::Video),
        settings,
    )));
    registry.register(Arc::new(AudioHandler::with_backend(
        backend(HandlerKind::Audio),
        settings,
    )));

    let orchestrator = Orchestrator::new(Classifier::new(None), registry);
    let manager = Arc::new(JobManager::new(
        orchestrator,
        SubmitLimits {
            max_files: 10,
            max_file_bytes: 1_048_576,
            history_limit: 50,
        },
    ));
    (api::create_router(Arc::clone(&manager)), manager)
}

struct UploadPart {
    filename: &'static str,
    mime: &'static str,
    bytes: &'static [u8],
}

fn multipart_submit(user_id: &str, text: Option<&str>, uploads: &[UploadPart]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"user_id\"\r\n\r\n{user_id}\r\n")
            .as_bytes(),
    );
    if let Some(text) = text {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"text_query\"\r\n\r\n{text}\r\n"
            )
            .as_bytes(),
        );
    }
    for upload in uploads {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; \
                 filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                upload.filename, upload.mime
            )
            .as_bytes(),
        );
        body.extend_from_slice(upload.bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/queries")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request")
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    serde_json::from_slice(&bytes).expect("json body")
}

async fn submit(app: &Router, request: Request<Body>) -> Value {
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    body_json(response).await
}

/// Poll the status endpoint until the job leaves PROCESSING.
async fn await_terminal(app: &Router, query_id: &str, user: &str) -> Value {
    for _ in 0..200 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/queries/{query_id}/status"))
                    .header("x-user-id", user)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        let status = response.status();
        let json = body_json(response).await;
        match status {
            StatusCode::ACCEPTED => tokio::time::sleep(Duration::from_millis(10)).await,
            StatusCode::OK => return json,
            other => panic!("unexpected poll status {other}: {json}"),
        }
    }
    panic!("job {query_id} never reached a terminal state");
}

#[tokio::test]
async fn audio_submission_routes_to_the_audio_handler() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/process-audio");
            then.status(200).json_body(json!({
                "analysis": { "transcript": "hello from the voice memo" }
            }));
        })
        .await;
    let (app, _manager) = build_gateway(&server);

    let receipt = submit(
        &app,
        multipart_submit(
            "user-a",
            None,
            &[UploadPart {
                filename: "memo.mp3",
                mime: "audio/mpeg",
                bytes: b"ID3fakeaudio",
            }],
        ),
    )
    .await;

    assert_eq!(receipt["success"], true);
    assert!(
        receipt["estimatedTime"]
            .as_str()
            .is_some_and(|estimate| estimate.contains("15-60"))
    );

    let query_id = receipt["queryId"].as_str().expect("queryId");
    let uuid_shape = regex::Regex::new(
        r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$",
    )
    .expect("regex");
    assert!(uuid_shape.is_match(query_id), "opaque UUID job id");

    let view = await_terminal(&app, query_id, "user-a").await;

    assert_eq!(view["status"], "COMPLETED");
    let result = &view["result"];
    assert_eq!(result["classification"]["agentType"], "audio");
    assert_eq!(result["classification"]["classification"], "AUDIO");
    assert_eq!(result["agentUsed"], "AudioHandler");
    assert_eq!(result["files"][0]["status"], "processed");
}

#[tokio::test]
async fn text_only_submission_is_handled_as_text() {
    let server = MockServer::start_async().await;
    let (app, _manager) = build_gateway(&server);

    let receipt = submit(&app, multipart_submit("user-b", Some("hello"), &[])).await;
    assert!(
        receipt["estimatedTime"]
            .as_str()
            .is_some_and(|estimate| estimate.contains("5-15"))
    );

    let query_id = receipt["queryId"].as_str().expect("queryId");
    let view = await_terminal(&app, query_id, "user-b").await;

    let result = &view["result"];
    assert_eq!(result["classification"]["classification"], "TEXT");
    assert_eq!(result["classification"]["agentType"], "document");
    assert!((result["confidence"].as_f64().expect("confidence") - 0.8).abs() < 1e-9);
    assert_eq!(result["success"], true);
}

#[tokio::test]
async fn per_file_failures_do_not_abort_siblings() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/process-image")
                .body_contains("broken.png");
            then.status(500).body("vision model offline");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/process-image")
                .body_contains("fine.png");
            then.status(200)
                .json_body(json!({ "analysis": { "objects": ["tree"] } }));
        })
        .await;
    let (app, _manager) = build_gateway(&server);

    let receipt = submit(
        &app,
        multipart_submit(
            "user-c",
            None,
            &[
                UploadPart {
                    filename: "broken.png",
                    mime: "image/png",
                    bytes: b"\x89PNGbad",
                },
                UploadPart {
                    filename: "fine.png",
                    mime: "image/png",
                    bytes: b"\x89PNGok",
                },
            ],
        ),
    )
    .await;

    let query_id = receipt["queryId"].as_str().expect("queryId");
    let view = await_terminal(&app, query_id, "user-c").await;

    assert_eq!(view["status"], "COMPLETED");
    let files = view["result"]["files"].as_array().expect("files");
    let by_name = |name: &str| {
        files
            .iter()
            .find(|file| file["filename"] == name)
            .unwrap_or_else(|| panic!("no outcome for {name}"))
    };
    assert_eq!(by_name("broken.png")["status"], "error");
    assert!(
        by_name("broken.png")["error"]
            .as_str()
            .is_some_and(|error| !error.is_empty())
    );
    assert_eq!(by_name("fine.png")["status"], "processed");
}

#[tokio::test]
async fn jobs_never_leak_across_users() {
    let server = MockServer::start_async().await;
    let (app, _manager) = build_gateway(&server);

    let receipt = submit(&app, multipart_submit("alice", Some("my notes"), &[])).await;
    let query_id = receipt["queryId"].as_str().expect("queryId");
    await_terminal(&app, query_id, "alice").await;

    let as_mallory = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/queries/{query_id}"))
                .header("x-user-id", "mallory")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(as_mallory.status(), StatusCode::FORBIDDEN);

    let mallory_history = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/history/mallory")
                .header("x-user-id", "mallory")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(mallory_history.status(), StatusCode::OK);
    let json = body_json(mallory_history).await;
    assert_eq!(json["count"], 0);

    let alice_history = app
        .oneshot(
            Request::builder()
                .uri("/history/alice")
                .header("x-user-id", "alice")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    let json = body_json(alice_history).await;
    assert_eq!(json["count"], 1);
    assert_eq!(json["queries"][0]["queryId"], query_id);
}

#[tokio::test]
async fn unknown_jobs_are_404() {
    let server = MockServer::start_async().await;
    let (app, _manager) = build_gateway(&server);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/queries/no-such-job")
                .header("x-user-id", "user-a")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn empty_submissions_are_rejected_with_400() {
    let server = MockServer::start_async().await;
    let (app, _manager) = build_gateway(&server);

    let response = app
        .oneshot(multipart_submit("user-a", None, &[]))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn owner_can_delete_a_finished_job() {
    let server = MockServer::start_async().await;
    let (app, _manager) = build_gateway(&server);

    let receipt = submit(&app, multipart_submit("user-d", Some("hello"), &[])).await;
    let query_id = receipt["queryId"].as_str().expect("queryId");
    await_terminal(&app, query_id, "user-d").await;

    let deleted = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::DELETE)
                .uri(format!("/queries/{query_id}"))
                .header("x-user-id", "user-d")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(deleted.status(), StatusCode::OK);

    let gone = app
        .oneshot(
            Request::builder()
                .uri(format!("/queries/{query_id}"))
                .header("x-user-id", "user-d")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn retention_sweep_removes_only_expired_jobs() {
    let server = MockServer::start_async().await;
    let (_app, manager) = build_gateway(&server);

    let mut expired = Job::new("job-expired".into(), "user-e".into(), "5-15 seconds");
    expired.created_at = time::OffsetDateTime::now_utc() - Duration::from_secs(25 * 3600);
    manager.store().insert(expired).await;
    manager
        .store()
        .insert(Job::new("job-fresh".into(), "user-e".into(), "5-15 seconds"))
        .await;

    let removed = manager
        .store()
        .sweep_expired(Duration::from_secs(24 * 3600))
        .await;

    assert_eq!(removed, 1);
    assert!(manager.store().view("job-fresh", "user-e").await.is_ok());
    assert!(manager.store().view("job-expired", "user-e").await.is_err());
}

#[tokio::test]
async fn capability_catalog_covers_all_four_handlers() {
    let server = MockServer::start_async().await;
    let (app, _manager) = build_gateway(&server);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/system/capabilities")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let handlers = json["supportedHandlers"].as_array().expect("handlers");
    assert_eq!(handlers.len(), 4);
    for name in [
        "DocumentHandler",
        "ImageHandler",
        "VideoHandler",
        "AudioHandler",
    ] {
        assert!(handlers.iter().any(|handler| handler == name));
    }
}

#[tokio::test]
async fn health_reports_per_handler_availability() {
    // All four handlers share one mock server; its /health answers 200, so the
    // whole gateway reports healthy.
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(httpmock::Method::GET).path("/health");
            then.status(200).json_body(json!({ "status": "ok" }));
        })
        .await;
    let (app, _manager) = build_gateway(&server);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/system/health")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["handlers"].as_array().expect("handlers").len(), 4);
}
