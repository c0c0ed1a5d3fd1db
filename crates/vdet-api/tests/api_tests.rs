//! API integration tests.
//!
//! The router is driven with `oneshot` over an in-process dispatcher whose
//! runners return fixed scores, so no model weights are needed.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::ConnectInfo;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use vdet_api::auth::hash_password;
use vdet_api::{create_router, ApiConfig, AppState, AuthConfig};
use vdet_inference::{DispatcherConfig, InferenceDispatcher, InferenceError, InferenceResult, ModelRunner};
use vdet_media::{AnnotationRenderer, ClipTensors, FrameSize, MediaResult, SamplerConfig};
use vdet_models::{ModelKind, Role, Segment};

const BOUNDARY: &str = "vdet-test-boundary";

struct FixedRunner {
    kind: ModelKind,
    result: Result<f32, String>,
}

impl ModelRunner for FixedRunner {
    fn kind(&self) -> ModelKind {
        self.kind
    }

    fn predict(&self, _tensors: &ClipTensors) -> InferenceResult<f32> {
        self.result.clone().map_err(InferenceError::runtime)
    }
}

struct NoopRenderer;

impl AnnotationRenderer for NoopRenderer {
    fn render(&self, source: &Path, _violent: &[Segment]) -> MediaResult<PathBuf> {
        Ok(vdet_media::annotated_output_path(Path::new("annotated"), source))
    }
}

struct TestApp {
    router: Router,
    state: AppState,
    _dirs: TempDir,
}

impl TestApp {
    fn with_runners(runners: Vec<FixedRunner>) -> Self {
        let dirs = tempfile::tempdir().unwrap();
        let config = ApiConfig {
            temp_dir: dirs.path().join("uploads"),
            annotated_dir: dirs.path().join("annotated"),
            ..Default::default()
        };
        std::fs::create_dir_all(&config.temp_dir).unwrap();
        std::fs::create_dir_all(&config.annotated_dir).unwrap();

        let dispatcher_config = DispatcherConfig {
            sampler: SamplerConfig {
                frame_size: FrameSize {
                    width: 16,
                    height: 16,
                },
                max_frames: 4,
            },
            ..Default::default()
        };
        let mut dispatcher = InferenceDispatcher::new(dispatcher_config, Arc::new(NoopRenderer));
        for runner in runners {
            dispatcher = dispatcher.with_runner(Arc::new(runner));
        }

        let state = AppState::with_dispatcher(
            config,
            AuthConfig::with_secret("integration-test-secret-long-enough"),
            dispatcher,
        );
        let router = create_router(state.clone(), None);
        Self {
            router,
            state,
            _dirs: dirs,
        }
    }

    fn scoring(probability: f32) -> Self {
        Self::with_runners(
            ModelKind::ALL
                .iter()
                .map(|&kind| FixedRunner {
                    kind,
                    result: Ok(probability),
                })
                .collect(),
        )
    }

    fn add_user(&self, email: &str, password: &str, role: Role) {
        let hash = hash_password(password).unwrap();
        self.state.users.create(email, &hash, role).unwrap();
    }

    fn upload_count(&self) -> usize {
        std::fs::read_dir(&self.state.config.temp_dir).unwrap().count()
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body.to_vec())
    }

    async fn json(&self, request: Request<Body>) -> (StatusCode, Value) {
        let (status, _, body) = self.send(request).await;
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, value)
    }

    async fn token(&self, email: &str, password: &str) -> String {
        let (status, body) = self
            .json(
                Request::builder()
                    .method("POST")
                    .uri("/token")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(format!("username={email}&password={password}")))
                    .unwrap(),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["access_token"].as_str().unwrap().to_string()
    }
}

fn multipart_body(model: Option<&str>, file: Option<(&str, &[u8])>) -> Body {
    let mut body = Vec::new();
    if let Some(model) = model {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"model\"\r\n\r\n{model}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((name, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\nContent-Type: video/mp4\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    Body::from(body)
}

fn predict_request(model: Option<&str>, file: Option<(&str, &[u8])>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/predict")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(multipart_body(model, file))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_with_token(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::scoring(0.1);
    let (status, body) = app.json(get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.json(get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_ready_reports_loaded_models() {
    let app = TestApp::scoring(0.1);
    let (status, body) = app.json(get("/ready")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["models"].as_array().unwrap().len(), 3);

    let app = TestApp::with_runners(vec![FixedRunner {
        kind: ModelKind::I3d,
        result: Ok(0.1),
    }]);
    let (status, body) = app.json(get("/ready")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "not_ready");
}

#[tokio::test]
async fn test_security_headers_and_request_id() {
    let app = TestApp::scoring(0.1);
    let (_, headers, _) = app
        .send(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "req-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(headers.get("x-request-id").unwrap(), "req-123");
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
}

#[tokio::test]
async fn test_predict_unsupported_model() {
    let app = TestApp::scoring(0.9);
    let (status, body) = app
        .json(predict_request(Some("foo"), Some(("clip.mp4", b"not a video"))))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Model not supported: foo");
    assert_eq!(app.upload_count(), 0);
}

#[tokio::test]
async fn test_predict_missing_fields() {
    let app = TestApp::scoring(0.9);
    let (status, _) = app.json(predict_request(Some("i3d"), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .json(predict_request(None, Some(("clip.mp4", b"bytes"))))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.upload_count(), 0);
}

#[tokio::test]
async fn test_predict_single_stream_response() {
    let app = TestApp::scoring(0.9);
    let (status, body) = app
        .json(predict_request(Some("cnn_lstm"), Some(("fight.mp4", b"not a video"))))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["filename"], "fight.mp4");
    assert!((body["probability"].as_f64().unwrap() - 0.9).abs() < 1e-6);
    assert_eq!(body["is_violent"], true);
    assert!(body.get("predictions").is_none());
    assert_eq!(app.upload_count(), 0);
}

#[tokio::test]
async fn test_predict_threshold_is_strict() {
    let app = TestApp::scoring(0.5);
    let (status, body) = app
        .json(predict_request(Some("cnn_lstm"), Some(("calm.mp4", b"x"))))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_violent"], false);
}

#[tokio::test]
async fn test_predict_two_stream_on_undecodable_video() {
    let app = TestApp::scoring(0.9);
    let (status, body) = app
        .json(predict_request(
            Some("i3d_two_streams"),
            Some(("empty.mp4", b"not a video")),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["filename"], "empty.mp4");
    let predictions = body["predictions"].as_array().unwrap();
    assert_eq!(predictions.len(), 1);
    assert!(predictions[0]
        .as_str()
        .unwrap()
        .starts_with("[0.0s, 0.0s] score : 0.900"));
    assert!(body["annotated_video_path"].is_null());
    assert_eq!(app.upload_count(), 0);
}

#[tokio::test]
async fn test_predict_model_failure_returns_traceback() {
    let app = TestApp::with_runners(vec![FixedRunner {
        kind: ModelKind::CnnLstm,
        result: Err("corrupt tensor".to_string()),
    }]);
    let (status, body) = app
        .json(predict_request(Some("cnn_lstm"), Some(("clip.mp4", b"x"))))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Inference failed for segment 0"));
    assert!(body["traceback"]
        .as_str()
        .unwrap()
        .contains("caused by: Model runtime error: corrupt tensor"));
    assert_eq!(app.upload_count(), 0);
}

fn get_from(uri: &str, peer: [u8; 4], forwarded_for: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .uri(uri)
        .extension(ConnectInfo(SocketAddr::from((peer, 40000))));
    if let Some(ip) = forwarded_for {
        builder = builder.header("x-forwarded-for", ip);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_rate_limit_keys_on_peer_address() {
    let app = TestApp::scoring(0.1);
    let peer = [203, 0, 113, 7];

    let mut limited = None;
    for _ in 0..50 {
        let (status, headers, body) = app.send(get_from("/annotated/none.mp4", peer, None)).await;
        if status == StatusCode::TOO_MANY_REQUESTS {
            limited = Some((headers, body));
            break;
        }
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
    let (headers, body) = limited.expect("peer was never rate limited");
    assert_eq!(headers[header::RETRY_AFTER], "1");
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["detail"], "Rate limited");

    let (status, _, _) = app
        .send(get_from("/annotated/none.mp4", peer, Some("198.51.100.99")))
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    let (status, _, _) = app
        .send(get_from("/annotated/none.mp4", [198, 51, 100, 1], None))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_annotated_video_served() {
    let app = TestApp::scoring(0.1);
    std::fs::write(
        app.state.config.annotated_dir.join("abc_annotated.mp4"),
        b"mp4-bytes",
    )
    .unwrap();

    let (status, headers, body) = app.send(get("/annotated/abc_annotated.mp4")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "video/mp4");
    assert_eq!(body, b"mp4-bytes");
}

#[tokio::test]
async fn test_annotated_video_missing_or_traversal() {
    let app = TestApp::scoring(0.1);
    let (status, _) = app.json(get("/annotated/missing.mp4")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.json(get("/annotated/..%2Fsecret.mp4")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_token_flow() {
    let app = TestApp::scoring(0.1);
    app.add_user("agent@example.com", "s3cret", Role::User);

    let token = app.token("agent@example.com", "s3cret").await;
    let (status, body) = app.json(get_with_token("/users/me/", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "agent@example.com");
    assert_eq!(body["role"], "user");

    let (status, body) = app.json(get_with_token("/api/protected", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "agent@example.com");
}

#[tokio::test]
async fn test_token_rejects_bad_credentials() {
    let app = TestApp::scoring(0.1);
    app.add_user("agent@example.com", "s3cret", Role::User);

    let (status, headers, _) = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/token")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("username=agent@example.com&password=wrong"))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(headers.get(header::WWW_AUTHENTICATE).unwrap(), "Bearer");

    let (status, _) = app.json(get("/users/me/")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.json(get_with_token("/users/me/", "garbage")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_user_management() {
    let app = TestApp::scoring(0.1);
    app.add_user("admin@example.com", "adminpw", Role::Admin);
    app.add_user("agent@example.com", "agentpw", Role::User);

    let agent = app.token("agent@example.com", "agentpw").await;
    let (status, _) = app.json(get_with_token("/admin/users", &agent)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.json(get_with_token("/admin/users/me", &agent)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "agent@example.com");

    let admin = app.token("admin@example.com", "adminpw").await;
    let create = |email: &str| {
        Request::builder()
            .method("POST")
            .uri("/admin/users")
            .header(header::AUTHORIZATION, format!("Bearer {admin}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                serde_json::json!({ "email": email, "password": "pw" }).to_string(),
            ))
            .unwrap()
    };

    let (status, body) = app.json(create("new@example.com")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "user");
    let new_id = body["id"].as_i64().unwrap();

    let (status, _) = app.json(create("new@example.com")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.json(create("not-an-email")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.json(get_with_token("/admin/users", &admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 3);

    let delete = |id: i64| {
        Request::builder()
            .method("DELETE")
            .uri(format!("/admin/users/{id}"))
            .header(header::AUTHORIZATION, format!("Bearer {admin}"))
            .body(Body::empty())
            .unwrap()
    };
    let (status, _) = app.json(delete(new_id)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.json(delete(new_id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_alerts_require_auth_and_keep_order() {
    let app = TestApp::scoring(0.1);
    app.add_user("agent@example.com", "agentpw", Role::User);

    let alert = |id: i64, token: Option<&str>| {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/send_alert_email")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder
            .body(Body::from(
                serde_json::json!({
                    "id": id,
                    "dateTime": "2025-05-01T10:00:00",
                    "cameraName": "Hall",
                    "violenceType": "fight",
                    "confidenceScore": 91
                })
                .to_string(),
            ))
            .unwrap()
    };

    let (status, _) = app.json(alert(1, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = app.token("agent@example.com", "agentpw").await;
    for id in [7, 8] {
        let (status, body) = app.json(alert(id, Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["message"].is_string());
    }

    let (status, body) = app.json(get_with_token("/alerts", &token)).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<i64> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![7, 8]);
    assert_eq!(body[0]["cameraName"], "Hall");
}
