//! HTTP-level tests against the router with stub collaborators.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use detox_app::{build_router, AppState};
use detox_core::{
    CategoryScores, Classifier, ClassifierHandle, DecisionPipeline, DetoxError, NarrationStore,
    NarratorHandle, PipelineConfig, SilentNarrator, StubClassifier, StubTranscriber,
    TranscriberHandle,
};
use serde_json::Value;
use tower::util::ServiceExt; // for `oneshot`

const BOUNDARY: &str = "detox-test-boundary";

struct TestApp {
    router: Router,
    dir: tempfile::TempDir,
}

fn setup_app_with<C: Classifier>(classifier: C, timeout: Duration) -> TestApp {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(NarrationStore::new(dir.path().join("narration")).expect("store"));
    let pipeline = Arc::new(DecisionPipeline::new(
        PipelineConfig::default(),
        TranscriberHandle::new(StubTranscriber::new()),
        ClassifierHandle::new(classifier),
        NarratorHandle::new(SilentNarrator::new(50)),
        store,
    ));
    let state = AppState::new(pipeline, timeout, dir.path().join("uploads"));
    TestApp {
        router: build_router(state),
        dir,
    }
}

fn setup_app() -> TestApp {
    setup_app_with(StubClassifier::new(), Duration::from_secs(30))
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a [u8]),
}

fn multipart_request(parts: &[Part<'_>]) -> Request<Body> {
    let mut body: Vec<u8> = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"clip.wav\"\r\n\
                         Content-Type: audio/wav\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/analyze")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

fn tone_wav() -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..16_000 {
            let s = (i as f32 * 440.0 * std::f32::consts::TAU / 16_000.0).sin();
            writer.write_sample((s * 8_000.0) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

// =============================================================================
// Static surface
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup_app();
    let response = app.router.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "detox");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_ui_and_script_are_served() {
    let app = setup_app();
    let index = app.router.clone().oneshot(get("/")).await.unwrap();
    assert_eq!(index.status(), StatusCode::OK);
    let html = axum::body::to_bytes(index.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&html).contains("Run Analysis"));

    let js = app.router.oneshot(get("/static/app.js")).await.unwrap();
    assert_eq!(js.status(), StatusCode::OK);
    assert_eq!(
        js.headers()[header::CONTENT_TYPE],
        "application/javascript"
    );
    let script = axum::body::to_bytes(js.into_body(), usize::MAX).await.unwrap();
    let script = String::from_utf8_lossy(&script);
    // One-shot narration is fetched once and replayed from a blob.
    assert!(script.contains("URL.createObjectURL(await res.blob())"));
    assert!(!script.contains("els.voice.src = `/api/narration/"));
    // Bar highlighting follows the server's threshold.
    assert!(script.contains("body.threshold"));
}

// =============================================================================
// Analysis
// =============================================================================

#[tokio::test]
async fn test_benign_text_hides_breakdown() {
    let app = setup_app();
    let response = app
        .router
        .oneshot(multipart_request(&[Part::Text("text", "You are wonderful")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "✅ Non-Toxic");
    assert_eq!(body["verdict"], "nonToxic");
    assert_eq!(body["source"], "typed");
    assert_eq!(body["recognizedText"], "You are wonderful");
    assert_eq!(body["threshold"], 0.5);
    assert_eq!(body["narration"]["state"], "ready");
    assert_eq!(body["narration"]["format"], "wav");
    assert!(body.get("breakdown").is_none());
}

#[tokio::test]
async fn test_toxic_text_then_one_shot_narration() {
    let app = setup_app();
    let response = app
        .router
        .clone()
        .oneshot(multipart_request(&[Part::Text("text", "I will hurt you")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "🚩 Toxic");
    let breakdown = body["breakdown"].as_array().expect("breakdown");
    assert_eq!(breakdown.len(), 6);
    assert_eq!(breakdown[3]["category"], "threat");
    assert_eq!(breakdown[3]["label"], "⚠️ Threat");

    let id = body["narration"]["id"].as_str().expect("narration id");
    let uri = format!("/api/narration/{id}");

    let first = app.router.clone().oneshot(get(&uri)).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(first.headers()[header::CONTENT_TYPE], "audio/wav");
    let wav = axum::body::to_bytes(first.into_body(), usize::MAX).await.unwrap();
    assert!(wav.starts_with(b"RIFF"));

    let second = app.router.oneshot(get(&uri)).await.unwrap();
    assert_eq!(second.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_blank_form_is_no_input() {
    let app = setup_app();
    let response = app
        .router
        .oneshot(multipart_request(&[Part::Text("text", "   ")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "No input provided.");
    assert_eq!(body["narration"]["state"], "skipped");
    assert!(body.get("verdict").is_none());
    assert!(body.get("breakdown").is_none());
}

#[tokio::test]
async fn test_audio_upload_is_transcribed_and_cleaned_up() {
    let app = setup_app();
    let wav = tone_wav();
    let response = app
        .router
        .oneshot(multipart_request(&[
            Part::Text("text", ""),
            Part::File("audio", &wav),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["source"], "spoken");
    assert!(body["recognizedText"]
        .as_str()
        .expect("text")
        .starts_with("[stub: 16000 samples"));

    let leftovers = std::fs::read_dir(app.dir.path().join("uploads"))
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn test_corrupt_audio_is_no_input() {
    let app = setup_app();
    let response = app
        .router
        .oneshot(multipart_request(&[Part::File("audio", b"definitely not audio")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "No input provided.");
}

#[tokio::test]
async fn test_malformed_form_is_bad_request() {
    let app = setup_app();
    let request = Request::builder()
        .method("POST")
        .uri("/api/analyze")
        .header(header::CONTENT_TYPE, "multipart/form-data")
        .body(Body::from("garbage"))
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

struct BrokenClassifier;

impl Classifier for BrokenClassifier {
    fn warm_up(&mut self) -> detox_core::Result<()> {
        Ok(())
    }

    fn classify(&mut self, _text: &str) -> detox_core::Result<CategoryScores> {
        Err(DetoxError::Inference("tensor shape mismatch".into()))
    }
}

#[tokio::test]
async fn test_inference_error_is_server_error() {
    let app = setup_app_with(BrokenClassifier, Duration::from_secs(30));
    let response = app
        .router
        .oneshot(multipart_request(&[Part::Text("text", "hello")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = extract_json(response.into_body()).await;
    assert!(body["error"]
        .as_str()
        .expect("error")
        .contains("tensor shape mismatch"));
}

struct SlowClassifier;

impl Classifier for SlowClassifier {
    fn warm_up(&mut self) -> detox_core::Result<()> {
        Ok(())
    }

    fn classify(&mut self, _text: &str) -> detox_core::Result<CategoryScores> {
        std::thread::sleep(Duration::from_millis(500));
        CategoryScores::from_slice(&[0.0; 6])
    }
}

#[tokio::test]
async fn test_slow_pipeline_times_out() {
    let app = setup_app_with(SlowClassifier, Duration::from_millis(50));
    let response = app
        .router
        .oneshot(multipart_request(&[Part::Text("text", "hello")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
}

// =============================================================================
// Narration + diagnostics
// =============================================================================

#[tokio::test]
async fn test_unknown_narration_is_not_found() {
    let app = setup_app();
    let uri = format!("/api/narration/{}", uuid::Uuid::new_v4());
    let response = app.router.oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_narration_id_is_bad_request() {
    let app = setup_app();
    let response = app
        .router
        .oneshot(get("/api/narration/not-a-uuid"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_diagnostics_track_requests() {
    let app = setup_app();
    let response = app
        .router
        .clone()
        .oneshot(multipart_request(&[Part::Text("text", "You are wonderful")]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.router.oneshot(get("/api/diagnostics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["pipeline"]["requests"], 1);
    assert_eq!(body["pipeline"]["classifications"], 1);
    assert_eq!(body["pendingNarrations"], 1);
    assert_eq!(body["latency"]["totalMs"]["count"], 1);
    assert_eq!(body["latency"]["transcribeMs"]["count"], 0);
}
