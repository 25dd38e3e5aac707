use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use tokio::{net::TcpListener, sync::oneshot, sync::Mutex};

use super::*;

fn sample_image() -> ImageUpload {
    ImageUpload {
        filename: "selfie.jpg".to_string(),
        mime_type: Some("image/jpeg".to_string()),
        bytes: vec![0xff, 0xd8, 0xff, 0xe0],
    }
}

async fn spawn_stub_server(app: Router) -> Result<String> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

#[derive(Debug)]
struct CapturedPredict {
    field_name: String,
    filename: String,
    bytes: Vec<u8>,
    range_hint: Option<String>,
}

#[derive(Clone)]
struct PredictServerState {
    tx: Arc<Mutex<Option<oneshot::Sender<CapturedPredict>>>>,
    confidence: f64,
}

async fn handle_predict(
    State(state): State<PredictServerState>,
    Query(query): Query<HashMap<String, String>>,
    mut multipart: Multipart,
) -> Json<serde_json::Value> {
    let field = multipart
        .next_field()
        .await
        .expect("multipart field")
        .expect("one field");
    let captured = CapturedPredict {
        field_name: field.name().unwrap_or_default().to_string(),
        filename: field.file_name().unwrap_or_default().to_string(),
        bytes: field.bytes().await.expect("field bytes").to_vec(),
        range_hint: query.get("range_hint").cloned(),
    };
    if let Some(tx) = state.tx.lock().await.take() {
        let _ = tx.send(captured);
    }
    Json(serde_json::json!({
        "predicted_age": 34,
        "confidence": state.confidence,
        "age_group": "YoungAdult",
    }))
}

async fn spawn_predict_server(
    confidence: f64,
) -> Result<(String, oneshot::Receiver<CapturedPredict>)> {
    let (tx, rx) = oneshot::channel();
    let state = PredictServerState {
        tx: Arc::new(Mutex::new(Some(tx))),
        confidence,
    };
    let app = Router::new()
        .route("/predict", post(handle_predict))
        .with_state(state);
    Ok((spawn_stub_server(app).await?, rx))
}

#[tokio::test]
async fn predict_uploads_multipart_image_field() {
    let (server_url, captured_rx) = spawn_predict_server(82.0).await.expect("spawn server");
    let client = HttpPredictionClient::new(server_url);

    let prediction = client
        .predict(&sample_image(), None)
        .await
        .expect("predict");
    assert_eq!(prediction.predicted_age, 34);
    assert_eq!(prediction.confidence, 82.0);

    let captured = captured_rx.await.expect("captured upload");
    assert_eq!(captured.field_name, "image");
    assert_eq!(captured.filename, "selfie.jpg");
    assert_eq!(captured.bytes, sample_image().bytes);
    assert_eq!(captured.range_hint, None);
}

#[tokio::test]
async fn predict_normalizes_ratio_confidence() {
    let (server_url, _captured_rx) = spawn_predict_server(0.82).await.expect("spawn server");
    let client = HttpPredictionClient::new(server_url);

    let prediction = client
        .predict(&sample_image(), None)
        .await
        .expect("predict");
    assert!((prediction.confidence - 82.0).abs() < 0.001);
}

#[tokio::test]
async fn predict_passes_range_hint_as_query() {
    let (server_url, captured_rx) = spawn_predict_server(82.0).await.expect("spawn server");
    let client = HttpPredictionClient::new(server_url);

    let hint: AgeRange = "25-34".parse().expect("range");
    client
        .predict(&sample_image(), Some(hint))
        .await
        .expect("predict");

    let captured = captured_rx.await.expect("captured upload");
    assert_eq!(captured.range_hint.as_deref(), Some("25-34"));
}

#[tokio::test]
async fn predict_treats_detail_payload_as_failure() {
    let app = Router::new().route(
        "/predict",
        post(|| async {
            Json(serde_json::json!({ "detail": "no face detected in the image" }))
        }),
    );
    let server_url = spawn_stub_server(app).await.expect("spawn server");
    let client = HttpPredictionClient::new(server_url);

    let err = client
        .predict(&sample_image(), None)
        .await
        .expect_err("must fail");
    assert!(err.to_string().contains("no face detected"));
}

#[tokio::test]
async fn predict_surfaces_http_failure_body() {
    let app = Router::new().route(
        "/predict",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "feature extraction error") }),
    );
    let server_url = spawn_stub_server(app).await.expect("spawn server");
    let client = HttpPredictionClient::new(server_url);

    let err = client
        .predict(&sample_image(), None)
        .await
        .expect_err("must fail");
    let err_text = err.to_string();
    assert!(err_text.contains("500"), "unexpected error: {err_text}");
    assert!(err_text.contains("feature extraction error"));
}

#[derive(Clone)]
struct FeedbackServerState {
    tx: Arc<Mutex<Option<oneshot::Sender<FeedbackRecord>>>>,
}

async fn handle_feedback(
    State(state): State<FeedbackServerState>,
    Json(record): Json<FeedbackRecord>,
) -> Json<serde_json::Value> {
    if let Some(tx) = state.tx.lock().await.take() {
        let _ = tx.send(record);
    }
    Json(serde_json::json!({ "status": "ok" }))
}

#[tokio::test]
async fn submit_feedback_posts_the_record_body() {
    let (tx, rx) = oneshot::channel();
    let state = FeedbackServerState {
        tx: Arc::new(Mutex::new(Some(tx))),
    };
    let app = Router::new()
        .route("/feedback", post(handle_feedback))
        .with_state(state);
    let server_url = spawn_stub_server(app).await.expect("spawn server");
    let client = HttpPredictionClient::new(server_url);

    let record = FeedbackRecord {
        predicted_age: 34,
        actual_age: 28,
        is_correct: false,
        confidence: 82.0,
        timestamp: Utc::now(),
    };
    client.submit_feedback(&record).await.expect("feedback");

    let received = rx.await.expect("record");
    assert_eq!(received.predicted_age, 34);
    assert_eq!(received.actual_age, 28);
    assert!(!received.is_correct);
}

#[tokio::test]
async fn submit_feedback_propagates_server_rejection() {
    let app = Router::new().route(
        "/feedback",
        post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let server_url = spawn_stub_server(app).await.expect("spawn server");
    let client = HttpPredictionClient::new(server_url);

    let record = FeedbackRecord {
        predicted_age: 34,
        actual_age: 34,
        is_correct: true,
        confidence: 82.0,
        timestamp: Utc::now(),
    };
    client
        .submit_feedback(&record)
        .await
        .expect_err("must fail");
}

#[tokio::test]
async fn notify_image_removed_hits_the_removal_endpoint() {
    let app = Router::new().route(
        "/remove-image",
        post(|| async { Json(serde_json::json!({ "status": "removed" })) }),
    );
    let server_url = spawn_stub_server(app).await.expect("spawn server");
    let client = HttpPredictionClient::new(server_url);

    client.notify_image_removed().await.expect("removal ack");
}
