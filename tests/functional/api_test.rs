//! Functional tests for the HTTP API

#[path = "../common/mod.rs"]
mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use common::{ScriptedGenerator, PNG_BYTES};
use diffusion_queue::api::routes::create_router;
use diffusion_queue::queue::JobQueue;
use diffusion_queue::response::base64;
use diffusion_queue::AppState;

fn create_test_app() -> (Router, Arc<JobQueue>) {
    let generator = ScriptedGenerator::new(Duration::from_millis(5));
    let queue = common::queue_with(generator);
    let app = create_router(Arc::new(AppState {
        queue: queue.clone(),
    }));
    (app, queue)
}

fn generate_body(prompt: &str, width: u32, backend: &str) -> Value {
    json!({
        "data": {
            "prompt": prompt,
            "width": width,
            "height": 512,
            "steps": 20,
            "seed": 7
        },
        "model": "runwayml/stable-diffusion-v1-5",
        "scheduler": "euler_a",
        "backend": backend
    })
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_generate_returns_base64_images() {
    let (app, queue) = create_test_app();

    let response = app
        .oneshot(post_json("/generate", &generate_body("a cat", 512, "primary")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["message"], "Job completed");
    assert!(body["time"].as_f64().unwrap() >= 0.0);

    let images = body["images"].as_array().unwrap();
    assert_eq!(images.len(), 1);
    let decoded = base64::decode(images[0].as_str().unwrap()).unwrap();
    assert_eq!(decoded, PNG_BYTES.to_vec());

    assert_eq!(queue.processed_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_generate_accepts_legacy_backend_name_and_data_urls() {
    let (app, _queue) = create_test_app();

    let mut body = generate_body("a dog", 512, "PyTorch");
    body["response_format"] = json!("data_url");

    let response = app.oneshot(post_json("/generate", &body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    let image = body["images"][0].as_str().unwrap();
    assert!(image.starts_with("data:image/png;base64,"));
}

#[tokio::test]
async fn test_generate_rejects_bad_dimensions() {
    let (app, queue) = create_test_app();

    let response = app
        .oneshot(post_json("/generate", &generate_body("a cat", 513, "primary")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["error"]["code"], "invalid_dimensions");
    assert_eq!(queue.pending_count(), 0);
}

#[tokio::test]
async fn test_generate_rejects_unknown_response_format() {
    let (app, queue) = create_test_app();

    let mut body = generate_body("a cat", 512, "primary");
    body["response_format"] = json!("url");

    let response = app.oneshot(post_json("/generate", &body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(queue.processed_count(), 0);
}

#[tokio::test]
async fn test_generate_rejects_unconfigured_backend() {
    let (app, _queue) = create_test_app();

    let response = app
        .oneshot(post_json("/generate", &generate_body("a cat", 512, "accelerated")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["error"]["code"], "backend_not_configured");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_generation_failures_map_to_status_codes() {
    let (app, queue) = create_test_app();

    let response = app
        .clone()
        .oneshot(post_json("/generate", &generate_body("fail", 512, "primary")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let response = app
        .oneshot(post_json("/generate", &generate_body("empty", 512, "primary")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = read_json(response).await;
    assert_eq!(body["error"]["code"], "model_failed");

    assert_eq!(queue.failed_count(), 2);
    assert_eq!(queue.pending_count(), 0);
}

#[tokio::test]
async fn test_interrupt_sets_flag() {
    let (app, queue) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/interrupt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["message"], "Interrupted");
    assert!(queue.interrupt_requested());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_queue_stats_endpoint() {
    let (app, _queue) = create_test_app();

    app.clone()
        .oneshot(post_json("/generate", &generate_body("a cat", 512, "primary")))
        .await
        .unwrap();

    let response = app
        .oneshot(Request::builder().uri("/queue").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["pending"], 0);
    assert_eq!(body["processed"], 1);
    assert_eq!(body["generating"], false);
    assert_eq!(body["head"], Value::Null);
}

#[tokio::test]
async fn test_health() {
    let (app, _queue) = create_test_app();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
