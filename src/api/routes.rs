//! Route handlers and router construction

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::error::Result;
use crate::job::{Backend, GenerationParams, Job, JobId, Scheduler, SupportedModel};
use crate::queue::QueueStats;
use crate::response::{encode_images, ResponseFormat};
use crate::AppState;

/// Body of `POST /generate`
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    pub data: GenerationParams,
    pub model: SupportedModel,
    #[serde(default)]
    pub scheduler: Scheduler,
    #[serde(default)]
    pub backend: Backend,
    /// `base64` (default) or `data_url`
    #[serde(default)]
    pub response_format: Option<String>,
}

impl GenerateRequest {
    pub fn into_job(self) -> Job {
        Job::new(self.data, self.model, self.scheduler, self.backend)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub message: String,
    pub job_id: JobId,
    /// Seconds spent generating
    pub time: f64,
    pub images: Vec<String>,
}

/// Build the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/generate", post(generate))
        .route("/interrupt", post(interrupt))
        .route("/queue", get(queue_stats))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn generate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>> {
    let format = match request.response_format.as_deref() {
        Some(format) => format.parse::<ResponseFormat>()?,
        None => ResponseFormat::default(),
    };

    let output = state.queue.submit(request.into_job()).await?;

    Ok(Json(GenerateResponse {
        message: "Job completed".to_string(),
        job_id: output.job_id,
        time: output.elapsed_secs(),
        images: encode_images(&output.images, format),
    }))
}

async fn interrupt(State(state): State<Arc<AppState>>) -> Json<Value> {
    state.queue.request_interrupt();
    Json(json!({ "message": "Interrupted" }))
}

async fn queue_stats(State(state): State<Arc<AppState>>) -> Json<QueueStats> {
    Json(state.queue.stats())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
