//! Single-flight generation queue
//!
//! Serializes text-to-image requests in front of a GPU-bound inference
//! engine: one generation at a time, strictly in arrival order, with an
//! advisory interrupt for the generation in progress.

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod interrupt;
pub mod job;
pub mod queue;
pub mod response;

pub use error::{AppError, Result};

use std::sync::Arc;

use queue::JobQueue;

/// Application state shared across all handlers
pub struct AppState {
    pub queue: Arc<JobQueue>,
}
