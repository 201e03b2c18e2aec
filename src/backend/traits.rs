//! Common traits and types for image generators

use crate::error::Result;
use crate::interrupt::InterruptToken;
use crate::job::Job;

/// A single generated image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    /// Encoded image bytes (PNG, JPEG, ...)
    pub data: Vec<u8>,

    /// Seed used for this image, if the generator reports it
    pub seed: Option<i64>,
}

impl GeneratedImage {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, seed: None }
    }

    /// Image format detected from the encoded bytes
    pub fn format(&self) -> Option<&'static str> {
        crate::response::detect_image_format(&self.data)
    }
}

/// The inference engine behind the queue.
///
/// `generate` is a blocking call; the queue always runs it on a dedicated
/// worker thread, never on the async runtime. Implementations should poll
/// `interrupt` during long generations and return
/// [`AppError::Interrupted`](crate::error::AppError::Interrupted) once it is
/// set. Returning an empty vector is treated as a model failure.
pub trait ImageGenerator: Send + Sync {
    /// Get the generator name
    fn name(&self) -> &str;

    /// Generate images for a job
    fn generate(&self, job: &Job, interrupt: &InterruptToken) -> Result<Vec<GeneratedImage>>;
}
