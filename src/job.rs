//! Job records describing a single text-to-image request

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Upper bound on sampling steps per image
pub const MAX_STEPS: u32 = 150;
/// Upper bound on images produced by one generator call
pub const MAX_BATCH_SIZE: u32 = 8;
/// Upper bound on generator calls per job
pub const MAX_BATCH_COUNT: u32 = 100;

/// Unique identifier assigned to a job when it is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Sampling schedulers understood by the generation backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scheduler {
    Ddim,
    Heun,
    DpmDiscrete,
    DpmAncestral,
    Lms,
    Pndm,
    Euler,
    EulerA,
    DpmppSdeAncestral,
    #[serde(rename = "dpmpp_2m")]
    Dpmpp2m,
    #[default]
    Default,
}

/// Models the service is allowed to load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupportedModel {
    #[serde(rename = "Linaqruf/anything-v3.0")]
    AnythingV3,
    #[serde(rename = "runwayml/stable-diffusion-v1-5")]
    StableDiffusion1_5,
    #[serde(rename = "CompVis/stable-diffusion-v1-4")]
    StableDiffusion1_4,
}

impl SupportedModel {
    /// Hugging Face repository id of the model
    pub fn repo_id(&self) -> &'static str {
        match self {
            Self::AnythingV3 => "Linaqruf/anything-v3.0",
            Self::StableDiffusion1_5 => "runwayml/stable-diffusion-v1-5",
            Self::StableDiffusion1_4 => "CompVis/stable-diffusion-v1-4",
        }
    }
}

/// Inference backend a job is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    #[serde(alias = "PyTorch")]
    Primary,
    #[serde(alias = "TensorRT")]
    Accelerated,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Accelerated => "accelerated",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sampling parameters of a txt2img request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: String,
    #[serde(default = "default_dimension")]
    pub width: u32,
    #[serde(default = "default_dimension")]
    pub height: u32,
    #[serde(default = "default_steps")]
    pub steps: u32,
    #[serde(default = "default_guidance_scale")]
    pub guidance_scale: f32,
    #[serde(default)]
    pub seed: i64,
    #[serde(default = "default_batch")]
    pub batch_size: u32,
    #[serde(default = "default_batch")]
    pub batch_count: u32,
}

fn default_dimension() -> u32 {
    512
}

fn default_steps() -> u32 {
    25
}

fn default_guidance_scale() -> f32 {
    7.0
}

fn default_batch() -> u32 {
    1
}

impl GenerationParams {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: String::new(),
            width: default_dimension(),
            height: default_dimension(),
            steps: default_steps(),
            guidance_scale: default_guidance_scale(),
            seed: 0,
            batch_size: default_batch(),
            batch_count: default_batch(),
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

/// An immutable generation request owned by the queue once submitted.
///
/// Jobs are identified by [`JobId`]; two jobs with identical parameters are
/// still distinct entries in the queue.
#[derive(Debug, Clone)]
pub struct Job {
    id: JobId,
    params: GenerationParams,
    model: SupportedModel,
    scheduler: Scheduler,
    backend: Backend,
    created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(
        params: GenerationParams,
        model: SupportedModel,
        scheduler: Scheduler,
        backend: Backend,
    ) -> Self {
        Self {
            id: JobId::new(),
            params,
            model,
            scheduler,
            backend,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    pub fn model(&self) -> SupportedModel {
        self.model
    }

    pub fn scheduler(&self) -> Scheduler {
        self.scheduler
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Check the job's shape before it is admitted to the queue
    pub fn validate(&self) -> Result<()> {
        let p = &self.params;
        if p.width == 0 || p.height == 0 || p.width % 8 != 0 || p.height % 8 != 0 {
            return Err(AppError::Dimension(format!(
                "Width and height must be divisible by 8 (got {}x{})",
                p.width, p.height
            )));
        }
        check_range("steps", p.steps, MAX_STEPS)?;
        check_range("batch_size", p.batch_size, MAX_BATCH_SIZE)?;
        check_range("batch_count", p.batch_count, MAX_BATCH_COUNT)?;
        Ok(())
    }
}

fn check_range(field: &str, value: u32, max: u32) -> Result<()> {
    if value == 0 || value > max {
        return Err(AppError::InvalidRequest(format!(
            "{} must be between 1 and {} (got {})",
            field, max, value
        )));
    }
    Ok(())
}
