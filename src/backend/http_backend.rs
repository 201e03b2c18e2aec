//! Generator that forwards jobs to a remote txt2img inference server

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::backend::traits::{GeneratedImage, ImageGenerator};
use crate::config::BackendConfig;
use crate::error::{AppError, Result};
use crate::interrupt::InterruptToken;
use crate::job::{Job, Scheduler};
use crate::response::base64;

/// How often an in-flight request checks the interrupt token
const INTERRUPT_POLL: Duration = Duration::from_millis(50);

/// HTTP-based image generator.
///
/// Speaks the AUTOMATIC1111 `txt2img` API. Each `batch_count` iteration is a
/// separate request. An interrupt is checked before every request; while a
/// request is in flight it is forwarded to the server's interrupt endpoint,
/// and the job fails with `Interrupted` once the server answers. Servers
/// without an interrupt endpoint finish the current batch first.
pub struct HttpGenerator {
    name: String,
    client: Client,
    url: String,
    interrupt_url: String,
}

/// Request body sent to the inference server
#[derive(Debug, Serialize)]
struct Txt2ImgRequest<'a> {
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    negative_prompt: Option<&'a str>,
    width: u32,
    height: u32,
    steps: u32,
    cfg_scale: f32,
    seed: i64,
    batch_size: u32,
    n_iter: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    sampler_name: Option<&'static str>,
    override_settings: OverrideSettings<'a>,
}

#[derive(Debug, Serialize)]
struct OverrideSettings<'a> {
    sd_model_checkpoint: &'a str,
}

/// Response from the inference server
#[derive(Debug, Deserialize)]
struct Txt2ImgResponse {
    #[serde(default)]
    images: Vec<String>,
    #[serde(default)]
    data: Vec<ApiImageData>,
}

#[derive(Debug, Deserialize)]
struct ApiImageData {
    #[serde(default)]
    b64_json: Option<String>,
}

/// Sampler name used by the inference server for a scheduler
fn sampler_name(scheduler: Scheduler) -> Option<&'static str> {
    match scheduler {
        Scheduler::Ddim => Some("DDIM"),
        Scheduler::Heun => Some("Heun"),
        Scheduler::DpmDiscrete => Some("DPM2"),
        Scheduler::DpmAncestral => Some("DPM2 a"),
        Scheduler::Lms => Some("LMS"),
        Scheduler::Pndm => Some("PLMS"),
        Scheduler::Euler => Some("Euler"),
        Scheduler::EulerA => Some("Euler a"),
        Scheduler::DpmppSdeAncestral => Some("DPM++ 2S a"),
        Scheduler::Dpmpp2m => Some("DPM++ 2M"),
        Scheduler::Default => None,
    }
}

impl HttpGenerator {
    /// Create a new HTTP generator from configuration
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let endpoint = config.endpoint.trim_end_matches('/');
        Ok(Self {
            name: config.backend.to_string(),
            client,
            url: format!("{}{}", endpoint, config.generate_path),
            interrupt_url: format!("{}{}", endpoint, config.interrupt_path),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn interrupt_url(&self) -> &str {
        &self.interrupt_url
    }

    /// Send one txt2img request, forwarding an interrupt raised meanwhile.
    ///
    /// Returns the response and whether the interrupt was forwarded.
    async fn send(
        &self,
        request: &Txt2ImgRequest<'_>,
        interrupt: &InterruptToken,
    ) -> Result<(reqwest::Response, bool)> {
        let send = self.client.post(&self.url).json(request).send();
        tokio::pin!(send);

        let mut poll = tokio::time::interval(INTERRUPT_POLL);
        let mut forwarded = false;
        loop {
            tokio::select! {
                response = &mut send => return Ok((response?, forwarded)),
                _ = poll.tick(), if !forwarded => {
                    if interrupt.is_requested() {
                        self.forward_interrupt().await;
                        forwarded = true;
                    }
                }
            }
        }
    }

    /// Ask the server to stop its current generation
    async fn forward_interrupt(&self) {
        info!(generator = %self.name, "Forwarding interrupt to backend");
        match self.client.post(&self.interrupt_url).send().await {
            Ok(response) if !response.status().is_success() => {
                warn!(status = %response.status(), "Backend rejected interrupt");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to forward interrupt"),
        }
    }

    async fn generate_async(
        &self,
        job: &Job,
        interrupt: &InterruptToken,
    ) -> Result<Vec<GeneratedImage>> {
        let params = job.params();
        let mut images = Vec::new();

        for iteration in 0..params.batch_count {
            if interrupt.is_requested() {
                info!(job_id = %job.id(), iteration, "Generation interrupted");
                return Err(AppError::Interrupted);
            }

            // Negative seeds ask the server for a random one
            let seed = if params.seed < 0 {
                -1
            } else {
                let offset = i64::from(iteration) * i64::from(params.batch_size);
                params.seed.saturating_add(offset)
            };

            let request = Txt2ImgRequest {
                prompt: &params.prompt,
                negative_prompt: Some(params.negative_prompt.as_str()).filter(|n| !n.is_empty()),
                width: params.width,
                height: params.height,
                steps: params.steps,
                cfg_scale: params.guidance_scale,
                seed,
                batch_size: params.batch_size,
                n_iter: 1,
                sampler_name: sampler_name(job.scheduler()),
                override_settings: OverrideSettings {
                    sd_model_checkpoint: job.model().repo_id(),
                },
            };

            debug!(
                generator = %self.name,
                job_id = %job.id(),
                iteration,
                url = %self.url,
                "Sending txt2img request"
            );

            let (response, forwarded) = self.send(&request, interrupt).await?;
            if forwarded {
                info!(job_id = %job.id(), iteration, "Generation interrupted by backend");
                return Err(AppError::Interrupted);
            }

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(AppError::BackendError(format!(
                    "Backend returned {}: {}",
                    status, body
                )));
            }

            let api_response = response.json::<Txt2ImgResponse>().await.map_err(|e| {
                AppError::BackendError(format!("Failed to parse response: {}", e))
            })?;

            // Accept both response shapes
            let encoded = api_response
                .images
                .into_iter()
                .chain(api_response.data.into_iter().filter_map(|d| d.b64_json));

            for (index, b64) in encoded.enumerate() {
                let data = base64::decode(&b64).map_err(|e| {
                    AppError::BackendError(format!("Backend returned invalid image data: {}", e))
                })?;
                images.push(GeneratedImage {
                    data,
                    seed: (seed >= 0).then(|| seed.saturating_add(index as i64)),
                });
            }
        }

        Ok(images)
    }
}

impl ImageGenerator for HttpGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    /// Blocks the calling thread until the server answers.
    ///
    /// Must be called from a thread inside a tokio runtime that is not itself
    /// driving async tasks, such as the blocking pool.
    fn generate(&self, job: &Job, interrupt: &InterruptToken) -> Result<Vec<GeneratedImage>> {
        let handle = Handle::try_current().map_err(|_| {
            AppError::Internal("HTTP generator must run inside a tokio runtime".to_string())
        })?;
        handle.block_on(self.generate_async(job, interrupt))
    }
}
