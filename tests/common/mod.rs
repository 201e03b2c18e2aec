//! Shared helpers for integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use diffusion_queue::backend::registry::GeneratorRegistry;
use diffusion_queue::backend::traits::{GeneratedImage, ImageGenerator};
use diffusion_queue::interrupt::InterruptToken;
use diffusion_queue::job::{Backend, GenerationParams, Job, JobId, Scheduler, SupportedModel};
use diffusion_queue::queue::{JobQueue, QueueConfig};
use diffusion_queue::{AppError, Result};

pub const PNG_BYTES: [u8; 12] = [
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D,
];

/// One call into the scripted generator
#[derive(Debug, Clone)]
pub struct Invocation {
    pub job_id: JobId,
    pub prompt: String,
    pub saw_interrupt: bool,
    pub started: Instant,
    pub finished: Instant,
}

/// Generator whose behaviour is picked by the job's prompt:
///
/// - `empty`: returns no images
/// - `fail`: returns a backend error
/// - `panic`: panics
/// - `wait-interrupt`: spins until the interrupt flag is set
/// - anything else: sleeps for `delay` and returns one PNG
pub struct ScriptedGenerator {
    delay: Duration,
    started: AtomicUsize,
    invocations: Mutex<Vec<Invocation>>,
}

impl ScriptedGenerator {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            started: AtomicUsize::new(0),
            invocations: Mutex::new(Vec::new()),
        })
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    /// Number of generations that have begun, finished or not
    pub fn started_count(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.invocations().into_iter().map(|i| i.prompt).collect()
    }

    fn run(&self, job: &Job, interrupt: &InterruptToken) -> Result<Vec<GeneratedImage>> {
        match job.params().prompt.as_str() {
            "empty" => Ok(vec![]),
            "fail" => Err(AppError::BackendError("CUDA out of memory".to_string())),
            "panic" => panic!("device lost"),
            "wait-interrupt" => {
                let deadline = Instant::now() + Duration::from_secs(5);
                while Instant::now() < deadline {
                    if interrupt.is_requested() {
                        return Err(AppError::Interrupted);
                    }
                    std::thread::sleep(Duration::from_millis(5));
                }
                Ok(vec![GeneratedImage::new(PNG_BYTES.to_vec())])
            }
            _ => {
                std::thread::sleep(self.delay);
                Ok(vec![GeneratedImage {
                    data: PNG_BYTES.to_vec(),
                    seed: Some(job.params().seed),
                }])
            }
        }
    }
}

impl ImageGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    fn generate(&self, job: &Job, interrupt: &InterruptToken) -> Result<Vec<GeneratedImage>> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let started = Instant::now();
        let saw_interrupt = interrupt.is_requested();
        let result = self.run(job, interrupt);
        self.invocations.lock().unwrap().push(Invocation {
            job_id: job.id(),
            prompt: job.params().prompt.clone(),
            saw_interrupt,
            started,
            finished: Instant::now(),
        });
        result
    }
}

pub fn job(prompt: &str) -> Job {
    job_sized(prompt, 512, 512)
}

pub fn job_sized(prompt: &str, width: u32, height: u32) -> Job {
    Job::new(
        GenerationParams::new(prompt).with_size(width, height),
        SupportedModel::StableDiffusion1_5,
        Scheduler::EulerA,
        Backend::Primary,
    )
}

pub fn queue_with(generator: Arc<ScriptedGenerator>) -> Arc<JobQueue> {
    queue_with_config(generator, QueueConfig::default())
}

pub fn queue_with_config(generator: Arc<ScriptedGenerator>, config: QueueConfig) -> Arc<JobQueue> {
    let mut registry = GeneratorRegistry::new();
    registry.register(Backend::Primary, generator);
    Arc::new(JobQueue::with_config(registry, config))
}

/// Poll `condition` until it holds, failing the test after five seconds
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}
