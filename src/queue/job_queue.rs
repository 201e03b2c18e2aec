//! Strict FIFO, single-flight queue in front of the image generators

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::backend::registry::GeneratorRegistry;
use crate::backend::traits::GeneratedImage;
use crate::error::{AppError, Result};
use crate::interrupt::InterruptToken;
use crate::job::{Job, JobId};
use crate::queue::worker::GenerationWorker;

/// Configuration for the job queue
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Maximum number of admitted jobs, including the one generating
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
}

fn default_max_queue_size() -> usize {
    1000
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_queue_size: default_max_queue_size(),
        }
    }
}

/// Result of a completed job
#[derive(Debug, Clone)]
pub struct JobOutput {
    pub job_id: JobId,
    pub images: Vec<GeneratedImage>,
    /// Time spent inside the generator, excluding the wait for a turn
    pub elapsed: Duration,
}

impl JobOutput {
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

/// Admitted jobs in arrival order, shared with in-flight generations
struct JobSequence {
    jobs: Mutex<VecDeque<Arc<Job>>>,
    turn_changed: Notify,
}

impl JobSequence {
    fn head(&self) -> Option<JobId> {
        self.jobs.lock().front().map(|j| j.id())
    }

    /// Remove a job if it is still queued and wake the waiters
    fn remove(&self, job_id: JobId) {
        let removed = {
            let mut jobs = self.jobs.lock();
            if jobs.front().map(|j| j.id()) == Some(job_id) {
                jobs.pop_front()
            } else {
                jobs.iter()
                    .position(|j| j.id() == job_id)
                    .and_then(|index| jobs.remove(index))
            }
        };

        if removed.is_some() {
            debug!(job_id = %job_id, "Job removed from queue");
            self.turn_changed.notify_waiters();
        }
    }
}

/// Ordered queue serializing access to the generators.
///
/// Jobs are served strictly in admission order and only the job at the head
/// of the queue may generate. Waiting callers are parked on a [`Notify`]
/// that fires whenever an entry is removed.
pub struct JobQueue {
    registry: GeneratorRegistry,
    worker: GenerationWorker,
    sequence: Arc<JobSequence>,
    config: QueueConfig,
    processed_count: AtomicU64,
    failed_count: AtomicU64,
}

/// Removes an admitted job from the queue when dropped.
///
/// Until dispatch it lives in the [`JobQueue::submit`] future, so a caller
/// that gives up while waiting leaves the queue at once. At dispatch it moves
/// into the blocking generator task and is dropped when the generator
/// returns or panics, even if the caller is gone by then.
struct Admission {
    sequence: Arc<JobSequence>,
    job_id: JobId,
}

impl Drop for Admission {
    fn drop(&mut self) {
        self.sequence.remove(self.job_id);
    }
}

impl JobQueue {
    /// Create a new job queue with default configuration
    pub fn new(registry: GeneratorRegistry) -> Self {
        Self::with_config(registry, QueueConfig::default())
    }

    /// Create a new job queue with custom configuration
    pub fn with_config(registry: GeneratorRegistry, config: QueueConfig) -> Self {
        Self {
            registry,
            worker: GenerationWorker::new(InterruptToken::new()),
            sequence: Arc::new(JobSequence {
                jobs: Mutex::new(VecDeque::new()),
                turn_changed: Notify::new(),
            }),
            config,
            processed_count: AtomicU64::new(0),
            failed_count: AtomicU64::new(0),
        }
    }

    /// Submit a job and wait for its images.
    ///
    /// The job is validated before it is admitted; invalid jobs never enter
    /// the queue. Once admitted, the call waits until every earlier job has
    /// left the queue, then runs the generator on the worker slot. The job
    /// leaves the queue when its generation ends.
    pub async fn submit(&self, job: Job) -> Result<JobOutput> {
        job.validate()?;
        let generator = self.registry.get(job.backend())?;

        let job = Arc::new(job);
        let job_id = job.id();
        let admission = self.admit(job.clone())?;

        self.wait_for_turn(job_id).await;
        debug!(
            job_id = %job_id,
            queued_ms = (Utc::now() - job.created_at()).num_milliseconds(),
            "Job reached head of queue"
        );

        let result = self.worker.run(generator, job, admission).await;

        match result {
            Ok((images, _)) if images.is_empty() => {
                self.failed_count.fetch_add(1, Ordering::Relaxed);
                warn!(job_id = %job_id, "Generator returned no images");
                Err(AppError::ModelFailed(
                    "Model failed to generate image".to_string(),
                ))
            }
            Ok((images, elapsed)) => {
                self.processed_count.fetch_add(1, Ordering::Relaxed);
                info!(
                    job_id = %job_id,
                    images = images.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Job finished"
                );
                Ok(JobOutput {
                    job_id,
                    images,
                    elapsed,
                })
            }
            Err(e) => {
                self.failed_count.fetch_add(1, Ordering::Relaxed);
                warn!(job_id = %job_id, error = %e, "Job failed");
                Err(e)
            }
        }
    }

    /// Ask the running generation to stop early
    pub fn request_interrupt(&self) {
        info!(generating = self.worker.is_busy(), "Interrupt requested");
        self.worker.interrupt().request();
    }

    /// Current value of the interrupt flag
    pub fn interrupt_requested(&self) -> bool {
        self.worker.interrupt().is_requested()
    }

    /// Append a job to the tail of the queue
    fn admit(&self, job: Arc<Job>) -> Result<Admission> {
        let mut jobs = self.sequence.jobs.lock();
        if jobs.len() >= self.config.max_queue_size {
            return Err(AppError::QueueFull(jobs.len()));
        }

        let job_id = job.id();
        jobs.push_back(job.clone());
        info!(
            job_id = %job_id,
            backend = %job.backend(),
            position = jobs.len() - 1,
            "Job admitted to queue"
        );

        Ok(Admission {
            sequence: self.sequence.clone(),
            job_id,
        })
    }

    /// Wait until `job_id` is at the head of the queue
    async fn wait_for_turn(&self, job_id: JobId) {
        loop {
            let notified = self.sequence.turn_changed.notified();
            tokio::pin!(notified);
            // Register before checking so a removal in between is not missed
            notified.as_mut().enable();

            if self.sequence.head() == Some(job_id) {
                return;
            }
            notified.await;
        }
    }

    /// Id of the job at the head of the queue
    pub fn head(&self) -> Option<JobId> {
        self.sequence.head()
    }

    /// Zero-based position of a job in the queue
    pub fn position(&self, job_id: JobId) -> Option<usize> {
        self.sequence.jobs.lock().iter().position(|j| j.id() == job_id)
    }

    /// Get the number of admitted jobs, including the one generating
    pub fn pending_count(&self) -> usize {
        self.sequence.jobs.lock().len()
    }

    /// Get the number of successfully processed jobs
    pub fn processed_count(&self) -> u64 {
        self.processed_count.load(Ordering::Relaxed)
    }

    /// Get the number of failed jobs
    pub fn failed_count(&self) -> u64 {
        self.failed_count.load(Ordering::Relaxed)
    }

    /// Whether the worker is generating right now
    pub fn is_generating(&self) -> bool {
        self.worker.is_busy()
    }

    /// Get queue statistics
    pub fn stats(&self) -> QueueStats {
        let (pending, head, head_created_at) = {
            let jobs = self.sequence.jobs.lock();
            let head = jobs.front();
            (
                jobs.len(),
                head.map(|j| j.id()),
                head.map(|j| j.created_at()),
            )
        };

        QueueStats {
            pending,
            processed: self.processed_count(),
            failed: self.failed_count(),
            generating: self.is_generating(),
            head,
            head_created_at,
            max_queue_size: self.config.max_queue_size,
        }
    }
}

/// Queue statistics
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub processed: u64,
    pub failed: u64,
    pub generating: bool,
    pub head: Option<JobId>,
    /// When the head job was submitted
    pub head_created_at: Option<DateTime<Utc>>,
    pub max_queue_size: usize,
}
