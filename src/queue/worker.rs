//! Single-slot worker that runs blocking generator calls off the runtime

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, error};

use crate::backend::traits::{GeneratedImage, ImageGenerator};
use crate::error::{AppError, Result};
use crate::interrupt::InterruptToken;
use crate::job::Job;

/// Executes generator calls one at a time on tokio's blocking pool.
///
/// The slot holds a single permit. The permit moves into the blocking task
/// and is only released when the generator returns (or panics), so a second
/// generation cannot start while one is in flight, even if the caller that
/// dispatched the first one has gone away.
pub struct GenerationWorker {
    slot: Arc<Semaphore>,
    interrupt: InterruptToken,
}

impl GenerationWorker {
    pub fn new(interrupt: InterruptToken) -> Self {
        Self {
            slot: Arc::new(Semaphore::new(1)),
            interrupt,
        }
    }

    /// Whether a generation is currently running
    pub fn is_busy(&self) -> bool {
        self.slot.available_permits() == 0
    }

    pub fn interrupt(&self) -> &InterruptToken {
        &self.interrupt
    }

    /// Run `generator` for `job` and wait for it without blocking the runtime.
    ///
    /// `lease` is held by the blocking task and dropped when the generator
    /// returns, before the slot is released. If this future is dropped before
    /// dispatch, the lease is dropped with it.
    ///
    /// Returns the images together with the time spent inside the generator.
    /// Generator errors are returned unchanged.
    pub async fn run<L>(
        &self,
        generator: Arc<dyn ImageGenerator>,
        job: Arc<Job>,
        lease: L,
    ) -> Result<(Vec<GeneratedImage>, Duration)>
    where
        L: Send + 'static,
    {
        let permit = self
            .slot
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| AppError::Internal("Generation worker is closed".to_string()))?;

        // An interrupt only ever targets the generation that was running
        // when it was requested.
        self.interrupt.clear();

        let interrupt = self.interrupt.clone();
        let job_id = job.id();
        debug!(job_id = %job_id, generator = %generator.name(), "Dispatching job to generator");

        let started = Instant::now();
        let handle = tokio::task::spawn_blocking(move || {
            // Dropped in reverse order: the lease goes first, then the permit
            let _permit = permit;
            let _lease = lease;
            generator.generate(&job, &interrupt)
        });

        let result = handle.await.map_err(|e| {
            if e.is_panic() {
                error!(job_id = %job_id, "Generator panicked");
                AppError::Internal("Generator panicked".to_string())
            } else {
                AppError::Internal(format!("Generation task failed: {}", e))
            }
        })?;
        let elapsed = started.elapsed();

        result.map(|images| (images, elapsed))
    }
}
