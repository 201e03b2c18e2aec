//! Registry mapping each backend to its generator

use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::backend::http_backend::HttpGenerator;
use crate::backend::traits::ImageGenerator;
use crate::config::BackendConfig;
use crate::error::{AppError, Result};
use crate::job::Backend;

/// Generators available to the queue, keyed by backend
#[derive(Default)]
pub struct GeneratorRegistry {
    generators: HashMap<Backend, Arc<dyn ImageGenerator>>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register HTTP generators for every enabled backend in the configuration
    pub fn from_config(backends: &[BackendConfig]) -> Result<Self> {
        let mut registry = Self::new();
        for config in backends.iter().filter(|b| b.enabled) {
            let generator = HttpGenerator::new(config)?;
            info!(
                backend = %config.backend,
                endpoint = %config.endpoint,
                "Registered HTTP generator"
            );
            registry.register(config.backend, Arc::new(generator));
        }
        Ok(registry)
    }

    /// Register a generator, replacing any previous one for the backend
    pub fn register(&mut self, backend: Backend, generator: Arc<dyn ImageGenerator>) {
        self.generators.insert(backend, generator);
    }

    pub fn get(&self, backend: Backend) -> Result<Arc<dyn ImageGenerator>> {
        self.generators
            .get(&backend)
            .cloned()
            .ok_or_else(|| AppError::BackendNotFound(backend.to_string()))
    }

    pub fn backends(&self) -> Vec<Backend> {
        self.generators.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }
}
