//! Application settings and configuration management

use crate::error::{AppError, Result};
use crate::job::Backend;
use crate::queue::QueueConfig;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub server: ServerConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_true() -> bool {
    true
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `json` or `pretty`
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Generator backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    pub backend: Backend,
    /// Base URL of the inference server
    pub endpoint: String,
    #[serde(default = "default_generate_path")]
    pub generate_path: String,
    /// Endpoint that stops the server's running generation
    #[serde(default = "default_interrupt_path")]
    pub interrupt_path: String,
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_generate_path() -> String {
    "/sdapi/v1/txt2img".to_string()
}

fn default_interrupt_path() -> String {
    "/sdapi/v1/interrupt".to_string()
}

fn default_timeout() -> u64 {
    600000
}

impl Settings {
    /// Load settings from configuration files and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/default.toml")
    }

    /// Load settings from a specific configuration file path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", default_host())?
            .set_default("server.port", i64::from(default_port()))?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.format", default_log_format())?
            // Load from configuration file
            .add_source(File::from(path.as_ref()).required(false))
            // Override with environment variables (prefixed with DIFFUSION_QUEUE_)
            .add_source(
                Environment::with_prefix("DIFFUSION_QUEUE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(invalid("Server port cannot be 0".to_string()));
        }

        if self.queue.max_queue_size == 0 {
            return Err(invalid("queue.max_queue_size must be at least 1".to_string()));
        }

        if !["json", "pretty"].contains(&self.logging.format.as_str()) {
            return Err(invalid(format!(
                "Invalid log format '{}'. Must be 'json' or 'pretty'",
                self.logging.format
            )));
        }

        let mut seen = HashSet::new();
        for backend in &self.backends {
            if backend.endpoint.is_empty() {
                return Err(invalid(format!(
                    "Backend '{}' must have an endpoint",
                    backend.backend
                )));
            }
            if !seen.insert(backend.backend) {
                return Err(invalid(format!(
                    "Backend '{}' is configured more than once",
                    backend.backend
                )));
            }
        }

        Ok(())
    }
}

fn invalid(message: String) -> AppError {
    AppError::Config(config::ConfigError::Message(message))
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
            },
            queue: QueueConfig::default(),
            logging: LoggingConfig {
                level: default_log_level(),
                format: default_log_format(),
            },
            backends: vec![],
        }
    }
}
