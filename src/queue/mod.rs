//! Queue module - Ordered job queue and the generation worker slot

pub mod job_queue;
pub mod worker;

pub use job_queue::{JobOutput, JobQueue, QueueConfig, QueueStats};
