//! Backend module - Generator trait, HTTP generator, and registry

pub mod http_backend;
pub mod registry;
pub mod traits;
