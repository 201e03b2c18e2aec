//! HTTP API - Route handlers for the job queue

pub mod routes;
