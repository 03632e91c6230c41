//! Axum HTTP API server for MoodLens.
//!
//! This crate provides:
//! - Image upload analysis with annotated PNG output
//! - Background video analysis jobs that can be polled and stopped
//! - A bounded analysis cache and upload history
//! - Rate limiting, security headers and Prometheus metrics

pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod history;
pub mod jobs;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod state;

pub use config::{AnalysisConfig, ApiConfig};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
