//! Prediction library for the Theft Over Open Data service
//!
//! This crate provides the core functionality for:
//! - Loading exported ONNX classifier pipelines from disk
//! - Extracting feature rows and running inference with tract
//! - Summarizing predictions through a chat completion API
//! - Offline evaluation of artifacts
//! - Health checks and observability

pub mod chat;
pub mod evaluation;
pub mod health;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod store;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ServiceMetrics, StructuredLogger};
