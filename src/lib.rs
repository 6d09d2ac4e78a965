//! Library crate for quiz-room-back, exposing modules for binaries and integration tests.

/// Per-player session synchronizer and its transports.
pub mod client;
/// Configuration loading.
pub mod config;
/// Persistence models and room stores.
pub mod dao;
mod dto;
mod error;
/// Quiz content providers.
pub mod quiz;
/// HTTP routes.
pub mod routes;
/// Answer scoring.
pub mod scoring;
/// Business logic behind the routes and background tasks.
pub mod services;
/// Shared runtime state.
pub mod state;

pub use error::{AppError, ServiceError};
