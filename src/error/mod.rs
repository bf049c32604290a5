//! Error types for the application.
//!
//! This module provides the application's error hierarchy. The `AppError` enum serves
//! as the top-level error type that wraps domain-specific errors. Most variants use
//! `#[from]` for automatic conversion with `?`. Panel and VPS clients deliberately do
//! NOT return `AppError` from their HTTP paths: transport failures are absorbed at
//! that boundary into `Option`/`bool`/structured returns so batch callers can degrade
//! per-server instead of aborting a whole run.

pub mod config;

use thiserror::Error;

use crate::error::config::ConfigError;

/// Top-level application error type.
///
/// Aggregates all possible error types that can occur in the application. Most
/// variants use `#[from]` for automatic error conversion. String variants carry a
/// human-readable message intended for the caller of an orchestration operation.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error during startup, environment variable loading, or
    /// panel-kind resolution.
    #[error(transparent)]
    ConfigErr(#[from] ConfigError),

    /// Database operation error from SeaORM.
    #[error(transparent)]
    DbErr(#[from] sea_orm::DbErr),

    /// HTTP client construction or request error from reqwest.
    ///
    /// Only startup-time client building surfaces this; per-server request
    /// failures are absorbed inside the panel clients.
    #[error(transparent)]
    ReqwestErr(#[from] reqwest::Error),

    /// Cron scheduler error when registering or starting background jobs.
    #[error(transparent)]
    SchedulerErr(#[from] tokio_cron_scheduler::JobSchedulerError),

    /// URL parsing error when building panel or VPS endpoints.
    #[error(transparent)]
    UrlErr(#[from] url::ParseError),

    /// Resource not found error.
    ///
    /// # Fields
    /// - Message describing what resource was not found
    #[error("{0}")]
    NotFound(String),

    /// Invalid request error, e.g. a rejected region/category combination or a
    /// relocation attempt on a multi-server subscription.
    ///
    /// # Fields
    /// - Message describing what was invalid about the request
    #[error("{0}")]
    BadRequest(String),

    /// Internal error with custom message, including total-failure provisioning
    /// outcomes (zero servers succeeded).
    ///
    /// # Fields
    /// - Detailed error message for logging and the caller
    #[error("{0}")]
    InternalError(String),
}
