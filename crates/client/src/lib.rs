//! OCR Job Service client library.
//!
//! Provides the REST wrapper for the Job Service, the bounded poll loop,
//! lifecycle events, environment configuration, and the
//! [`JobController`](controller::JobController) that ties them together.

pub mod api;
pub mod config;
pub mod controller;
pub mod events;
pub mod poller;

pub use api::{JobService, OcrApi, OcrApiError, SummaryResponse};
pub use config::{ClientConfig, ConfigError};
pub use controller::JobController;
pub use events::{JobEvent, JobEventKind};
