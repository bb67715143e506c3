//! Crosspost Core Library
//!
//! This crate provides the domain models, error types, configuration and
//! collaborator hooks shared by every crosspost component.

pub mod config;
pub mod error;
pub mod hooks;
pub mod models;

// Re-export commonly used types
pub use config::{Config, OAuthClientConfig, PlatformEndpoints, PublishConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use hooks::{NoOpPublishNotifier, PublishNotifier};
