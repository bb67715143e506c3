//! Webhook delivery for publish notifications

pub mod service;

pub use service::{sign_payload, verify_signature, WebhookService, WebhookServiceConfig};
