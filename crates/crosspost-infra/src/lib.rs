//! Crosspost Infrastructure Library
//!
//! Shared infrastructure used by the crosspost service:
//! - Telemetry initialization
//! - Request id middleware
//! - Error response shape
//! - Signed webhook delivery for publish notifications

#[cfg(feature = "middleware")]
pub mod middleware;

#[cfg(feature = "observability-basic")]
pub mod telemetry;

pub mod error;

#[cfg(feature = "webhook")]
pub mod webhook;

// Re-export commonly used types
#[cfg(feature = "middleware")]
pub use middleware::{request_id_middleware, RequestId};

#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, shutdown_telemetry};

pub use error::ErrorResponse;

#[cfg(feature = "webhook")]
pub use webhook::{WebhookService, WebhookServiceConfig};
