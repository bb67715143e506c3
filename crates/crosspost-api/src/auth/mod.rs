//! Caller authentication for the publish trigger

pub mod middleware;

pub use middleware::{auth_middleware, AuthState, SessionClaims, SCHEDULER_SECRET_HEADER};
