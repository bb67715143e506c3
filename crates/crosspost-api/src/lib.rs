//! Crosspost HTTP API
//!
//! Exposes the publish trigger used by the scheduler and by signed-in users.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod setup;
pub mod state;
