//! Test helpers for publish unit tests
//!
//! In-memory repositories, a scriptable adapter and fixtures so the
//! coordinator and adapters can be exercised without a database.

pub mod fixtures;
pub mod mock_adapter;
pub mod mock_repositories;
