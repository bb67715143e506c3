//! Application state shared by the handlers

use crosspost_publish::PublishCoordinator;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<PublishCoordinator>,
}

impl AppState {
    pub fn new(coordinator: Arc<PublishCoordinator>) -> Self {
        Self { coordinator }
    }
}
