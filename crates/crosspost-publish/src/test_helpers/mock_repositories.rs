//! Mock repository implementations for testing
//!
//! These mocks allow testing the publish pipeline without database dependencies.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crosspost_core::models::{
    ContentItem, ContentStatus, Destination, DestinationOutcome, OutcomeState, PublishEvent,
};
use crosspost_core::PublishNotifier;
use crosspost_db::{PublishContentRepository, PublishDestinationRepository, PublishOutcomeRepository};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Mock content repository recording every status change
#[derive(Clone, Default)]
pub struct MockContentRepository {
    items: Arc<Mutex<HashMap<Uuid, ContentItem>>>,
    status_history: Arc<Mutex<Vec<(Uuid, ContentStatus)>>>,
}

impl MockContentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, item: ContentItem) {
        self.items.lock().unwrap().insert(item.id, item);
    }

    pub fn status(&self, id: Uuid) -> Option<ContentStatus> {
        self.items.lock().unwrap().get(&id).map(|item| item.status)
    }

    pub fn status_history(&self) -> Vec<(Uuid, ContentStatus)> {
        self.status_history.lock().unwrap().clone()
    }
}

#[async_trait]
impl PublishContentRepository for MockContentRepository {
    async fn get_content(&self, id: Uuid) -> Result<Option<ContentItem>> {
        Ok(self.items.lock().unwrap().get(&id).cloned())
    }

    async fn set_status(&self, id: Uuid, status: ContentStatus) -> Result<()> {
        let mut items = self.items.lock().unwrap();
        let item = items
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("content item {} not found", id))?;
        item.status = status;
        self.status_history.lock().unwrap().push((id, status));
        Ok(())
    }
}

/// Mock outcome store that only transitions pending rows
#[derive(Clone, Default)]
pub struct MockOutcomeRepository {
    outcomes: Arc<Mutex<Vec<DestinationOutcome>>>,
}

impl MockOutcomeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, outcome: DestinationOutcome) {
        self.outcomes.lock().unwrap().push(outcome);
    }

    pub fn get(&self, id: Uuid) -> Option<DestinationOutcome> {
        self.outcomes
            .lock()
            .unwrap()
            .iter()
            .find(|o| o.id == id)
            .cloned()
    }

    pub fn all(&self) -> Vec<DestinationOutcome> {
        self.outcomes.lock().unwrap().clone()
    }
}

#[async_trait]
impl PublishOutcomeRepository for MockOutcomeRepository {
    async fn list_for_content(&self, content_id: Uuid) -> Result<Vec<DestinationOutcome>> {
        let mut outcomes: Vec<DestinationOutcome> = self
            .outcomes
            .lock()
            .unwrap()
            .iter()
            .filter(|o| o.content_id == content_id)
            .cloned()
            .collect();
        outcomes.sort_by_key(|o| o.enqueued_at);
        Ok(outcomes)
    }

    async fn mark_published(
        &self,
        outcome_id: Uuid,
        external_id: &str,
        published_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut outcomes = self.outcomes.lock().unwrap();
        match outcomes
            .iter_mut()
            .find(|o| o.id == outcome_id && o.state == OutcomeState::Pending)
        {
            Some(outcome) => {
                outcome.state = OutcomeState::Published;
                outcome.external_id = Some(external_id.to_string());
                outcome.published_at = Some(published_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_failed(&self, outcome_id: Uuid, error_message: &str) -> Result<bool> {
        let mut outcomes = self.outcomes.lock().unwrap();
        match outcomes
            .iter_mut()
            .find(|o| o.id == outcome_id && o.state == OutcomeState::Pending)
        {
            Some(outcome) => {
                outcome.state = OutcomeState::Failed;
                outcome.error_message = Some(error_message.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// (destination id, access token, rotated refresh token)
pub type SavedToken = (Uuid, String, Option<String>);

/// Mock destination store
#[derive(Clone, Default)]
pub struct MockDestinationRepository {
    destinations: Arc<Mutex<HashMap<Uuid, Destination>>>,
    broken: Arc<Mutex<HashSet<Uuid>>>,
    saved_tokens: Arc<Mutex<Vec<SavedToken>>>,
}

impl MockDestinationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, destination: Destination) {
        self.destinations
            .lock()
            .unwrap()
            .insert(destination.id, destination);
    }

    /// Make loading `id` fail as if its stored credentials were corrupt
    pub fn break_destination(&self, id: Uuid) {
        self.broken.lock().unwrap().insert(id);
    }

    pub fn saved_tokens(&self) -> Vec<SavedToken> {
        self.saved_tokens.lock().unwrap().clone()
    }
}

#[async_trait]
impl PublishDestinationRepository for MockDestinationRepository {
    async fn get_destination(&self, id: Uuid) -> Result<Option<Destination>> {
        if self.broken.lock().unwrap().contains(&id) {
            anyhow::bail!("destination {} secret bundle is incomplete", id);
        }
        Ok(self.destinations.lock().unwrap().get(&id).cloned())
    }

    async fn save_refreshed_token(
        &self,
        id: Uuid,
        access_token: &str,
        refresh_token: Option<&str>,
        _expires_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.saved_tokens.lock().unwrap().push((
            id,
            access_token.to_string(),
            refresh_token.map(String::from),
        ));
        Ok(())
    }
}

/// Notifier capturing every event it receives
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<PublishEvent>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PublishEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl PublishNotifier for RecordingNotifier {
    async fn notify(&self, event: PublishEvent) -> std::result::Result<(), String> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}
