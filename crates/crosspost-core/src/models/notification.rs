use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use super::outcome::DestinationResult;

/// Events a notification target can subscribe to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEventType {
    PostPublished,
}

impl Display for NotificationEventType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            NotificationEventType::PostPublished => write!(f, "post.published"),
        }
    }
}

impl FromStr for NotificationEventType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "post.published" => Ok(NotificationEventType::PostPublished),
            _ => Err(anyhow::anyhow!("Invalid notification event type: {}", s)),
        }
    }
}

/// Who triggered a publish pass
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Actor {
    User { id: Uuid },
    Scheduler,
}

impl Display for Actor {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Actor::User { id } => write!(f, "user:{}", id),
            Actor::Scheduler => write!(f, "scheduler"),
        }
    }
}

/// Summary of one completed publish pass, handed to the notification collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishEvent {
    pub event: NotificationEventType,
    pub content_id: Uuid,
    pub channel_id: Uuid,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
    pub results: Vec<DestinationResult>,
    pub media_count: usize,
}

/// Configured outbound webhook for a channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookTarget {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub url: String,
    pub events: Vec<NotificationEventType>,
    #[serde(skip_serializing)]
    pub signing_secret: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Webhook payload structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub hook: WebhookHookInfo,
    pub data: PublishEvent,
}

/// Hook information in webhook payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookHookInfo {
    pub id: Uuid,
    pub event: String,
    pub target: String,
    pub channel: Uuid,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_round_trip() {
        let event = NotificationEventType::PostPublished;
        assert_eq!(event.to_string(), "post.published");
        assert_eq!(
            "post.published".parse::<NotificationEventType>().unwrap(),
            event
        );
        assert!("post.deleted".parse::<NotificationEventType>().is_err());
    }

    #[test]
    fn test_actor_serialization() {
        let id = Uuid::new_v4();
        let value = serde_json::to_value(Actor::User { id }).unwrap();
        assert_eq!(value["type"], "user");
        assert_eq!(value["id"], id.to_string());

        let value = serde_json::to_value(Actor::Scheduler).unwrap();
        assert_eq!(value["type"], "scheduler");
    }
}
