use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use super::destination::Network;

/// State of one (content item, destination) publish attempt
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeState {
    Pending,
    Published,
    Failed,
}

impl OutcomeState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OutcomeState::Pending)
    }
}

impl Display for OutcomeState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            OutcomeState::Pending => write!(f, "pending"),
            OutcomeState::Published => write!(f, "published"),
            OutcomeState::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for OutcomeState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OutcomeState::Pending),
            "published" => Ok(OutcomeState::Published),
            "failed" => Ok(OutcomeState::Failed),
            _ => Err(anyhow::anyhow!("Invalid outcome state: {}", s)),
        }
    }
}

/// Per-destination result record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationOutcome {
    pub id: Uuid,
    pub content_id: Uuid,
    pub destination_id: Uuid,
    pub state: OutcomeState,
    /// The network's own identifier for the created object, stored verbatim
    pub external_id: Option<String>,
    pub error_message: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub enqueued_at: DateTime<Utc>,
}

impl DestinationOutcome {
    pub fn pending(content_id: Uuid, destination_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            content_id,
            destination_id,
            state: OutcomeState::Pending,
            external_id: None,
            error_message: None,
            published_at: None,
            enqueued_at: Utc::now(),
        }
    }
}

/// Result of one destination as reported to callers and webhooks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DestinationResult {
    pub destination_id: Uuid,
    /// Unknown when the destination itself could not be loaded
    pub network: Option<Network>,
    pub account_id: Option<String>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!OutcomeState::Pending.is_terminal());
        assert!(OutcomeState::Published.is_terminal());
        assert!(OutcomeState::Failed.is_terminal());
    }

    #[test]
    fn test_new_outcome_is_pending() {
        let outcome = DestinationOutcome::pending(Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(outcome.state, OutcomeState::Pending);
        assert!(outcome.external_id.is_none());
        assert!(outcome.published_at.is_none());
    }

    #[test]
    fn test_result_omits_empty_fields() {
        let result = DestinationResult {
            destination_id: Uuid::nil(),
            network: Some(Network::Bluesky),
            account_id: Some("did:plc:abc".to_string()),
            success: true,
            external_id: Some("at://did:plc:abc/app.bsky.feed.post/1".to_string()),
            error: None,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["network"], "bluesky");
        assert!(value.get("error").is_none());
    }
}
