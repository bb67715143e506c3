use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use super::destination::Network;
use super::outcome::OutcomeState;

/// Lifecycle status of a content item
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContentStatus {
    Draft,
    Publishing,
    Published,
    Failed,
}

impl ContentStatus {
    /// Aggregate status after a full publish pass.
    ///
    /// PUBLISHED as soon as one outcome is published, FAILED otherwise. An
    /// outcome still pending means the pass has not finished.
    pub fn from_outcomes<I>(states: I) -> Self
    where
        I: IntoIterator<Item = OutcomeState>,
    {
        let mut any_pending = false;
        for state in states {
            match state {
                OutcomeState::Published => return ContentStatus::Published,
                OutcomeState::Pending => any_pending = true,
                OutcomeState::Failed => {}
            }
        }

        if any_pending {
            ContentStatus::Publishing
        } else {
            ContentStatus::Failed
        }
    }
}

impl Display for ContentStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ContentStatus::Draft => write!(f, "DRAFT"),
            ContentStatus::Publishing => write!(f, "PUBLISHING"),
            ContentStatus::Published => write!(f, "PUBLISHED"),
            ContentStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl FromStr for ContentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DRAFT" => Ok(ContentStatus::Draft),
            "PUBLISHING" => Ok(ContentStatus::Publishing),
            "PUBLISHED" => Ok(ContentStatus::Published),
            "FAILED" => Ok(ContentStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid content status: {}", s)),
        }
    }
}

/// Binary media classification used by the adapters
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl Display for MediaKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// Reference to a media file owned by the media library
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaRef {
    pub url: String,
    #[serde(default)]
    pub kind: Option<MediaKind>,
    /// Original upload filename, used as a kind hint when `kind` is absent
    #[serde(default)]
    pub filename: Option<String>,
}

impl MediaRef {
    pub fn image(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: Some(MediaKind::Image),
            filename: None,
        }
    }

    pub fn video(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: Some(MediaKind::Video),
            filename: None,
        }
    }
}

/// One logical post to be published to several destinations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: Uuid,
    /// Channel (workspace) that owns the item and its destinations
    pub channel_id: Uuid,
    pub author_id: Option<Uuid>,
    pub body: String,
    #[serde(default)]
    pub overrides: HashMap<Network, String>,
    #[serde(default)]
    pub media: Vec<MediaRef>,
    pub status: ContentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
