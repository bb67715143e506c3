use chrono::Utc;
use crosspost_core::models::{
    ContentItem, ContentStatus, Credentials, Destination, MediaKind, Network, PublishSettings,
    SignedCredentials,
};
use std::collections::HashMap;
use uuid::Uuid;

use crate::adapter::PublishInput;
use crate::media::ResolvedMedia;

pub fn content_item(body: &str) -> ContentItem {
    ContentItem {
        id: Uuid::new_v4(),
        channel_id: Uuid::new_v4(),
        author_id: Some(Uuid::new_v4()),
        body: body.to_string(),
        overrides: HashMap::new(),
        media: Vec::new(),
        status: ContentStatus::Draft,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn bearer(token: &str) -> Credentials {
    Credentials::Bearer {
        access_token: token.to_string(),
    }
}

pub fn signed() -> Credentials {
    Credentials::Signed(SignedCredentials {
        consumer_key: "consumer-key".to_string(),
        consumer_secret: "consumer-secret".to_string(),
        access_token: "access-token".to_string(),
        access_token_secret: "access-token-secret".to_string(),
    })
}

pub fn destination(network: Network, credentials: Option<Credentials>) -> Destination {
    Destination {
        id: Uuid::new_v4(),
        channel_id: Uuid::new_v4(),
        network,
        account_id: format!("{}-account", network),
        display_name: None,
        credentials,
        refresh_token: None,
        token_expires_at: None,
        settings: PublishSettings::default(),
    }
}

pub fn image(url: &str) -> ResolvedMedia {
    ResolvedMedia {
        url: url.to_string(),
        kind: MediaKind::Image,
        mime_type: "image/jpeg".to_string(),
    }
}

pub fn video(url: &str) -> ResolvedMedia {
    ResolvedMedia {
        url: url.to_string(),
        kind: MediaKind::Video,
        mime_type: "video/mp4".to_string(),
    }
}

/// Input for a bearer-token destination
pub fn input(network: Network, text: &str, media: Vec<ResolvedMedia>) -> PublishInput {
    let credentials = if network.uses_signed_requests() {
        signed()
    } else {
        bearer("test-token")
    };
    PublishInput {
        destination: destination(network, Some(credentials.clone())),
        credentials,
        text: text.to_string(),
        media,
    }
}
