use crosspost_core::models::{ContentItem, Network};

/// Text to publish on `network`: its override when one is set, the shared body otherwise
pub fn resolve_text(item: &ContentItem, network: Network) -> String {
    item.overrides
        .get(&network)
        .map(|text| text.trim())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| item.body.trim())
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::fixtures::content_item;

    #[test]
    fn test_override_wins_over_body() {
        let mut item = content_item("shared body");
        item.overrides
            .insert(Network::X, "short version for X".to_string());

        assert_eq!(resolve_text(&item, Network::X), "short version for X");
        assert_eq!(resolve_text(&item, Network::Facebook), "shared body");
    }

    #[test]
    fn test_blank_override_falls_back_to_body() {
        let mut item = content_item("shared body");
        item.overrides.insert(Network::Bluesky, "   ".to_string());

        assert_eq!(resolve_text(&item, Network::Bluesky), "shared body");
    }
}
