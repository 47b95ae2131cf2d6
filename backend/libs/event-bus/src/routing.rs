//! Maps a stored `event_type` to the routing key it is published under.

/// Routing key for a known event type, or `None` if the type has no mapping
/// — the publisher treats that as a terminal failure, since no amount of
/// retrying teaches it a routing key.
pub fn routing_key_for(event_type: &str) -> Option<&'static str> {
    match event_type {
        "DocumentUploaded" => Some("document.uploaded"),
        "DocumentValidated" => Some("document.validated"),
        "DocumentRejected" => Some("document.rejected"),
        "DocumentEnriched" => Some("document.enriched"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_event_types_map_to_dotted_routing_keys() {
        assert_eq!(routing_key_for("DocumentUploaded"), Some("document.uploaded"));
        assert_eq!(routing_key_for("DocumentValidated"), Some("document.validated"));
        assert_eq!(routing_key_for("DocumentRejected"), Some("document.rejected"));
        assert_eq!(routing_key_for("DocumentEnriched"), Some("document.enriched"));
    }

    #[test]
    fn unknown_event_type_has_no_routing_key() {
        assert_eq!(routing_key_for("SomethingElse"), None);
    }
}
