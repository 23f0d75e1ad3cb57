//! Delta events carried by a watch stream.

use crate::types::Resource;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The `type` tag of a delta event.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventType {
    Added,
    Modified,
    Deleted,
    Error,
    /// Any tag this client does not know about.
    Unknown(String),
}

impl EventType {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            EventType::Added => "ADDED",
            EventType::Modified => "MODIFIED",
            EventType::Deleted => "DELETED",
            EventType::Error => "ERROR",
            EventType::Unknown(s) => s,
        }
    }
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        match s {
            "ADDED" => EventType::Added,
            "MODIFIED" => EventType::Modified,
            "DELETED" => EventType::Deleted,
            "ERROR" => EventType::Error,
            other => EventType::Unknown(other.to_string()),
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(EventType::from(s.as_str()))
    }
}

/// One incremental update: `{"type": ..., "object": ...}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WatchEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub object: Resource,
}

impl WatchEvent {
    #[must_use]
    pub fn new(event_type: EventType, object: Resource) -> Self {
        Self { event_type, object }
    }

    #[must_use]
    pub fn added(object: Resource) -> Self {
        Self::new(EventType::Added, object)
    }

    #[must_use]
    pub fn modified(object: Resource) -> Self {
        Self::new(EventType::Modified, object)
    }

    #[must_use]
    pub fn deleted(object: Resource) -> Self {
        Self::new(EventType::Deleted, object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_known_types() {
        let ev: WatchEvent = serde_json::from_value(json!({
            "type": "MODIFIED",
            "object": {"metadata": {"uid": "a", "resourceVersion": "7"}}
        }))
        .unwrap();
        assert_eq!(ev.event_type, EventType::Modified);
        assert_eq!(ev.object.uid(), "a");
    }

    #[test]
    fn test_decode_unknown_type() {
        let ev: WatchEvent = serde_json::from_value(json!({
            "type": "BOOKMARK",
            "object": {"metadata": {"resourceVersion": "12"}}
        }))
        .unwrap();
        assert_eq!(ev.event_type, EventType::Unknown("BOOKMARK".into()));
        assert_eq!(ev.event_type.to_string(), "BOOKMARK");
    }

    #[test]
    fn test_error_event_with_status_object() {
        let ev: WatchEvent = serde_json::from_value(json!({
            "type": "ERROR",
            "object": {"kind": "Status", "code": 410, "message": "too old resource version"}
        }))
        .unwrap();
        assert_eq!(ev.event_type, EventType::Error);
        assert_eq!(ev.object.fields["code"], 410);
    }

    #[test]
    fn test_missing_type_is_rejected() {
        let res = serde_json::from_value::<WatchEvent>(json!({"object": {}}));
        assert!(res.is_err());
    }
}
