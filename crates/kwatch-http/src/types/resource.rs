//! Server-held resources as seen by a watcher.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Object metadata. Only the fields the watcher reasons about are typed;
/// everything else is kept in `extra`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Identity key.
    #[serde(default)]
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Version marker, an integer encoded as a string.
    #[serde(
        rename = "resourceVersion",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub resource_version: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single resource.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(rename = "apiVersion", default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Type of the last delta event applied to this resource.
    #[serde(rename = "actionType", default, skip_serializing_if = "Option::is_none")]
    pub action_type: Option<String>,
    /// Remaining top-level fields (`spec`, `status`, ...).
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Resource {
    /// Create a resource with the given identity and version marker.
    #[must_use]
    pub fn new(uid: impl Into<String>, resource_version: impl Into<String>) -> Self {
        Resource {
            metadata: ObjectMeta {
                uid: uid.into(),
                resource_version: Some(resource_version.into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.metadata.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    #[inline]
    #[must_use]
    pub fn uid(&self) -> &str {
        &self.metadata.uid
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.metadata.name.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn resource_version(&self) -> Option<&str> {
        self.metadata.resource_version.as_deref()
    }

    /// The version marker as an integer, `None` when missing or non-numeric.
    #[must_use]
    pub fn version_number(&self) -> Option<u64> {
        self.resource_version()
            .and_then(|v| v.trim().parse::<u64>().ok())
    }

    /// True when `other` carries a strictly greater version marker.
    ///
    /// Missing or non-numeric markers never compare as newer.
    #[must_use]
    pub fn is_superseded_by(&self, other: &Resource) -> bool {
        match (self.version_number(), other.version_number()) {
            (Some(current), Some(incoming)) => current < incoming,
            _ => false,
        }
    }

    /// Overwrite every top-level field present in `other`.
    ///
    /// `metadata` is replaced as a whole. Fields absent from `other` are kept.
    pub fn merge(&mut self, other: Resource) {
        if other.kind.is_some() {
            self.kind = other.kind;
        }
        if other.api_version.is_some() {
            self.api_version = other.api_version;
        }
        self.metadata = other.metadata;
        if other.action_type.is_some() {
            self.action_type = other.action_type;
        }
        self.fields.extend(other.fields);
    }
}

/// Metadata of a list response.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ListMeta {
    #[serde(
        rename = "resourceVersion",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub resource_version: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A collection snapshot as returned by a list request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceList {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub items: Vec<Resource>,
    #[serde(default)]
    pub metadata: ListMeta,
}

impl ResourceList {
    /// Kind of the listed items: `PodList` gives `Pod`.
    ///
    /// A kind without the `List` suffix is returned unchanged.
    #[must_use]
    pub fn item_kind(&self) -> &str {
        self.kind.strip_suffix("List").unwrap_or(&self.kind)
    }

    #[inline]
    #[must_use]
    pub fn resource_version(&self) -> Option<&str> {
        self.metadata.resource_version.as_deref()
    }
}
