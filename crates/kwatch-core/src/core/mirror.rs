//! The local keyed copy of a watched collection.

use kwatch_http::{EventType, Resource, ResourceList, WatchEvent};
use std::collections::BTreeMap;

/// Which branch of the reconciliation rule an event took.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    /// New identity inserted.
    Inserted,
    /// `ADDED` for an identity already present; entry overwritten.
    Replaced,
    /// `MODIFIED` with a newer version marker; fields merged.
    Merged,
    /// `MODIFIED` with an older, equal or unparsable marker; dropped.
    Stale,
    /// `DELETED` removed the entry.
    Removed,
    /// `DELETED` for an identity not present.
    Absent,
    /// `ERROR` or unknown event type; nothing changed.
    Ignored,
}

impl Applied {
    /// True if the mirror content changed.
    #[must_use]
    pub fn changed(self) -> bool {
        matches!(
            self,
            Applied::Inserted | Applied::Replaced | Applied::Merged | Applied::Removed
        )
    }
}

/// Latest known resource per uid.
///
/// Holds at most one entry per uid. A `MODIFIED` event never lowers an
/// entry's version marker; `ADDED` overwrites unconditionally and `DELETED`
/// keeps no tombstone, so a late event can bring a deleted entry back.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mirror {
    entries: BTreeMap<String, Resource>,
}

impl Mirror {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the content with a list snapshot, stamping every item with
    /// the list's item kind. Returns the number of entries.
    pub fn seed(&mut self, list: ResourceList) -> usize {
        let kind = list.item_kind().to_string();
        self.entries.clear();
        for mut item in list.items {
            item.kind = Some(kind.clone());
            self.entries.insert(item.metadata.uid.clone(), item);
        }
        self.entries.len()
    }

    /// Apply one delta event.
    pub fn apply(&mut self, event: WatchEvent) -> Applied {
        let WatchEvent {
            event_type,
            mut object,
        } = event;
        object.action_type = Some(event_type.as_str().to_string());

        match event_type {
            EventType::Added => match self.entries.insert(object.metadata.uid.clone(), object) {
                Some(_) => Applied::Replaced,
                None => Applied::Inserted,
            },
            EventType::Modified => match self.entries.get_mut(object.uid()) {
                Some(existing) => {
                    if existing.is_superseded_by(&object) {
                        existing.merge(object);
                        Applied::Merged
                    } else {
                        tracing::trace!(
                            uid = %existing.uid(),
                            current = ?existing.resource_version(),
                            incoming = ?object.resource_version(),
                            "Dropping stale update"
                        );
                        Applied::Stale
                    }
                }
                None => {
                    self.entries.insert(object.metadata.uid.clone(), object);
                    Applied::Inserted
                }
            },
            EventType::Deleted => match self.entries.remove(object.uid()) {
                Some(_) => Applied::Removed,
                None => Applied::Absent,
            },
            EventType::Error => {
                tracing::error!(object = ?object.fields, "Error in update");
                Applied::Ignored
            }
            EventType::Unknown(ref tag) => {
                tracing::error!(event_type = %tag, uid = %object.uid(), "Unknown update type");
                Applied::Ignored
            }
        }
    }

    /// All entries, ordered by uid.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Resource> {
        self.entries.values().cloned().collect()
    }

    #[must_use]
    pub fn get(&self, uid: &str) -> Option<&Resource> {
        self.entries.get(uid)
    }

    #[must_use]
    pub fn contains(&self, uid: &str) -> bool {
        self.entries.contains_key(uid)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.entries.values()
    }
}
