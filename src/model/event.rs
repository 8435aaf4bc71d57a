// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::model::EventRecord;
use crate::utils::path;

/// Normalized domain event.
///
/// Fields the engine does not know about are kept in `body` and flattened back
/// on serialization, so an event survives a round trip through the event store
/// or the bus without losing its payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub partition_key: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<ChangeImages>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggers: Option<Vec<Trigger>>,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl DomainEvent {
    pub fn new(id: impl Into<String>, event_type: impl Into<String>, timestamp: i64) -> Self {
        Self {
            id: id.into(),
            event_type: event_type.into(),
            timestamp,
            ..Default::default()
        }
    }

    pub fn with_partition_key(mut self, partition_key: impl Into<String>) -> Self {
        self.partition_key = partition_key.into();
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.body.insert(key.into(), value);
        self
    }

    /// Provenance entry for this event when it becomes a trigger.
    pub fn trigger(&self) -> Trigger {
        Trigger {
            id: self.id.clone(),
            event_type: self.event_type.clone(),
            timestamp: self.timestamp,
        }
    }

    /// Resolve a dotted path (`thing.id`) against the serialized event.
    pub fn lookup(&self, dotted: &str) -> Option<Value> {
        let value = serde_json::to_value(self).ok()?;
        path::lookup(&value, dotted).cloned()
    }

    pub fn change_kind(&self) -> Option<ChangeKind> {
        self.raw.as_ref().and_then(ChangeImages::kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub timestamp: i64,
}

/// Row images attached by CDC adapters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeImages {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Modify,
    Remove,
}

impl ChangeImages {
    pub fn inserted(new: Value) -> Self {
        Self { new: Some(new), old: None }
    }

    pub fn removed(old: Value) -> Self {
        Self { new: None, old: Some(old) }
    }

    pub fn kind(&self) -> Option<ChangeKind> {
        match (&self.new, &self.old) {
            (Some(_), None) => Some(ChangeKind::Insert),
            (Some(_), Some(_)) => Some(ChangeKind::Modify),
            (None, Some(_)) => Some(ChangeKind::Remove),
            (None, None) => None,
        }
    }

    /// The new image decoded as a micro-event-store row.
    pub fn new_record(&self) -> Result<Option<EventRecord>, serde_json::Error> {
        self.new.clone().map(serde_json::from_value).transpose()
    }

    /// The old image decoded as a micro-event-store row.
    pub fn old_record(&self) -> Result<Option<EventRecord>, serde_json::Error> {
        self.old.clone().map(serde_json::from_value).transpose()
    }
}
