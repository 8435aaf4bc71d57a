// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};

use crate::model::DomainEvent;

/// Sort key of the canonical row for an event.
pub const EVENT_SORT_KEY: &str = "EVENT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Discriminator {
    #[serde(rename = "EVENT")]
    Event,
    #[serde(rename = "CORREL")]
    Correlation,
}

/// Expiry marker carried by a row: `true` derives the expired type from the
/// original type, a string names the type outright.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Expire {
    Flag(bool),
    Type(String),
}

impl Expire {
    pub fn is_enabled(&self) -> bool {
        match self {
            Expire::Flag(flag) => *flag,
            Expire::Type(name) => !name.is_empty(),
        }
    }
}

/// A row of the micro-event-store.
///
/// `EVENT` rows are the single source of truth for an event id; `CORREL` rows are
/// pointers keyed by correlation key and are never read as canonical copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub pk: String,
    pub sk: String,
    pub discriminator: Discriminator,
    /// Epoch milliseconds.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<String>,
    /// Epoch seconds.
    pub ttl: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    pub event: DomainEvent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire: Option<Expire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
}

impl EventRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey {
            pk: self.pk.clone(),
            sk: self.sk.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub pk: String,
    pub sk: String,
}

impl RecordKey {
    pub fn canonical(event_id: impl Into<String>) -> Self {
        Self {
            pk: event_id.into(),
            sk: EVENT_SORT_KEY.to_string(),
        }
    }
}
