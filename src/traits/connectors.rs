// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Seams to the external services a pipeline talks to.
//!
//! Wire-level clients live outside this crate; they implement these traits.
//! Request and response shapes mirror batch-oriented cloud APIs, which report
//! per-item outcomes instead of failing a whole call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::ConnectorError;
use crate::model::{DomainEvent, EventRecord, Fault, RecordKey};

/// One entry of a multi-put to a bus, stream, queue or topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishEntry {
    pub id: String,
    pub source: String,
    pub detail_type: String,
    /// Serialized payload.
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_key: Option<String>,
    /// Set on fault events so consumers never run fault handling on them.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fault: bool,
}

impl PublishEntry {
    pub fn for_event(source: &str, event: &DomainEvent) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: event.id.clone(),
            source: source.to_string(),
            detail_type: event.event_type.clone(),
            detail: serde_json::to_string(event)?,
            partition_key: Some(event.partition_key.clone()).filter(|pk| !pk.is_empty()),
            fault: false,
        })
    }

    pub fn for_fault(source: &str, fault: &Fault) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: fault.id.clone(),
            source: source.to_string(),
            detail_type: fault.event_type.clone(),
            detail: serde_json::to_string(fault)?,
            partition_key: Some(fault.partition_key.clone()),
            fault: true,
        })
    }

    /// Serialized size of the entry as it goes on the wire.
    pub fn size_bytes(&self) -> usize {
        serde_json::to_vec(self)
            .map(|bytes| bytes.len())
            .unwrap_or_else(|_| self.detail.len())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PutEntriesRequest {
    pub entries: Vec<PublishEntry>,
}

/// Outcomes aligned by position with the request entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutEntriesResponse {
    pub failed_entry_count: usize,
    pub entries: Vec<EntryOutcome>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryOutcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl EntryOutcome {
    pub fn accepted(event_id: impl Into<String>) -> Self {
        Self {
            event_id: Some(event_id.into()),
            ..Default::default()
        }
    }

    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            event_id: None,
            error_code: Some(code.into()),
            error_message: Some(message.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error_code.is_some()
    }
}

/// Conditional multi-get keyed by table name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchGetRequest {
    pub keys: BTreeMap<String, Vec<RecordKey>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchGetResponse {
    pub responses: BTreeMap<String, Vec<EventRecord>>,
    #[serde(default)]
    pub unprocessed_keys: BTreeMap<String, Vec<RecordKey>>,
}

/// Append-only, TTL-capable single table backing the CEP flavors.
#[async_trait]
pub trait EventStore: Send + Sync {
    fn table_name(&self) -> &str;

    /// Blind put; overwrites a row with the same key.
    async fn put(&self, record: EventRecord) -> Result<(), ConnectorError>;

    /// All rows of one partition, ordered by sort key.
    async fn query(&self, pk: &str) -> Result<Vec<EventRecord>, ConnectorError>;

    /// Keys of rows whose `data` attribute equals `data` on a keys-only index.
    async fn query_index(&self, index: &str, data: &str) -> Result<Vec<RecordKey>, ConnectorError>;

    async fn batch_get(&self, request: BatchGetRequest) -> Result<BatchGetResponse, ConnectorError>;
}

#[async_trait]
pub trait Publisher: Send + Sync {
    fn name(&self) -> &str;

    async fn put_entries(
        &self,
        request: PutEntriesRequest,
    ) -> Result<PutEntriesResponse, ConnectorError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimCheckPointer {
    pub bucket: String,
    pub key: String,
}

/// Blob store receiving payloads that do not fit in a request.
#[async_trait]
pub trait ClaimCheckStore: Send + Sync {
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
    ) -> Result<ClaimCheckPointer, ConnectorError>;
}

/// Collaborators a rule-built pipeline needs.
#[derive(Clone)]
pub struct Connectors {
    pub event_store: Arc<dyn EventStore>,
    pub publisher: Arc<dyn Publisher>,
    pub claim_check: Option<Arc<dyn ClaimCheckStore>>,
}

impl std::fmt::Debug for Connectors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connectors")
            .field("event_store", &self.event_store.table_name())
            .field("publisher", &self.publisher.name())
            .field("claim_check", &self.claim_check.is_some())
            .finish()
    }
}
