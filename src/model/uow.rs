// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::{DomainEvent, EventRecord};
use crate::traits::PublishEntry;

/// Principal the key-value store reports for deletes performed by its TTL sweep.
pub const TTL_SWEEP_PRINCIPAL: &str = "dynamodb.amazonaws.com";
const SERVICE_ACTOR_TYPE: &str = "Service";

/// Per-item context threaded through a pipeline.
///
/// Adapters fill `record`, `meta` and `event`; every later field is added by a
/// stage. Each pipeline works on its own clone, so stages mutate freely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitOfWork {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<String>,
    #[serde(default)]
    pub record: Value,
    #[serde(default)]
    pub meta: RecordMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<DomainEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub put_request: Option<EventRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub correlated: Vec<DomainEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emit: Option<DomainEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<PublishEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub batch: Vec<UnitOfWork>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
}

impl UnitOfWork {
    pub fn new(record: Value, event: DomainEvent) -> Self {
        Self {
            record,
            event: Some(event),
            ..Default::default()
        }
    }

    pub fn with_meta(mut self, meta: RecordMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Wrap a group of members into a batch unit of work.
    pub fn batch_of(members: Vec<UnitOfWork>) -> Self {
        let pipeline = members.first().and_then(|m| m.pipeline.clone());
        Self {
            pipeline,
            batch: members,
            ..Default::default()
        }
    }

    pub fn is_batch(&self) -> bool {
        !self.batch.is_empty()
    }

    pub fn event_id(&self) -> Option<&str> {
        self.event.as_ref().map(|e| e.id.as_str())
    }
}

/// Envelope facts the source adapter lifts out of its native record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<String>,
    /// Epoch milliseconds at which the change was captured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approximate_creation_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<ChangeActor>,
}

/// Identity that performed a table change, when the stream reports one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeActor {
    #[serde(rename = "type")]
    pub actor_type: String,
    pub principal_id: String,
}

impl ChangeActor {
    pub fn ttl_sweep() -> Self {
        Self {
            actor_type: SERVICE_ACTOR_TYPE.to_string(),
            principal_id: TTL_SWEEP_PRINCIPAL.to_string(),
        }
    }

    pub fn is_ttl_sweep(&self) -> bool {
        self.actor_type == SERVICE_ACTOR_TYPE && self.principal_id == TTL_SWEEP_PRINCIPAL
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_batch_of_inherits_pipeline() {
        let mut member = UnitOfWork::new(json!({}), DomainEvent::new("1", "c1", 0));
        member.pipeline = Some("p1".into());

        let batch = UnitOfWork::batch_of(vec![member.clone(), member]);
        assert!(batch.is_batch());
        assert_eq!(batch.pipeline.as_deref(), Some("p1"));
        assert_eq!(batch.batch.len(), 2);
    }

    #[test]
    fn test_ttl_sweep_actor() {
        assert!(ChangeActor::ttl_sweep().is_ttl_sweep());
        let user = ChangeActor {
            actor_type: "User".into(),
            principal_id: "someone".into(),
        };
        assert!(!user.is_ttl_sweep());
    }
}
