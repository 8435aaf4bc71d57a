// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::sync::Arc;

use super::{ttl_for, Rule};
use crate::engine::Invocation;
use crate::errors::{PipelineError, ResultExt};
use crate::model::{Discriminator, DomainEvent, EventRecord, UnitOfWork, EVENT_SORT_KEY};
use crate::traits::{EventStore, Step};

/// Writes the canonical `EVENT` row for every matching bus event.
///
/// The put is blind, so redelivery overwrites the same row.
pub struct CollectStep {
    rule: Arc<Rule>,
    store: Arc<dyn EventStore>,
    default_ttl_days: i64,
}

impl CollectStep {
    pub fn new(rule: Arc<Rule>, store: Arc<dyn EventStore>, default_ttl_days: i64) -> Self {
        Self {
            rule,
            store,
            default_ttl_days,
        }
    }

    fn record_for(&self, uow: &UnitOfWork, event: &DomainEvent) -> EventRecord {
        let days = self.rule.ttl_days.unwrap_or(self.default_ttl_days);
        EventRecord {
            pk: event.id.clone(),
            sk: EVENT_SORT_KEY.to_string(),
            discriminator: Discriminator::Event,
            timestamp: event.timestamp,
            sequence_number: uow.meta.sequence_number.clone(),
            ttl: ttl_for(event.timestamp, days),
            data: self.rule.correlation_key_for(event),
            event: event.clone(),
            expire: self.rule.expire.clone(),
            suffix: None,
            rule_id: None,
        }
    }
}

#[async_trait]
impl Step for CollectStep {
    async fn apply(
        &self,
        mut uow: UnitOfWork,
        _invocation: &Invocation,
    ) -> Result<Vec<UnitOfWork>, PipelineError> {
        let Some(event) = uow.event.as_ref().filter(|e| self.rule.matches(e, &uow)) else {
            return Ok(Vec::new());
        };
        let record = self.record_for(&uow, event);

        self.store.put(record.clone()).await.with_uow(&uow)?;
        uow.put_request = Some(record);
        Ok(vec![uow])
    }

    fn name(&self) -> &str {
        "collect"
    }
}
