// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::sync::Arc;

use super::{changed_row, ttl_for, Rule};
use crate::engine::Invocation;
use crate::errors::{PipelineError, ResultExt};
use crate::model::{ChangeKind, Discriminator, EventRecord, UnitOfWork};
use crate::observability::messages::cep::RuleSkipped;
use crate::observability::messages::StructuredLog;
use crate::traits::{EventStore, Step};

/// Partition key of a correlation row, `<key>.<suffix>` when the rule has one.
pub fn correlation_pk(key: &str, suffix: Option<&str>) -> String {
    match suffix {
        Some(suffix) => format!("{}.{}", key, suffix),
        None => key.to_string(),
    }
}

/// Writes a `CORREL` pointer row for every inserted `EVENT` row the rule matches.
pub struct CorrelateStep {
    rule: Arc<Rule>,
    store: Arc<dyn EventStore>,
    default_ttl_days: i64,
}

impl CorrelateStep {
    pub fn new(rule: Arc<Rule>, store: Arc<dyn EventStore>, default_ttl_days: i64) -> Self {
        Self {
            rule,
            store,
            default_ttl_days,
        }
    }

    fn pointer_for(&self, uow: &UnitOfWork, row: EventRecord, key: String) -> EventRecord {
        let suffix = self.rule.correlation_key_suffix.clone();
        let days = self.rule.ttl_days.unwrap_or(self.default_ttl_days);
        EventRecord {
            pk: correlation_pk(&key, suffix.as_deref()),
            sk: row.event.id.clone(),
            discriminator: Discriminator::Correlation,
            timestamp: row.event.timestamp,
            sequence_number: uow.meta.sequence_number.clone(),
            ttl: ttl_for(row.event.timestamp, days),
            data: Some(key),
            expire: self.rule.expire.clone(),
            suffix,
            rule_id: Some(self.rule.id.clone()),
            event: row.event,
        }
    }
}

#[async_trait]
impl Step for CorrelateStep {
    async fn apply(
        &self,
        mut uow: UnitOfWork,
        _invocation: &Invocation,
    ) -> Result<Vec<UnitOfWork>, PipelineError> {
        let Some(row) = changed_row(&uow, ChangeKind::Insert)
            .with_uow(&uow)?
            .filter(|r| r.discriminator == Discriminator::Event)
            .filter(|r| self.rule.matches(&r.event, &uow))
        else {
            return Ok(Vec::new());
        };

        let Some(key) = self.rule.correlation_key_for(&row.event) else {
            RuleSkipped {
                rule_id: &self.rule.id,
                event_id: &row.event.id,
                reason: "no correlation key",
            }
            .log();
            return Ok(Vec::new());
        };

        let pointer = self.pointer_for(&uow, row, key);
        self.store.put(pointer.clone()).await.with_uow(&uow)?;
        uow.put_request = Some(pointer);
        Ok(vec![uow])
    }

    fn name(&self) -> &str {
        "correlate"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_pk_with_and_without_suffix() {
        assert_eq!(correlation_pk("11", None), "11");
        assert_eq!(correlation_pk("11", Some("orders")), "11.orders");
    }
}
