// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{changed_row, Emit, ExpressionResult, Rule};
use crate::engine::Invocation;
use crate::errors::{PipelineError, ResultExt};
use crate::model::{ChangeKind, Discriminator, DomainEvent, EventRecord, RecordKey, UnitOfWork};
use crate::observability::messages::cep::{EventsDerived, RuleSkipped};
use crate::observability::messages::StructuredLog;
use crate::retry::{retry_partial, BatchGetProtocol, RetryError, RetryOptions};
use crate::traits::{BatchGetRequest, EventStore, Step};

/// Tags that describe where one trigger came from and are not carried over.
const LOCAL_TAGS: &[&str] = &["region", "source"];
/// Body keys the engine sets itself.
const ENGINE_FIELDS: &[&str] = &[
    "id",
    "type",
    "partitionKey",
    "timestamp",
    "tags",
    "raw",
    "triggers",
];

/// Derives higher-order events from table inserts.
///
/// Without an expression every matching `EVENT` insert derives one event. With
/// one the rule reads the correlated set first: `CORREL` rows of the inserted
/// row's partition, or `EVENT` rows sharing its `data` when the rule names an
/// index. The set is read through the invocation cache.
pub struct EvaluateStep {
    rule: Arc<Rule>,
    store: Arc<dyn EventStore>,
    retry: RetryOptions,
}

impl EvaluateStep {
    pub fn new(rule: Arc<Rule>, store: Arc<dyn EventStore>, retry: RetryOptions) -> Self {
        Self { rule, store, retry }
    }

    fn skip(&self, event_id: &str, reason: &str) -> Result<Vec<UnitOfWork>, PipelineError> {
        RuleSkipped {
            rule_id: &self.rule.id,
            event_id,
            reason,
        }
        .log();
        Ok(Vec::new())
    }

    async fn by_partition(
        &self,
        pk: &str,
        invocation: &Invocation,
    ) -> anyhow::Result<Vec<EventRecord>> {
        let rows: Vec<EventRecord> = invocation
            .cache()
            .get_or_fetch("query", pk, || self.store.query(pk))
            .await?;
        let suffix = self.rule.correlation_key_suffix.as_deref();
        Ok(rows
            .into_iter()
            .filter(|r| {
                r.discriminator == Discriminator::Correlation && r.suffix.as_deref() == suffix
            })
            .collect())
    }

    async fn by_index(
        &self,
        index: &str,
        data: &str,
        invocation: &Invocation,
    ) -> anyhow::Result<Vec<EventRecord>> {
        let keys: Vec<RecordKey> = invocation
            .cache()
            .get_or_fetch("query_index", &(index, data), || self.store.query_index(index, data))
            .await?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let request = BatchGetRequest {
            keys: BTreeMap::from([(self.store.table_name().to_string(), keys)]),
        };
        let records: Vec<EventRecord> = invocation
            .cache()
            .get_or_fetch("batch_get", &request, || async {
                let attempted =
                    retry_partial(&BatchGetProtocol, request.clone(), &self.retry, |req| {
                        self.store.batch_get(req)
                    })
                    .await?;
                Ok::<_, RetryError>(attempted.output.into_records())
            })
            .await?;
        Ok(records)
    }

    fn derive(
        &self,
        uow: &UnitOfWork,
        source: &DomainEvent,
        triggers: &[DomainEvent],
        partition_key: String,
        ordinal: Option<usize>,
        mut body: Map<String, Value>,
    ) -> DomainEvent {
        let rule: &Rule = &self.rule;
        let id = match ordinal {
            Some(n) => format!("{}.{}.{}", source.id, rule.id, n),
            None => format!("{}.{}", source.id, rule.id),
        };

        let mut tags = BTreeMap::new();
        for trigger in triggers {
            for (key, value) in &trigger.tags {
                if !LOCAL_TAGS.contains(&key.as_str()) {
                    tags.insert(key.clone(), value.clone());
                }
            }
        }
        for field in ENGINE_FIELDS {
            body.remove(*field);
        }

        let event = DomainEvent {
            id,
            event_type: match &rule.emit {
                Some(Emit::Type(event_type)) => event_type.clone(),
                _ => rule.id.clone(),
            },
            partition_key,
            timestamp: triggers.last().map(|t| t.timestamp).unwrap_or(source.timestamp),
            tags,
            raw: None,
            triggers: Some(triggers.iter().map(DomainEvent::trigger).collect()),
            body,
        };

        match &rule.emit {
            Some(Emit::Computed(emit)) => (emit.f)(uow, rule, event),
            _ => event,
        }
    }
}

fn emitting(uow: &UnitOfWork, events: Vec<DomainEvent>) -> Vec<UnitOfWork> {
    events
        .into_iter()
        .map(|event| {
            let mut out = uow.clone();
            out.emit = Some(event);
            out
        })
        .collect()
}

#[async_trait]
impl Step for EvaluateStep {
    async fn apply(
        &self,
        mut uow: UnitOfWork,
        invocation: &Invocation,
    ) -> Result<Vec<UnitOfWork>, PipelineError> {
        let Some(row) = changed_row(&uow, ChangeKind::Insert)
            .with_uow(&uow)?
            .filter(|r| self.rule.matches(&r.event, &uow))
        else {
            return Ok(Vec::new());
        };

        let Some(expression) = self.rule.expression.clone() else {
            if row.discriminator != Discriminator::Event {
                return Ok(Vec::new());
            }
            let partition_key = self
                .rule
                .correlation_key_for(&row.event)
                .unwrap_or_else(|| row.event.partition_key.clone());
            let triggers = [row.event.clone()];
            let derived = self.derive(&uow, &row.event, &triggers, partition_key, None, Map::new());
            EventsDerived {
                rule_id: &self.rule.id,
                source_event_id: &row.event.id,
                count: 1,
            }
            .log();
            return Ok(emitting(&uow, vec![derived]));
        };

        let (mut working_set, partition_key) = match self.rule.index.as_deref() {
            Some(index) => {
                if row.discriminator != Discriminator::Event {
                    return Ok(Vec::new());
                }
                let Some(data) = row.data.clone() else {
                    return self.skip(&row.event.id, "row has no data to look up");
                };
                let rows = self.by_index(index, &data, invocation).await.with_uow(&uow)?;
                (rows, data)
            }
            None => {
                if row.discriminator != Discriminator::Correlation
                    || row.suffix.as_deref() != self.rule.correlation_key_suffix.as_deref()
                {
                    return Ok(Vec::new());
                }
                let rows = self.by_partition(&row.pk, invocation).await.with_uow(&uow)?;
                (rows, row.data.clone().unwrap_or_else(|| row.pk.clone()))
            }
        };

        working_set.sort_by(|a, b| {
            a.event
                .timestamp
                .cmp(&b.event.timestamp)
                .then_with(|| a.event.id.cmp(&b.event.id))
        });
        uow.correlated = working_set.into_iter().map(|r| r.event).collect();

        let result = (expression.f)(&uow, self.rule.as_ref()).with_uow(&uow)?;
        let bodies: Vec<(Option<usize>, Map<String, Value>)> = match result {
            ExpressionResult::Gate(false) => Vec::new(),
            ExpressionResult::Gate(true) => vec![(None, Map::new())],
            ExpressionResult::One(body) => vec![(None, body)],
            ExpressionResult::Many(bodies) => bodies
                .into_iter()
                .enumerate()
                .map(|(i, b)| (Some(i), b))
                .collect(),
        };
        if bodies.is_empty() {
            return Ok(Vec::new());
        }

        let derived: Vec<DomainEvent> = bodies
            .into_iter()
            .map(|(ordinal, body)| {
                self.derive(&uow, &row.event, &uow.correlated, partition_key.clone(), ordinal, body)
            })
            .collect();
        EventsDerived {
            rule_id: &self.rule.id,
            source_event_id: &row.event.id,
            count: derived.len(),
        }
        .log();
        Ok(emitting(&uow, derived))
    }

    fn name(&self) -> &str {
        "evaluate"
    }
}
