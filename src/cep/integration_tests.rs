// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde_json::{json, Value};
use std::sync::Arc;

use crate::cep::rule::ExpressionFn;
use crate::cep::{
    build_pipeline, CorrelationKey, Emit, EventTypeMatcher, ExpressionResult, Flavor, Named, Rule,
    RuleContext,
};
use crate::config::PipelineRegistry;
use crate::connectors::{MemoryEventStore, MemoryPublisher};
use crate::engine::Handler;
use crate::faults::FaultFlusher;
use crate::model::{
    ChangeActor, ChangeImages, Discriminator, DomainEvent, EventRecord, Expire, RecordMeta,
    UnitOfWork, EVENT_SORT_KEY,
};
use crate::retry::RetryOptions;
use crate::traits::Connectors;

/// Integration tests for rule-built pipelines over the in-memory table and bus
#[cfg(test)]
mod tests {
    use super::*;

    const EVENT_TIME: i64 = 1_600_000_000_000;

    struct Harness {
        store: Arc<MemoryEventStore>,
        publisher: Arc<MemoryPublisher>,
        ctx: RuleContext,
    }

    impl Harness {
        fn new() -> Self {
            let store = Arc::new(MemoryEventStore::new("events"));
            let publisher = Arc::new(MemoryPublisher::new("bus"));
            let mut ctx = RuleContext::new(Connectors {
                event_store: store.clone(),
                publisher: publisher.clone(),
                claim_check: None,
            });
            ctx.retry = RetryOptions {
                max_retries: 2,
                base_delay_ms: 0,
            };
            Self { store, publisher, ctx }
        }

        fn handler(&self, rules: Vec<Rule>) -> Handler {
            let mut registry = PipelineRegistry::new();
            for rule in rules {
                registry.register(build_pipeline(rule, &self.ctx)).unwrap();
            }
            let flusher = FaultFlusher::new(self.publisher.clone(), "test", self.ctx.retry.clone());
            Handler::new("listener", registry, flusher)
        }

        fn published_details(&self) -> Vec<Value> {
            self.publisher
                .published()
                .iter()
                .filter(|e| !e.fault)
                .map(|e| serde_json::from_str(&e.detail).unwrap())
                .collect()
        }
    }

    fn thing_event(id: &str, event_type: &str, thing: &str, offset: i64) -> DomainEvent {
        DomainEvent::new(id, event_type, EVENT_TIME + offset)
            .with_partition_key(thing)
            .with_tag("region", "us-west-2")
            .with_tag("account", "dev")
            .with_field("thing", json!({ "id": thing }))
    }

    fn event_row(event: DomainEvent) -> EventRecord {
        EventRecord {
            pk: event.id.clone(),
            sk: EVENT_SORT_KEY.to_string(),
            discriminator: Discriminator::Event,
            timestamp: event.timestamp,
            sequence_number: None,
            ttl: event.timestamp / 1000 + 60,
            data: event.lookup("thing.id").and_then(|v| v.as_str().map(String::from)),
            event,
            expire: None,
            suffix: None,
            rule_id: None,
        }
    }

    fn correl_row(key: &str, event: DomainEvent) -> EventRecord {
        EventRecord {
            pk: key.to_string(),
            sk: event.id.clone(),
            discriminator: Discriminator::Correlation,
            timestamp: event.timestamp,
            sequence_number: None,
            ttl: event.timestamp / 1000 + 60,
            data: Some(key.to_string()),
            event,
            expire: None,
            suffix: None,
            rule_id: Some("c-rule".into()),
        }
    }

    fn change(images: ChangeImages, meta: RecordMeta) -> UnitOfWork {
        let notification = DomainEvent {
            raw: Some(images),
            ..DomainEvent::new("stream-1", "aws:dynamodb", EVENT_TIME)
        };
        UnitOfWork::new(json!({}), notification).with_meta(meta)
    }

    fn inserted(row: &EventRecord) -> UnitOfWork {
        change(ChangeImages::inserted(serde_json::to_value(row).unwrap()), RecordMeta::default())
    }

    fn removed(row: &EventRecord, meta: RecordMeta) -> UnitOfWork {
        change(ChangeImages::removed(serde_json::to_value(row).unwrap()), meta)
    }

    fn exact(event_type: &str) -> EventTypeMatcher {
        EventTypeMatcher::Exact(event_type.into())
    }

    fn always() -> Named<ExpressionFn> {
        Named {
            name: "always".into(),
            f: Arc::new(|_uow: &UnitOfWork, _rule: &Rule| Ok(ExpressionResult::Gate(true))),
        }
    }

    fn suffixed_row(pk: &str, suffix: Option<&str>, event: DomainEvent) -> EventRecord {
        let mut row = correl_row(pk, event);
        row.suffix = suffix.map(String::from);
        row
    }

    fn trigger_ids(detail: &Value) -> Vec<String> {
        detail["triggers"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|t| t["id"].as_str().map(String::from))
            .collect()
    }

    #[tokio::test]
    async fn test_collect_writes_canonical_row() {
        let harness = Harness::new();
        let mut rule = Rule::new("collect", Flavor::Collect, exact("c1"));
        rule.correlation_key = Some(CorrelationKey::Path("thing.id".into()));
        rule.expire = Some(Expire::Flag(true));
        let handler = harness.handler(vec![rule]);

        let uow = UnitOfWork::new(json!({}), thing_event("1", "c1", "11", 0));
        let other = UnitOfWork::new(json!({}), thing_event("2", "c9", "11", 0));
        let report = handler.handle(vec![uow, other]).await.unwrap();

        assert_eq!(report.processed().count(), 1);
        assert_eq!(harness.store.len(), 1);
        let row = harness.store.get("1", EVENT_SORT_KEY).unwrap();
        assert_eq!(row.discriminator, Discriminator::Event);
        assert_eq!(row.data.as_deref(), Some("11"));
        assert_eq!(row.ttl, EVENT_TIME / 1000 + 11 * 86_400);
        assert_eq!(row.expire, Some(Expire::Flag(true)));
        assert_eq!(row.event.body["thing"]["id"], "11");
    }

    #[tokio::test]
    async fn test_correlate_projects_pointer_row() {
        let harness = Harness::new();
        let mut rule = Rule::new("c-rule", Flavor::Correlate, exact("c1"));
        rule.correlation_key = Some(CorrelationKey::Path("thing.id".into()));
        let handler = harness.handler(vec![rule]);

        let row = event_row(thing_event("1", "c1", "11", 0));
        handler.handle(vec![inserted(&row)]).await.unwrap();

        let pointer = harness.store.get("11", "1").unwrap();
        assert_eq!(pointer.discriminator, Discriminator::Correlation);
        assert_eq!(pointer.data.as_deref(), Some("11"));
        assert_eq!(pointer.rule_id.as_deref(), Some("c-rule"));
        assert_eq!(pointer.event.id, "1");
        assert_eq!(pointer.ttl, EVENT_TIME / 1000 + 11 * 86_400);
    }

    #[tokio::test]
    async fn test_correlate_without_key_writes_nothing() {
        let harness = Harness::new();
        let mut rule = Rule::new("c-rule", Flavor::Correlate, exact("c1"));
        rule.correlation_key = Some(CorrelationKey::Path("missing.id".into()));
        let handler = harness.handler(vec![rule]);

        let row = event_row(thing_event("1", "c1", "11", 0));
        let report = handler.handle(vec![inserted(&row)]).await.unwrap();

        assert_eq!(report.processed().count(), 0);
        assert!(harness.store.is_empty());
    }

    #[tokio::test]
    async fn test_evaluate_emits_derived_event() {
        let harness = Harness::new();
        let mut rule = Rule::new("r1", Flavor::Evaluate, exact("c1"));
        rule.emit = Some(Emit::Type("e111".into()));
        let handler = harness.handler(vec![rule]);

        let row = event_row(thing_event("1", "c1", "11", 0));
        let report = handler.handle(vec![inserted(&row)]).await.unwrap();

        let details = harness.published_details();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0]["id"], "1.r1");
        assert_eq!(details[0]["type"], "e111");
        assert_eq!(details[0]["partitionKey"], "11");
        assert_eq!(details[0]["timestamp"], EVENT_TIME);
        assert_eq!(details[0]["tags"], json!({ "account": "dev" }));
        assert_eq!(
            details[0]["triggers"],
            json!([{ "id": "1", "type": "c1", "timestamp": EVENT_TIME }])
        );

        let processed: Vec<&UnitOfWork> = report.processed().collect();
        assert_eq!(processed.len(), 1);
        assert_eq!(processed[0].response.as_ref().unwrap()["eventId"], "bus-1.r1");
    }

    #[tokio::test]
    async fn test_evaluate_reads_correlated_partition() {
        let harness = Harness::new();
        harness.store.seed(correl_row("11", thing_event("1", "c1", "11", 0)));
        harness.store.seed(correl_row("11", thing_event("2", "c2", "11", 10)));
        harness.store.seed(correl_row("22", thing_event("3", "c1", "22", 5)));

        let both_types = EventTypeMatcher::AnyOf(vec!["c1".into(), "c2".into()]);
        let mut rule = Rule::new("r2", Flavor::Evaluate, both_types);
        rule.expression = Some(Named {
            name: "both".into(),
            f: Arc::new(|uow: &UnitOfWork, _rule: &Rule| {
                let types: Vec<&str> =
                    uow.correlated.iter().map(|e| e.event_type.as_str()).collect();
                Ok(ExpressionResult::from(types == ["c1", "c2"]))
            }),
        });
        let handler = harness.handler(vec![rule]);

        let trigger = correl_row("11", thing_event("2", "c2", "11", 10));
        handler.handle(vec![inserted(&trigger)]).await.unwrap();

        let details = harness.published_details();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0]["id"], "2.r2");
        assert_eq!(details[0]["type"], "r2");
        assert_eq!(details[0]["partitionKey"], "11");
        assert_eq!(details[0]["timestamp"], EVENT_TIME + 10);
        let trigger_ids: Vec<&str> = details[0]["triggers"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|t| t["id"].as_str())
            .collect();
        assert_eq!(trigger_ids, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_evaluate_many_bodies_get_ordinals() {
        let harness = Harness::new();
        harness.store.seed(correl_row("11", thing_event("1", "c1", "11", 0)));

        let mut rule = Rule::new("split", Flavor::Evaluate, exact("c1"));
        rule.expression = Some(Named {
            name: "two".into(),
            f: Arc::new(|_uow: &UnitOfWork, _rule: &Rule| {
                let body = |n: i64| {
                    let mut map = serde_json::Map::new();
                    map.insert("n".into(), json!(n));
                    map.insert("id".into(), json!("ignored"));
                    map
                };
                Ok(ExpressionResult::Many(vec![body(1), body(2)]))
            }),
        });
        let handler = harness.handler(vec![rule]);

        handler
            .handle(vec![inserted(&correl_row("11", thing_event("1", "c1", "11", 0)))])
            .await
            .unwrap();

        let mut details = harness.published_details();
        details.sort_by(|a, b| a["id"].as_str().cmp(&b["id"].as_str()));
        let ids: Vec<&str> = details.iter().filter_map(|d| d["id"].as_str()).collect();
        assert_eq!(ids, vec!["1.split.0", "1.split.1"]);
        assert_eq!(details[0]["n"], 1);
        assert_eq!(details[1]["n"], 2);
    }

    #[tokio::test]
    async fn test_evaluate_index_mode_resolves_unprocessed_keys() {
        let harness = Harness::new();
        for (id, offset) in [("1", 0), ("2", 10), ("3", 20)] {
            harness.store.seed(event_row(thing_event(id, "c1", "11", offset)));
        }
        harness.store.seed(event_row(thing_event("4", "c1", "99", 30)));
        harness.store.limit_batch_get(1);

        let mut rule = Rule::new("by-data", Flavor::Evaluate, exact("c1"));
        rule.index = Some("DataIndex".into());
        rule.expression = Some(Named {
            name: "three".into(),
            f: Arc::new(|uow: &UnitOfWork, _rule: &Rule| {
                Ok(ExpressionResult::from(uow.correlated.len() == 3))
            }),
        });
        let handler = harness.handler(vec![rule]);

        let trigger = event_row(thing_event("3", "c1", "11", 20));
        handler.handle(vec![inserted(&trigger)]).await.unwrap();

        assert_eq!(harness.store.batch_get_calls(), 3);
        let details = harness.published_details();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0]["partitionKey"], "11");
        assert_eq!(details[0]["triggers"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_correlated_reads_are_cached_per_invocation() {
        let harness = Harness::new();
        harness.store.seed(correl_row("11", thing_event("1", "c1", "11", 0)));
        harness.store.seed(correl_row("11", thing_event("2", "c1", "11", 10)));

        let mut rule = Rule::new("count", Flavor::Evaluate, exact("c1"));
        rule.parallel = Some(1);
        rule.expression = Some(Named {
            name: "always".into(),
            f: Arc::new(|_uow: &UnitOfWork, _rule: &Rule| Ok(ExpressionResult::Gate(true))),
        });
        let handler = harness.handler(vec![rule]);

        let first = inserted(&correl_row("11", thing_event("1", "c1", "11", 0)));
        let second = inserted(&correl_row("11", thing_event("2", "c1", "11", 10)));
        handler.handle(vec![first.clone(), second.clone()]).await.unwrap();
        assert_eq!(harness.store.query_calls(), 1);

        handler.handle(vec![first]).await.unwrap();
        assert_eq!(harness.store.query_calls(), 2);
    }

    #[tokio::test]
    async fn test_expression_error_becomes_fault() {
        let harness = Harness::new();
        harness.store.seed(correl_row("11", thing_event("1", "c1", "11", 0)));

        let mut rule = Rule::new("broken", Flavor::Evaluate, exact("c1"));
        rule.expression = Some(Named {
            name: "fails".into(),
            f: Arc::new(|_uow: &UnitOfWork, _rule: &Rule| {
                Err(anyhow::anyhow!("expression blew up"))
            }),
        });
        let handler = harness.handler(vec![rule]);

        let report = handler
            .handle(vec![inserted(&correl_row("11", thing_event("1", "c1", "11", 0)))])
            .await
            .unwrap();

        let faults: Vec<_> = report.faults().collect();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].tags.pipeline, "broken");
        assert!(faults[0].err.message.contains("expression blew up"));
        assert!(harness.published_details().is_empty());
    }

    #[tokio::test]
    async fn test_expire_emits_on_ttl_sweep() {
        let harness = Harness::new();
        let rule = Rule::new("exp", Flavor::Expire, exact("c1"));
        let handler = harness.handler(vec![rule]);

        let mut row = event_row(thing_event("1", "c1", "11", 0));
        row.expire = Some(Expire::Flag(true));
        let meta = RecordMeta {
            actor: Some(ChangeActor::ttl_sweep()),
            ..Default::default()
        };
        handler.handle(vec![removed(&row, meta)]).await.unwrap();

        let details = harness.published_details();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0]["id"], "1.exp");
        assert_eq!(details[0]["type"], "c1-expired");
        assert_eq!(details[0]["timestamp"], row.ttl * 1000);
        assert_eq!(details[0]["partitionKey"], "11");
        assert_eq!(details[0]["triggers"][0]["id"], "1");
    }

    #[tokio::test]
    async fn test_expire_uses_named_type() {
        let harness = Harness::new();
        let rule = Rule::new("exp", Flavor::Expire, exact("thing.created"));
        let handler = harness.handler(vec![rule]);

        let mut row = event_row(thing_event("1", "thing.created", "11", 0));
        row.expire = Some(Expire::Type("thing-timed-out".into()));
        let meta = RecordMeta {
            actor: Some(ChangeActor::ttl_sweep()),
            ..Default::default()
        };
        handler.handle(vec![removed(&row, meta)]).await.unwrap();

        let details = harness.published_details();
        assert_eq!(details[0]["type"], "thing-timed-out");
    }

    #[tokio::test]
    async fn test_expire_ignores_user_deletes_and_unflagged_rows() {
        let harness = Harness::new();
        let handler = harness.handler(vec![Rule::new("exp", Flavor::Expire, exact("c1"))]);

        let mut flagged = event_row(thing_event("1", "c1", "11", 0));
        flagged.expire = Some(Expire::Flag(true));
        let user = RecordMeta {
            actor: Some(ChangeActor {
                actor_type: "User".into(),
                principal_id: "ops".into(),
            }),
            ..Default::default()
        };
        let sweep = RecordMeta {
            actor: Some(ChangeActor::ttl_sweep()),
            ..Default::default()
        };
        let unflagged = event_row(thing_event("2", "c1", "11", 0));

        let report = handler
            .handle(vec![removed(&flagged, user), removed(&unflagged, sweep)])
            .await
            .unwrap();

        assert_eq!(report.processed().count(), 0);
        assert!(harness.published_details().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_entries_become_fault() {
        let harness = Harness::new();
        harness.publisher.always_reject("1.r1");
        let handler = harness.handler(vec![Rule::new("r1", Flavor::Evaluate, exact("c1"))]);

        let row = event_row(thing_event("1", "c1", "11", 0));
        let report = handler.handle(vec![inserted(&row)]).await.unwrap();

        assert_eq!(report.processed().count(), 0);
        let faults: Vec<_> = report.faults().collect();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].err.name, "RetryError");
        assert_eq!(harness.publisher.calls(), 3 + 1);
    }

    #[tokio::test]
    async fn test_collect_put_failure_isolates_item() {
        let harness = Harness::new();
        harness.store.fail_puts_for("2");
        let handler = harness.handler(vec![Rule::new("collect", Flavor::Collect, exact("c1"))]);

        let uows = ["1", "2", "3"]
            .into_iter()
            .map(|id| UnitOfWork::new(json!({}), thing_event(id, "c1", "11", 0)))
            .collect();
        let report = handler.handle(uows).await.unwrap();

        let mut processed: Vec<&str> = report
            .processed()
            .filter_map(|uow| uow.event.as_ref().map(|e| e.id.as_str()))
            .collect();
        processed.sort();
        assert_eq!(processed, vec!["1", "3"]);
        let faults: Vec<_> = report.faults().collect();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].tags.pipeline, "collect");
        assert!(faults[0].err.message.contains("put rejected for pk 2"));
        assert_eq!(harness.store.len(), 2);
    }

    #[tokio::test]
    async fn test_correlate_put_failure_isolates_item() {
        let harness = Harness::new();
        harness.store.fail_puts_for("22");
        let mut rule = Rule::new("c-rule", Flavor::Correlate, exact("c1"));
        rule.correlation_key = Some(CorrelationKey::Path("thing.id".into()));
        let handler = harness.handler(vec![rule]);

        let rows: Vec<UnitOfWork> = [("1", "11"), ("2", "22"), ("3", "33")]
            .into_iter()
            .map(|(id, thing)| inserted(&event_row(thing_event(id, "c1", thing, 0))))
            .collect();
        let report = handler.handle(rows).await.unwrap();

        assert_eq!(report.processed().count(), 2);
        let faults: Vec<_> = report.faults().collect();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].tags.pipeline, "c-rule");
        assert!(harness.store.get("11", "1").is_some());
        assert!(harness.store.get("22", "2").is_none());
        assert!(harness.store.get("33", "3").is_some());
    }

    #[tokio::test]
    async fn test_undecodable_row_becomes_fault() {
        let harness = Harness::new();
        let mut rule = Rule::new("c-rule", Flavor::Correlate, exact("c1"));
        rule.correlation_key = Some(CorrelationKey::Path("thing.id".into()));
        let handler = harness.handler(vec![rule]);

        let mut image = serde_json::to_value(event_row(thing_event("1", "c1", "11", 0))).unwrap();
        image.as_object_mut().unwrap().remove("ttl");
        let broken = change(ChangeImages::inserted(image), RecordMeta::default());
        let good = inserted(&event_row(thing_event("2", "c1", "22", 0)));

        let report = handler.handle(vec![broken, good]).await.unwrap();

        assert_eq!(report.processed().count(), 1);
        let faults: Vec<_> = report.faults().collect();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].tags.pipeline, "c-rule");
        assert!(faults[0].err.message.contains("ttl"));
        assert_eq!(harness.store.len(), 1);
    }

    #[tokio::test]
    async fn test_evaluate_suffix_must_match_exactly() {
        let harness = Harness::new();
        harness.store.seed(suffixed_row("11", None, thing_event("1", "c1", "11", 0)));
        harness.store.seed(suffixed_row("11", None, thing_event("3", "c1", "11", 30)));
        let paired = |id: &str, offset: i64| {
            suffixed_row("11.things", Some("things"), thing_event(id, "c1", "11", offset))
        };
        harness.store.seed(paired("1", 0));
        harness.store.seed(paired("2", 20));
        harness
            .store
            .seed(suffixed_row("11.things", None, thing_event("9", "c1", "11", 10)));

        let mut plain = Rule::new("plain", Flavor::Evaluate, exact("c1"));
        plain.expression = Some(always());
        let mut suffixed = Rule::new("paired", Flavor::Evaluate, exact("c1"));
        suffixed.correlation_key_suffix = Some("things".into());
        suffixed.expression = Some(always());
        let handler = harness.handler(vec![plain, suffixed]);

        let suffixed_insert = inserted(&paired("2", 20));
        let plain_insert = inserted(&suffixed_row("11", None, thing_event("3", "c1", "11", 30)));
        handler.handle(vec![suffixed_insert, plain_insert]).await.unwrap();

        let mut details = harness.published_details();
        details.sort_by(|a, b| a["id"].as_str().cmp(&b["id"].as_str()));
        let ids: Vec<&str> = details.iter().filter_map(|d| d["id"].as_str()).collect();
        assert_eq!(ids, vec!["2.paired", "3.plain"]);
        assert_eq!(trigger_ids(&details[0]), vec!["1", "2"]);
        assert_eq!(trigger_ids(&details[1]), vec!["1", "3"]);
    }
}
