// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::Map;
use std::sync::Arc;

use super::{changed_row, Emit, Rule};
use crate::engine::Invocation;
use crate::errors::{PipelineError, ResultExt};
use crate::model::{
    ChangeKind, Discriminator, DomainEvent, EventRecord, Expire, RecordMeta, UnitOfWork,
};
use crate::observability::messages::cep::{EventsDerived, RuleSkipped};
use crate::observability::messages::StructuredLog;
use crate::traits::Step;

/// Type of the expiry event for a row that expired while carrying `expire`.
///
/// A named type wins. Otherwise dot-delimited types get `.expired` and all
/// others `-expired`.
pub fn expired_type(original: &str, expire: &Expire) -> String {
    match expire {
        Expire::Type(custom) if !custom.is_empty() => custom.clone(),
        _ if original.contains('.') => format!("{}.expired", original),
        _ => format!("{}-expired", original),
    }
}

/// Whether a delete of a row with `ttl` (epoch seconds) came from the TTL sweep.
///
/// The actor identity decides when the stream reports one. Without it the
/// delete counts only when the TTL had elapsed by the time the change was
/// captured. A TTL still in the future is never an expiry.
pub fn ttl_sweep_eligible(meta: &RecordMeta, ttl: i64) -> bool {
    let ttl_ms = ttl.saturating_mul(1000);
    let elapsed = meta.approximate_creation_time.map(|created| ttl_ms <= created);
    match &meta.actor {
        Some(actor) => actor.is_ttl_sweep() && elapsed != Some(false),
        None => elapsed == Some(true),
    }
}

/// Turns TTL-sweep deletes of `EVENT` rows carrying `expire` into expiry events.
pub struct ExpireStep {
    rule: Arc<Rule>,
}

impl ExpireStep {
    pub fn new(rule: Arc<Rule>) -> Self {
        Self { rule }
    }

    fn derive(&self, uow: &UnitOfWork, row: &EventRecord, expire: &Expire) -> DomainEvent {
        let rule: &Rule = &self.rule;
        let source = &row.event;
        let event = DomainEvent {
            id: format!("{}.{}", source.id, rule.id),
            event_type: expired_type(&source.event_type, expire),
            partition_key: source.partition_key.clone(),
            timestamp: row.ttl.saturating_mul(1000),
            tags: source.tags.clone(),
            raw: None,
            triggers: Some(vec![source.trigger()]),
            body: Map::new(),
        };
        match &rule.emit {
            Some(Emit::Computed(emit)) => (emit.f)(uow, rule, event),
            _ => event,
        }
    }
}

#[async_trait]
impl Step for ExpireStep {
    async fn apply(
        &self,
        mut uow: UnitOfWork,
        _invocation: &Invocation,
    ) -> Result<Vec<UnitOfWork>, PipelineError> {
        let Some(row) = changed_row(&uow, ChangeKind::Remove)
            .with_uow(&uow)?
            .filter(|r| r.discriminator == Discriminator::Event)
            .filter(|r| self.rule.matches(&r.event, &uow))
        else {
            return Ok(Vec::new());
        };
        let Some(expire) = row.expire.clone().filter(Expire::is_enabled) else {
            return Ok(Vec::new());
        };

        if !ttl_sweep_eligible(&uow.meta, row.ttl) {
            RuleSkipped {
                rule_id: &self.rule.id,
                event_id: &row.event.id,
                reason: "delete was not a ttl sweep",
            }
            .log();
            return Ok(Vec::new());
        }

        let derived = self.derive(&uow, &row, &expire);
        EventsDerived {
            rule_id: &self.rule.id,
            source_event_id: &row.event.id,
            count: 1,
        }
        .log();
        uow.emit = Some(derived);
        Ok(vec![uow])
    }

    fn name(&self) -> &str {
        "expire"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChangeActor;

    #[test]
    fn test_expired_type_naming() {
        assert_eq!(expired_type("c1", &Expire::Flag(true)), "c1-expired");
        assert_eq!(
            expired_type("namespace.entity.action", &Expire::Flag(true)),
            "namespace.entity.action.expired"
        );
        assert_eq!(expired_type("c1", &Expire::Type("custom-type".into())), "custom-type");
        assert_eq!(expired_type("a.b", &Expire::Type("custom-type".into())), "custom-type");
    }

    #[test]
    fn test_actor_identity_is_authoritative() {
        let sweep = RecordMeta {
            actor: Some(ChangeActor::ttl_sweep()),
            ..Default::default()
        };
        assert!(ttl_sweep_eligible(&sweep, 100));

        let user = RecordMeta {
            actor: Some(ChangeActor {
                actor_type: "User".into(),
                principal_id: "ops".into(),
            }),
            approximate_creation_time: Some(200_000),
            ..Default::default()
        };
        assert!(!ttl_sweep_eligible(&user, 100));
    }

    #[test]
    fn test_elapsed_ttl_fallback() {
        let captured_after = RecordMeta {
            approximate_creation_time: Some(100_000),
            ..Default::default()
        };
        assert!(ttl_sweep_eligible(&captured_after, 100));
        assert!(!ttl_sweep_eligible(&captured_after, 101));
        assert!(!ttl_sweep_eligible(&RecordMeta::default(), 100));
    }

    #[test]
    fn test_unexpired_ttl_is_never_an_expiry() {
        let early = RecordMeta {
            actor: Some(ChangeActor::ttl_sweep()),
            approximate_creation_time: Some(50_000),
            ..Default::default()
        };
        assert!(!ttl_sweep_eligible(&early, 100));
    }
}
