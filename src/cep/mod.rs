// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Complex event processing over a single append-only, TTL-capable table.
//!
//! Four flavors share the table:
//! * `Collect` stores every matching bus event as its canonical `EVENT` row
//! * `Correlate` reacts to `EVENT` inserts by writing `CORREL` pointer rows
//!   under a correlation key
//! * `Evaluate` reacts to inserts by reading the correlated set and deriving
//!   higher-order events
//! * `Expire` reacts to TTL-sweep deletes and turns them into expiry events
//!
//! The flavor is a closed enum, so building a pipeline for a rule is an
//! exhaustive match.

mod collect;
mod correlate;
mod evaluate;
mod expire;
mod publish;
pub mod rule;

#[cfg(test)]
mod integration_tests;

pub use collect::CollectStep;
pub use correlate::CorrelateStep;
pub use evaluate::EvaluateStep;
pub use expire::{expired_type, ttl_sweep_eligible, ExpireStep};
pub use publish::{PublishStep, ToEntryStep};
pub use rule::{CorrelationKey, Emit, EventTypeMatcher, ExpressionResult, Named, Rule};

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::batching::BatchOptions;
use crate::config::consts::{
    DEFAULT_PARALLEL, DEFAULT_SOURCE, DEFAULT_TTL_DAYS, SECONDS_PER_DAY,
};
use crate::engine::Pipeline;
use crate::model::{ChangeKind, EventRecord, UnitOfWork};
use crate::retry::RetryOptions;
use crate::traits::Connectors;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flavor {
    Collect,
    Correlate,
    Evaluate,
    Expire,
}

impl Flavor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flavor::Collect => "collect",
            Flavor::Correlate => "correlate",
            Flavor::Evaluate => "evaluate",
            Flavor::Expire => "expire",
        }
    }
}

/// Shared settings every rule pipeline is built with.
#[derive(Debug, Clone)]
pub struct RuleContext {
    pub connectors: Connectors,
    pub source: String,
    pub retry: RetryOptions,
    pub batch: BatchOptions,
    pub ttl_days: i64,
    pub parallel: usize,
}

impl RuleContext {
    pub fn new(connectors: Connectors) -> Self {
        Self {
            connectors,
            source: DEFAULT_SOURCE.to_string(),
            retry: RetryOptions::default(),
            batch: BatchOptions::default(),
            ttl_days: DEFAULT_TTL_DAYS,
            parallel: DEFAULT_PARALLEL,
        }
    }
}

/// Build the pipeline a rule describes; its id is the rule id.
pub fn build_pipeline(rule: Rule, ctx: &RuleContext) -> Pipeline {
    let width = rule.parallel.unwrap_or(ctx.parallel);
    let rule = Arc::new(rule);
    let store = Arc::clone(&ctx.connectors.event_store);
    let builder = Pipeline::builder(rule.id.clone());

    let builder = match rule.flavor {
        Flavor::Collect => builder.step_with_width(
            CollectStep::new(Arc::clone(&rule), store, ctx.ttl_days),
            width,
        ),
        Flavor::Correlate => builder.step_with_width(
            CorrelateStep::new(Arc::clone(&rule), store, ctx.ttl_days),
            width,
        ),
        Flavor::Evaluate => builder.step_with_width(
            EvaluateStep::new(Arc::clone(&rule), store, ctx.retry.clone()),
            width,
        ),
        Flavor::Expire => builder.step_with_width(ExpireStep::new(Arc::clone(&rule)), width),
    };

    match rule.flavor {
        Flavor::Collect | Flavor::Correlate => builder.build(),
        Flavor::Evaluate | Flavor::Expire => builder
            .step(ToEntryStep::new(ctx.source.clone()))
            .batch(ctx.batch.clone(), ctx.connectors.claim_check.clone())
            .step_with_width(
                PublishStep::new(Arc::clone(&ctx.connectors.publisher), ctx.retry.clone()),
                width,
            )
            .build(),
    }
}

/// Epoch-seconds expiry for a row written at `timestamp_ms`.
pub fn ttl_for(timestamp_ms: i64, days: i64) -> i64 {
    timestamp_ms / 1000 + days * SECONDS_PER_DAY
}

/// The row a table-stream unit of work is about, if the change is of `kind`.
///
/// Inserts carry the new image, removes the old one. An image that is not a
/// table row is an error.
pub(crate) fn changed_row(
    uow: &UnitOfWork,
    kind: ChangeKind,
) -> Result<Option<EventRecord>, serde_json::Error> {
    let Some(images) = uow
        .event
        .as_ref()
        .filter(|e| e.change_kind() == Some(kind))
        .and_then(|e| e.raw.as_ref())
    else {
        return Ok(None);
    };
    match kind {
        ChangeKind::Insert | ChangeKind::Modify => images.new_record(),
        ChangeKind::Remove => images.old_record(),
    }
}
