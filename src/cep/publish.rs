// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The tail every event-emitting flavor shares: entry, batch, multi-put.

use async_trait::async_trait;
use std::sync::Arc;

use crate::engine::Invocation;
use crate::errors::{PipelineError, ResultExt};
use crate::model::UnitOfWork;
use crate::retry::{retry_partial, PutEntriesProtocol, RetryOptions};
use crate::traits::{PublishEntry, Publisher, PutEntriesRequest, Step};

/// Turns `emit` into the outbound bus entry. Units of work with nothing to
/// emit stop here.
pub struct ToEntryStep {
    source: String,
}

impl ToEntryStep {
    pub fn new(source: impl Into<String>) -> Self {
        Self { source: source.into() }
    }
}

#[async_trait]
impl Step for ToEntryStep {
    async fn apply(
        &self,
        mut uow: UnitOfWork,
        _invocation: &Invocation,
    ) -> Result<Vec<UnitOfWork>, PipelineError> {
        let Some(emit) = uow.emit.as_ref() else {
            return Ok(Vec::new());
        };
        let entry = PublishEntry::for_event(&self.source, emit).with_uow(&uow)?;
        uow.entry = Some(entry);
        Ok(vec![uow])
    }

    fn name(&self) -> &str {
        "to-entry"
    }
}

/// Publishes one batch with the partial-failure retry and hands the members
/// back, each with the outcome of its own entry.
pub struct PublishStep {
    publisher: Arc<dyn Publisher>,
    retry: RetryOptions,
}

impl PublishStep {
    pub fn new(publisher: Arc<dyn Publisher>, retry: RetryOptions) -> Self {
        Self { publisher, retry }
    }
}

#[async_trait]
impl Step for PublishStep {
    async fn apply(
        &self,
        uow: UnitOfWork,
        _invocation: &Invocation,
    ) -> Result<Vec<UnitOfWork>, PipelineError> {
        let entries: Vec<PublishEntry> = uow.batch.iter().filter_map(|m| m.entry.clone()).collect();
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let request = PutEntriesRequest { entries };
        let attempted = retry_partial(&PutEntriesProtocol, request, &self.retry, |req| {
            self.publisher.put_entries(req)
        })
        .await
        .with_uow(&uow)?;

        Ok(uow
            .batch
            .into_iter()
            .map(|mut member| {
                member.response = member
                    .entry
                    .as_ref()
                    .and_then(|e| attempted.output.outcome_for(&e.id))
                    .and_then(|outcome| serde_json::to_value(outcome).ok());
                member
            })
            .collect())
    }

    fn name(&self) -> &str {
        "publish"
    }
}
