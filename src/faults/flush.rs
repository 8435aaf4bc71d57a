// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use super::FaultChannel;
use crate::errors::PipelineError;
use crate::model::Fault;
use crate::observability::messages::faults::FaultsFlushed;
use crate::observability::messages::StructuredLog;
use crate::retry::{retry_partial, PutEntriesProtocol, RetryOptions};
use crate::traits::{PublishEntry, Publisher, PutEntriesRequest};

/// Publishes queued faults through the normal multi-put path.
#[derive(Clone)]
pub struct FaultFlusher {
    publisher: Arc<dyn Publisher>,
    source: String,
    retry: RetryOptions,
}

impl FaultFlusher {
    pub fn new(
        publisher: Arc<dyn Publisher>,
        source: impl Into<String>,
        retry: RetryOptions,
    ) -> Self {
        Self {
            publisher,
            source: source.into(),
            retry,
        }
    }

    /// Pop and publish one fault at a time until the queue is empty.
    ///
    /// Faults queued while the flush runs, requeued ones included, are drained
    /// by the same loop.
    pub async fn flush(&self, faults: &FaultChannel) -> Result<Vec<Fault>, PipelineError> {
        let mut published = Vec::new();
        while let Some(pending) = faults.pop() {
            match self.publish(&pending.fault).await {
                Ok(()) => published.push(pending.fault),
                Err(cause) => faults.requeue(pending, cause)?,
            }
        }
        if !published.is_empty() {
            FaultsFlushed {
                count: published.len(),
            }
            .log();
        }
        Ok(published)
    }

    async fn publish(&self, fault: &Fault) -> anyhow::Result<()> {
        let entry = PublishEntry::for_fault(&self.source, fault)?;
        let request = PutEntriesRequest {
            entries: vec![entry],
        };
        retry_partial(&PutEntriesProtocol, request, &self.retry, |req| {
            self.publisher.put_entries(req)
        })
        .await?;
        Ok(())
    }
}

impl std::fmt::Debug for FaultFlusher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultFlusher")
            .field("publisher", &self.publisher.name())
            .field("source", &self.source)
            .field("retry", &self.retry)
            .finish()
    }
}
