// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use super::{claim_check, BatchError, BatchOptions};
use crate::errors::PipelineError;
use crate::model::UnitOfWork;
use crate::observability::messages::batching::BatchFlushed;
use crate::observability::messages::StructuredLog;
use crate::traits::ClaimCheckStore;

/// Single-pass grouping under a count and byte budget.
///
/// Every batch returned by [`push`](Self::push) or [`finish`](Self::finish)
/// holds at most `batch_size` members whose entries total at most
/// `max_request_size` bytes.
pub struct SizeBoundedBatcher {
    options: BatchOptions,
    claim_check: Option<Arc<dyn ClaimCheckStore>>,
    current: Vec<UnitOfWork>,
    current_bytes: usize,
}

impl SizeBoundedBatcher {
    pub fn new(options: BatchOptions, claim_check: Option<Arc<dyn ClaimCheckStore>>) -> Self {
        Self {
            options,
            claim_check,
            current: Vec::new(),
            current_bytes: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    /// Add one unit of work, returning the previous batch if it had to close.
    ///
    /// An oversized entry is claim-checked when a store is configured and
    /// fails with [`BatchError::Oversized`] otherwise. A unit of work without an
    /// entry is a wiring defect.
    pub async fn push(
        &mut self,
        mut uow: UnitOfWork,
    ) -> Result<Option<Vec<UnitOfWork>>, PipelineError> {
        let Some(entry) = uow.entry.as_ref() else {
            return Err(PipelineError::fatal(BatchError::MissingEntry {
                pipeline: uow.pipeline.clone().unwrap_or_default(),
            }));
        };

        let limit = self.options.max_request_size;
        let mut size = entry.size_bytes();

        if size > limit {
            let entry_id = entry.id.clone();
            let Some(store) = self.claim_check.as_ref() else {
                return Err(PipelineError::recoverable(
                    uow,
                    BatchError::Oversized { entry_id, size, limit },
                ));
            };
            size = claim_check::apply(store.as_ref(), &mut uow).await?;
            if size > limit {
                return Err(PipelineError::recoverable(
                    uow,
                    BatchError::PointerTooLarge { entry_id, size, limit },
                ));
            }
        }

        let max_members = self.options.batch_size.max(1);
        let closed = if !self.current.is_empty()
            && (self.current.len() + 1 > max_members || self.current_bytes + size > limit)
        {
            Some(self.take())
        } else {
            None
        };

        self.current.push(uow);
        self.current_bytes += size;
        Ok(closed)
    }

    /// Close whatever is left once the input is exhausted.
    pub fn finish(&mut self) -> Option<Vec<UnitOfWork>> {
        if self.current.is_empty() {
            None
        } else {
            Some(self.take())
        }
    }

    fn take(&mut self) -> Vec<UnitOfWork> {
        BatchFlushed {
            members: self.current.len(),
            bytes: self.current_bytes,
        }
        .log();
        self.current_bytes = 0;
        std::mem::take(&mut self.current)
    }
}
