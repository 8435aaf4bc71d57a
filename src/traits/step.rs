// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::engine::Invocation;
use crate::errors::PipelineError;
use crate::model::UnitOfWork;

/// One per-item stage of a pipeline line.
///
/// Returning an empty vector filters the item out; returning several fans it
/// out. Errors tagged with a unit of work become faults and the line moves on,
/// fatal errors abort the invocation.
#[async_trait]
pub trait Step: Send + Sync {
    async fn apply(
        &self,
        uow: UnitOfWork,
        invocation: &Invocation,
    ) -> Result<Vec<UnitOfWork>, PipelineError>;

    fn name(&self) -> &str;
}
