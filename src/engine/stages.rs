// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Closure-backed steps for custom pipelines.

use async_trait::async_trait;

use crate::engine::Invocation;
use crate::errors::PipelineError;
use crate::model::UnitOfWork;
use crate::traits::Step;

/// A synchronous transform lifted into a [`Step`].
pub struct FnStep<F> {
    name: String,
    f: F,
}

impl<F> FnStep<F>
where
    F: Fn(UnitOfWork) -> Result<Vec<UnitOfWork>, PipelineError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self { name: name.into(), f }
    }
}

#[async_trait]
impl<F> Step for FnStep<F>
where
    F: Fn(UnitOfWork) -> Result<Vec<UnitOfWork>, PipelineError> + Send + Sync,
{
    async fn apply(
        &self,
        uow: UnitOfWork,
        _invocation: &Invocation,
    ) -> Result<Vec<UnitOfWork>, PipelineError> {
        (self.f)(uow)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

pub fn map_step<F>(name: &str, f: F) -> impl Step
where
    F: Fn(UnitOfWork) -> Result<UnitOfWork, PipelineError> + Send + Sync,
{
    FnStep::new(name, move |uow| f(uow).map(|out| vec![out]))
}

pub fn filter_step<F>(name: &str, predicate: F) -> impl Step
where
    F: Fn(&UnitOfWork) -> bool + Send + Sync,
{
    FnStep::new(name, move |uow| {
        if predicate(&uow) {
            Ok(vec![uow])
        } else {
            Ok(Vec::new())
        }
    })
}

pub fn flat_map_step<F>(name: &str, f: F) -> impl Step
where
    F: Fn(UnitOfWork) -> Result<Vec<UnitOfWork>, PipelineError> + Send + Sync,
{
    FnStep::new(name, f)
}
