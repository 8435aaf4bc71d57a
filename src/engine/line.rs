// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! A pipeline is an ordered chain of stages run as one task per stage.
//!
//! Stages are linked by bounded channels. A step stage keeps at most `width`
//! units of work in flight and stops pulling from upstream while saturated, so
//! a full downstream channel stalls the whole line back to the broadcaster.
//! Width 1 preserves arrival order; wider stages may complete out of order.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use super::stages::{filter_step, flat_map_step, map_step};
use super::Invocation;
use crate::batching::{BatchOptions, SizeBoundedBatcher};
use crate::errors::PipelineError;
use crate::model::UnitOfWork;
use crate::traits::{ClaimCheckStore, Step};

pub enum Stage {
    Step { step: Arc<dyn Step>, width: usize },
    Batch {
        options: BatchOptions,
        claim_check: Option<Arc<dyn ClaimCheckStore>>,
    },
}

impl Stage {
    pub fn name(&self) -> &str {
        match self {
            Stage::Step { step, .. } => step.name(),
            Stage::Batch { .. } => "batch",
        }
    }
}

pub struct Pipeline {
    id: String,
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn builder(id: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder {
            id: id.into(),
            stages: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Spawn one task per stage, reading from `input` and writing the line's
    /// results to `output`.
    pub(crate) fn spawn_line(
        self: &Arc<Self>,
        input: mpsc::Receiver<UnitOfWork>,
        output: mpsc::Sender<UnitOfWork>,
        invocation: Arc<Invocation>,
        channel_capacity: usize,
        tasks: &mut JoinSet<Result<(), PipelineError>>,
    ) {
        let mut upstream = input;
        for index in 0..self.stages.len() {
            let (tx, rx) = if index + 1 == self.stages.len() {
                (output.clone(), None)
            } else {
                let (tx, rx) = mpsc::channel(channel_capacity.max(1));
                (tx, Some(rx))
            };

            let pipeline = Arc::clone(self);
            let invocation = Arc::clone(&invocation);
            let stage_input = upstream;
            tasks.spawn(async move {
                pipeline.run_stage(index, stage_input, tx, invocation).await
            });

            match rx {
                Some(rx) => upstream = rx,
                None => return,
            }
        }

        // A line without stages passes items straight through
        tasks.spawn(run_passthrough(upstream, output, invocation));
    }

    async fn run_stage(
        &self,
        index: usize,
        input: mpsc::Receiver<UnitOfWork>,
        output: mpsc::Sender<UnitOfWork>,
        invocation: Arc<Invocation>,
    ) -> Result<(), PipelineError> {
        match &self.stages[index] {
            Stage::Step { step, width } => {
                run_step(Arc::clone(step), *width, input, output, invocation).await
            }
            Stage::Batch { options, claim_check } => {
                let batcher = SizeBoundedBatcher::new(options.clone(), claim_check.clone());
                run_batch(batcher, input, output, invocation).await
            }
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stages: Vec<&str> = self.stages.iter().map(Stage::name).collect();
        f.debug_struct("Pipeline")
            .field("id", &self.id)
            .field("stages", &stages)
            .finish()
    }
}

pub struct PipelineBuilder {
    id: String,
    stages: Vec<Stage>,
}

impl PipelineBuilder {
    pub fn map<F>(self, name: &str, f: F) -> Self
    where
        F: Fn(UnitOfWork) -> Result<UnitOfWork, PipelineError> + Send + Sync + 'static,
    {
        self.step(map_step(name, f))
    }

    pub fn filter<F>(self, name: &str, predicate: F) -> Self
    where
        F: Fn(&UnitOfWork) -> bool + Send + Sync + 'static,
    {
        self.step(filter_step(name, predicate))
    }

    pub fn flat_map<F>(self, name: &str, f: F) -> Self
    where
        F: Fn(UnitOfWork) -> Result<Vec<UnitOfWork>, PipelineError> + Send + Sync + 'static,
    {
        self.step(flat_map_step(name, f))
    }

    /// Sequential step.
    pub fn step(self, step: impl Step + 'static) -> Self {
        self.step_with_width(step, 1)
    }

    pub fn step_with_width(mut self, step: impl Step + 'static, width: usize) -> Self {
        self.stages.push(Stage::Step {
            step: Arc::new(step),
            width: width.max(1),
        });
        self
    }

    pub fn batch(
        mut self,
        options: BatchOptions,
        claim_check: Option<Arc<dyn ClaimCheckStore>>,
    ) -> Self {
        self.stages.push(Stage::Batch { options, claim_check });
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            id: self.id,
            stages: self.stages,
        }
    }
}

async fn run_step(
    step: Arc<dyn Step>,
    width: usize,
    mut input: mpsc::Receiver<UnitOfWork>,
    output: mpsc::Sender<UnitOfWork>,
    invocation: Arc<Invocation>,
) -> Result<(), PipelineError> {
    let cancel = invocation.cancellation().clone();
    let mut in_flight: JoinSet<Result<Vec<UnitOfWork>, PipelineError>> = JoinSet::new();
    let mut open = true;

    loop {
        if !open && in_flight.is_empty() {
            return Ok(());
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                in_flight.abort_all();
                return Ok(());
            }
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                let result = joined.map_err(PipelineError::fatal)?;
                if !forward(result, &output, &invocation).await? {
                    return Ok(());
                }
            }
            received = input.recv(), if open && in_flight.len() < width => {
                match received {
                    Some(uow) => {
                        let step = Arc::clone(&step);
                        let invocation = Arc::clone(&invocation);
                        in_flight.spawn(async move { step.apply(uow, &invocation).await });
                    }
                    None => open = false,
                }
            }
        }
    }
}

async fn run_batch(
    mut batcher: SizeBoundedBatcher,
    mut input: mpsc::Receiver<UnitOfWork>,
    output: mpsc::Sender<UnitOfWork>,
    invocation: Arc<Invocation>,
) -> Result<(), PipelineError> {
    let cancel = invocation.cancellation().clone();

    loop {
        let received = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            received = input.recv() => received,
        };
        let Some(uow) = received else {
            break;
        };

        match batcher.push(uow).await {
            Ok(Some(members)) => {
                if output.send(UnitOfWork::batch_of(members)).await.is_err() {
                    return Ok(());
                }
            }
            Ok(None) => {}
            Err(err) => invocation.capture(err)?,
        }
    }

    if let Some(members) = batcher.finish() {
        let _ = output.send(UnitOfWork::batch_of(members)).await;
    }
    Ok(())
}

async fn run_passthrough(
    mut input: mpsc::Receiver<UnitOfWork>,
    output: mpsc::Sender<UnitOfWork>,
    invocation: Arc<Invocation>,
) -> Result<(), PipelineError> {
    let cancel = invocation.cancellation().clone();
    loop {
        let received = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            received = input.recv() => received,
        };
        match received {
            Some(uow) => {
                if output.send(uow).await.is_err() {
                    return Ok(());
                }
            }
            None => return Ok(()),
        }
    }
}

/// Send a step's outputs downstream or queue its error as a fault.
///
/// Returns `false` once the downstream stage has gone away.
async fn forward(
    result: Result<Vec<UnitOfWork>, PipelineError>,
    output: &mpsc::Sender<UnitOfWork>,
    invocation: &Invocation,
) -> Result<bool, PipelineError> {
    match result {
        Ok(outputs) => {
            for uow in outputs {
                if output.send(uow).await.is_err() {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Err(err) => {
            invocation.capture(err)?;
            Ok(true)
        }
    }
}
