// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::{Invocation, Pipeline};
use crate::errors::PipelineError;
use crate::faults::FaultFlusher;
use crate::model::{Fault, UnitOfWork};
use crate::observability::messages::engine::{DefectAborted, PipelineDrained};
use crate::observability::messages::StructuredLog;

/// One item of the merged output sequence.
#[derive(Debug, Clone)]
pub enum Emitted {
    Processed(UnitOfWork),
    Fault(Fault),
}

/// Fans head units of work out to every pipeline and merges what comes back.
pub struct Composer {
    pipelines: Vec<Arc<Pipeline>>,
    channel_capacity: usize,
}

impl Composer {
    pub fn new(pipelines: Vec<Arc<Pipeline>>, channel_capacity: usize) -> Self {
        Self {
            pipelines,
            channel_capacity: channel_capacity.max(1),
        }
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Run every pipeline over `uows`, then flush the faults they queued.
    ///
    /// Processed units of work come first, in completion order, followed by the
    /// published faults. A defect anywhere cancels every line and the call fails
    /// with no output.
    pub async fn run(
        &self,
        uows: Vec<UnitOfWork>,
        invocation: Arc<Invocation>,
        flusher: &FaultFlusher,
    ) -> Result<Vec<Emitted>, PipelineError> {
        let cancel = invocation.cancellation().clone();
        let (merged_tx, mut merged_rx) = mpsc::channel(self.channel_capacity);
        let mut tasks: JoinSet<Result<(), PipelineError>> = JoinSet::new();
        let mut heads = Vec::with_capacity(self.pipelines.len());

        for pipeline in &self.pipelines {
            let (head_tx, head_rx) = mpsc::channel(self.channel_capacity);
            pipeline.spawn_line(
                head_rx,
                merged_tx.clone(),
                Arc::clone(&invocation),
                self.channel_capacity,
                &mut tasks,
            );
            heads.push((pipeline.id().to_string(), head_tx));
        }
        drop(merged_tx);
        tasks.spawn(broadcast(uows, heads, cancel.clone()));

        let mut processed: Vec<UnitOfWork> = Vec::new();
        let mut defect: Option<PipelineError> = None;

        loop {
            tokio::select! {
                received = merged_rx.recv() => match received {
                    Some(uow) => processed.push(uow),
                    None => break,
                },
                Some(joined) = tasks.join_next() => {
                    record_outcome(joined, &mut defect, &cancel);
                }
            }
        }
        while let Some(joined) = tasks.join_next().await {
            record_outcome(joined, &mut defect, &cancel);
        }

        if let Some(err) = defect {
            DefectAborted {
                invocation_id: invocation.id(),
                error: &err,
            }
            .log();
            return Err(err);
        }

        for pipeline in &self.pipelines {
            PipelineDrained {
                pipeline_id: pipeline.id(),
                emitted: processed
                    .iter()
                    .filter(|u| u.pipeline.as_deref() == Some(pipeline.id()))
                    .count(),
            }
            .log();
        }

        let faults = flusher.flush(invocation.faults()).await.map_err(|err| {
            DefectAborted {
                invocation_id: invocation.id(),
                error: &err,
            }
            .log();
            err
        })?;

        Ok(processed
            .into_iter()
            .map(Emitted::Processed)
            .chain(faults.into_iter().map(Emitted::Fault))
            .collect())
    }
}

fn record_outcome(
    joined: Result<Result<(), PipelineError>, tokio::task::JoinError>,
    defect: &mut Option<PipelineError>,
    cancel: &CancellationToken,
) {
    let err = match joined {
        Ok(Ok(())) => return,
        Ok(Err(err)) => err,
        Err(join) => PipelineError::fatal(join),
    };
    cancel.cancel();
    defect.get_or_insert(err);
}

/// Clone every unit of work into every pipeline, tagged with the pipeline id.
async fn broadcast(
    uows: Vec<UnitOfWork>,
    heads: Vec<(String, mpsc::Sender<UnitOfWork>)>,
    cancel: CancellationToken,
) -> Result<(), PipelineError> {
    for uow in uows {
        for (pipeline_id, head) in &heads {
            let mut copy = uow.clone();
            copy.pipeline = Some(pipeline_id.clone());
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                sent = head.send(copy) => {
                    // The line already stopped; it has nothing left to receive
                    let _ = sent;
                }
            }
        }
    }
    Ok(())
}
