// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

use super::{Composer, Emitted, Invocation};
use crate::config::{validate_config, Config, FunctionRegistry, PipelineRegistry};
use crate::errors::{ConfigError, PipelineError};
use crate::faults::{FaultFlusher, FaultOptions};
use crate::model::{Fault, UnitOfWork};
use crate::observability::messages::engine::{InvocationCompleted, InvocationStarted};
use crate::observability::messages::StructuredLog;
use crate::traits::{Connectors, Publisher};

/// Everything one successful invocation produced.
#[derive(Debug, Clone)]
pub struct InvocationReport {
    pub invocation_id: String,
    pub outputs: Vec<Emitted>,
}

impl InvocationReport {
    pub fn processed(&self) -> impl Iterator<Item = &UnitOfWork> {
        self.outputs.iter().filter_map(|o| match o {
            Emitted::Processed(uow) => Some(uow),
            Emitted::Fault(_) => None,
        })
    }

    pub fn faults(&self) -> impl Iterator<Item = &Fault> {
        self.outputs.iter().filter_map(|o| match o {
            Emitted::Fault(fault) => Some(fault),
            Emitted::Processed(_) => None,
        })
    }
}

/// Entry point a host calls once per delivered batch.
#[derive(Debug)]
pub struct Handler {
    function_name: String,
    registry: PipelineRegistry,
    flusher: FaultFlusher,
    fault_options: FaultOptions,
    channel_capacity: usize,
}

impl Handler {
    pub fn new(
        function_name: impl Into<String>,
        registry: PipelineRegistry,
        flusher: FaultFlusher,
    ) -> Self {
        Self {
            function_name: function_name.into(),
            registry,
            flusher,
            fault_options: FaultOptions::default(),
            channel_capacity: crate::config::consts::DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Validate `config`, build a pipeline per rule and wire the fault flush to
    /// the connectors' publisher.
    pub fn from_config(
        config: &Config,
        functions: &FunctionRegistry,
        connectors: Connectors,
    ) -> Result<Self, ConfigError> {
        validate_config(config, functions).map_err(ConfigError::Invalid)?;
        let publisher: Arc<dyn Publisher> = Arc::clone(&connectors.publisher);
        let registry = PipelineRegistry::from_config(config, functions, connectors)?;
        let flusher = FaultFlusher::new(publisher, config.source.clone(), config.retry.clone());

        Ok(Self::new(config.function_name.clone(), registry, flusher)
            .with_fault_options(config.faults.clone())
            .with_channel_capacity(config.channel_capacity))
    }

    pub fn with_fault_options(mut self, fault_options: FaultOptions) -> Self {
        self.fault_options = fault_options;
        self
    }

    pub fn with_channel_capacity(mut self, channel_capacity: usize) -> Self {
        self.channel_capacity = channel_capacity;
        self
    }

    pub fn registry(&self) -> &PipelineRegistry {
        &self.registry
    }

    /// Register custom pipelines next to the rule-built ones.
    pub fn registry_mut(&mut self) -> &mut PipelineRegistry {
        &mut self.registry
    }

    pub async fn handle(&self, uows: Vec<UnitOfWork>) -> Result<InvocationReport, PipelineError> {
        let started = Instant::now();
        let invocation = Arc::new(Invocation::new(&self.function_name, self.fault_options.clone()));
        let composer = Composer::new(self.registry.active(), self.channel_capacity);

        let start = InvocationStarted {
            invocation_id: invocation.id(),
            function_name: &self.function_name,
            pipeline_count: composer.pipeline_count(),
            uow_count: uows.len(),
        };
        start.log();
        let span = start.span("handle");

        let outputs = composer
            .run(uows, Arc::clone(&invocation), &self.flusher)
            .instrument(span)
            .await?;

        let report = InvocationReport {
            invocation_id: invocation.id().to_string(),
            outputs,
        };
        InvocationCompleted {
            invocation_id: invocation.id(),
            processed: report.processed().count(),
            faults: report.faults().count(),
            duration: started.elapsed(),
        }
        .log();
        Ok(report)
    }
}
