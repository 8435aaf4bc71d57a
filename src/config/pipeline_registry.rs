// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use crate::cep::{build_pipeline, RuleContext};
use crate::config::{Config, FunctionRegistry};
use crate::engine::Pipeline;
use crate::errors::{ConfigError, ValidationError};
use crate::observability::messages::validation::RulePipelineBuilt;
use crate::observability::messages::StructuredLog;
use crate::traits::Connectors;

/// Pipelines an invocation fans out to, in registration order.
#[derive(Debug, Default)]
pub struct PipelineRegistry {
    pipelines: Vec<Arc<Pipeline>>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one pipeline per enabled rule.
    pub fn from_config(
        config: &Config,
        functions: &FunctionRegistry,
        connectors: Connectors,
    ) -> Result<Self, ConfigError> {
        let ctx = RuleContext {
            connectors,
            source: config.source.clone(),
            retry: config.retry.clone(),
            batch: config.batch.clone(),
            ttl_days: config.ttl_days,
            parallel: config.parallel,
        };

        let mut registry = Self::new();
        for rule_config in config.enabled_rules() {
            let rule = functions.resolve(rule_config).map_err(ConfigError::Invalid)?;
            let flavor = rule.flavor;
            let pipeline = build_pipeline(rule, &ctx);
            RulePipelineBuilt {
                rule_id: pipeline.id(),
                flavor: flavor.as_str(),
                stage_count: pipeline.stages().len(),
            }
            .log();
            registry.register(pipeline)?;
        }
        Ok(registry)
    }

    /// Add a pipeline; ids must be unique.
    pub fn register(&mut self, pipeline: Pipeline) -> Result<(), ConfigError> {
        if self.get(pipeline.id()).is_some() {
            return Err(ConfigError::Invalid(vec![ValidationError::DuplicatePipeline {
                pipeline_id: pipeline.id().to_string(),
            }]));
        }
        self.pipelines.push(Arc::new(pipeline));
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Pipeline>> {
        self.pipelines.iter().find(|p| p.id() == id)
    }

    pub fn active(&self) -> Vec<Arc<Pipeline>> {
        self.pipelines.clone()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.pipelines.iter().map(|p| p.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}
