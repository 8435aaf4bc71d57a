// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for configuration loading and validation.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A configuration file was read and parsed.
///
/// # Log Level
/// `info!` - Startup milestone
///
/// # Example
/// ```
/// use the_tributary::observability::messages::validation::ConfigLoaded;
///
/// let msg = ConfigLoaded {
///     path: "configs/listener.yaml",
///     rule_count: 3,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct ConfigLoaded<'a> {
    pub path: &'a str,
    pub rule_count: usize,
}

impl Display for ConfigLoaded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Loaded configuration from {} with {} rules", self.path, self.rule_count)
    }
}

impl StructuredLog for ConfigLoaded<'_> {
    fn log(&self) {
        tracing::info!(path = self.path, rule_count = self.rule_count, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::INFO,
            "config",
            span_name = name,
            path = self.path,
        )
    }
}

/// Validation rejected a configuration.
///
/// # Log Level
/// `error!` - The handler cannot be built
pub struct ConfigRejected<'a> {
    pub errors: &'a [crate::errors::ValidationError],
}

impl Display for ConfigRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Configuration rejected with {} errors", self.errors.len())
    }
}

impl StructuredLog for ConfigRejected<'_> {
    fn log(&self) {
        for error in self.errors {
            tracing::error!(error = %error, "Validation error");
        }
        tracing::error!(error_count = self.errors.len(), "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::ERROR,
            "config",
            span_name = name,
            error_count = self.errors.len(),
        )
    }
}

/// A rule was turned into a running pipeline.
///
/// # Log Level
/// `debug!` - Per-rule detail
pub struct RulePipelineBuilt<'a> {
    pub rule_id: &'a str,
    pub flavor: &'a str,
    pub stage_count: usize,
}

impl Display for RulePipelineBuilt<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Built {} pipeline '{}' with {} stages",
            self.flavor, self.rule_id, self.stage_count
        )
    }
}

impl StructuredLog for RulePipelineBuilt<'_> {
    fn log(&self) {
        tracing::debug!(
            rule_id = self.rule_id,
            flavor = self.flavor,
            stage_count = self.stage_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::DEBUG,
            "config",
            span_name = name,
            rule_id = self.rule_id,
        )
    }
}
