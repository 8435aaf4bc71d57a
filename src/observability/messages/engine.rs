// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for invocation lifecycle events.
//!
//! This module contains message types for logging events related to:
//! * Invocation start and completion
//! * Per-pipeline completion counts
//! * Defect aborts

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// An invocation received its batch of units of work.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use the_tributary::observability::messages::engine::InvocationStarted;
///
/// let msg = InvocationStarted {
///     invocation_id: "abc",
///     function_name: "listener",
///     pipeline_count: 3,
///     uow_count: 10,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct InvocationStarted<'a> {
    pub invocation_id: &'a str,
    pub function_name: &'a str,
    pub pipeline_count: usize,
    pub uow_count: usize,
}

impl Display for InvocationStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Invocation {} of {} started: {} units of work across {} pipelines",
            self.invocation_id, self.function_name, self.uow_count, self.pipeline_count
        )
    }
}

impl StructuredLog for InvocationStarted<'_> {
    fn log(&self) {
        tracing::info!(
            invocation_id = self.invocation_id,
            function_name = self.function_name,
            pipeline_count = self.pipeline_count,
            uow_count = self.uow_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "invocation",
            span_name = name,
            invocation_id = self.invocation_id,
            function_name = self.function_name,
        )
    }
}

/// An invocation drained every pipeline and flushed its faults.
///
/// # Log Level
/// `info!` - Important operational event
pub struct InvocationCompleted<'a> {
    pub invocation_id: &'a str,
    pub processed: usize,
    pub faults: usize,
    pub duration: std::time::Duration,
}

impl Display for InvocationCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Invocation {} completed: {} processed, {} faults in {:?}",
            self.invocation_id, self.processed, self.faults, self.duration
        )
    }
}

impl StructuredLog for InvocationCompleted<'_> {
    fn log(&self) {
        tracing::info!(
            invocation_id = self.invocation_id,
            processed = self.processed,
            faults = self.faults,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "invocation_completed",
            span_name = name,
            invocation_id = self.invocation_id,
            duration = ?self.duration,
        )
    }
}

/// One pipeline's line ran to completion.
///
/// # Log Level
/// `debug!` - Per-pipeline detail
pub struct PipelineDrained<'a> {
    pub pipeline_id: &'a str,
    pub emitted: usize,
}

impl Display for PipelineDrained<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Pipeline '{}' drained, {} units of work emitted",
            self.pipeline_id, self.emitted
        )
    }
}

impl StructuredLog for PipelineDrained<'_> {
    fn log(&self) {
        tracing::debug!(
            pipeline_id = self.pipeline_id,
            emitted = self.emitted,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("pipeline", span_name = name, pipeline_id = self.pipeline_id)
    }
}

/// A defect aborted the invocation; the host will redeliver the batch.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use the_tributary::observability::messages::engine::DefectAborted;
///
/// let error = std::io::Error::new(std::io::ErrorKind::Other, "no entry");
/// let msg = DefectAborted {
///     invocation_id: "abc",
///     error: &error,
/// };
///
/// assert_eq!(msg.to_string(), "Invocation abc aborted by defect: no entry");
/// ```
pub struct DefectAborted<'a> {
    pub invocation_id: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for DefectAborted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Invocation {} aborted by defect: {}",
            self.invocation_id, self.error
        )
    }
}

impl StructuredLog for DefectAborted<'_> {
    fn log(&self) {
        tracing::error!(
            invocation_id = self.invocation_id,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::ERROR,
            "defect",
            span_name = name,
            invocation_id = self.invocation_id,
            error = %self.error,
        )
    }
}
