// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for fault capture and flush.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A recoverable error was turned into a fault and queued.
///
/// # Log Level
/// `warn!` - Business fault, processing continues
pub struct FaultCaptured<'a> {
    pub fault_id: &'a str,
    pub pipeline: &'a str,
    pub error: &'a str,
}

impl Display for FaultCaptured<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Fault {} captured in pipeline '{}': {}",
            self.fault_id, self.pipeline, self.error
        )
    }
}

impl StructuredLog for FaultCaptured<'_> {
    fn log(&self) {
        tracing::warn!(
            fault_id = self.fault_id,
            pipeline = self.pipeline,
            error = self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::WARN,
            "fault",
            span_name = name,
            fault_id = self.fault_id,
            pipeline = self.pipeline,
        )
    }
}

/// A fault was over the size limit and its unit of work was cut down to ids.
///
/// # Log Level
/// `debug!` - Expected for large payloads
pub struct FaultTrimmed<'a> {
    pub fault_id: &'a str,
    pub size: usize,
    pub limit: usize,
}

impl Display for FaultTrimmed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Fault {} is {} bytes (limit {}), keeping identifiers only",
            self.fault_id, self.size, self.limit
        )
    }
}

impl StructuredLog for FaultTrimmed<'_> {
    fn log(&self) {
        tracing::debug!(
            fault_id = self.fault_id,
            size = self.size,
            limit = self.limit,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("fault_trimmed", span_name = name, fault_id = self.fault_id)
    }
}

/// The trailing flush published the queued faults.
///
/// # Log Level
/// `info!` - Operational summary
pub struct FaultsFlushed {
    pub count: usize,
}

impl Display for FaultsFlushed {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Flushed {} faults", self.count)
    }
}

impl StructuredLog for FaultsFlushed {
    fn log(&self) {
        tracing::info!(count = self.count, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("faults_flushed", span_name = name, count = self.count)
    }
}

/// Publishing a fault failed; it goes back on the queue once.
///
/// # Log Level
/// `warn!` - A second failure escalates to a defect
pub struct FaultRepublishFailed<'a> {
    pub fault_id: &'a str,
    pub error: &'a str,
    pub requeued: bool,
}

impl Display for FaultRepublishFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        if self.requeued {
            write!(f, "Publishing fault {} failed, requeued: {}", self.fault_id, self.error)
        } else {
            write!(f, "Publishing fault {} failed again: {}", self.fault_id, self.error)
        }
    }
}

impl StructuredLog for FaultRepublishFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            fault_id = self.fault_id,
            error = self.error,
            requeued = self.requeued,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::WARN,
            "fault_republish",
            span_name = name,
            fault_id = self.fault_id,
        )
    }
}
