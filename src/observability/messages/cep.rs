// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for rule flavor decisions.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A rule let a unit of work through without acting on it.
///
/// # Log Level
/// `trace!` - High volume
pub struct RuleSkipped<'a> {
    pub rule_id: &'a str,
    pub event_id: &'a str,
    pub reason: &'a str,
}

impl Display for RuleSkipped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Rule '{}' skipped event {}: {}",
            self.rule_id, self.event_id, self.reason
        )
    }
}

impl StructuredLog for RuleSkipped<'_> {
    fn log(&self) {
        tracing::trace!(
            rule_id = self.rule_id,
            event_id = self.event_id,
            reason = self.reason,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!("rule_skipped", span_name = name, rule_id = self.rule_id)
    }
}

/// An evaluate or expire rule derived higher-order events.
///
/// # Log Level
/// `debug!` - Per-rule detail
pub struct EventsDerived<'a> {
    pub rule_id: &'a str,
    pub source_event_id: &'a str,
    pub count: usize,
}

impl Display for EventsDerived<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Rule '{}' derived {} events from {}",
            self.rule_id, self.count, self.source_event_id
        )
    }
}

impl StructuredLog for EventsDerived<'_> {
    fn log(&self) {
        tracing::debug!(
            rule_id = self.rule_id,
            source_event_id = self.source_event_id,
            count = self.count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "events_derived",
            span_name = name,
            rule_id = self.rule_id,
            count = self.count,
        )
    }
}
