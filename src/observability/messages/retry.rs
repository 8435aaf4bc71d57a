// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for partial-failure retries.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A narrowed request was scheduled for another attempt.
///
/// # Log Level
/// `debug!` - Expected under throttling
pub struct RetryScheduled<'a> {
    pub operation: &'a str,
    pub attempt: u32,
    pub max_retries: u32,
}

impl Display for RetryScheduled<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Retrying unprocessed items of {}: attempt {}/{}",
            self.operation, self.attempt, self.max_retries
        )
    }
}

impl StructuredLog for RetryScheduled<'_> {
    fn log(&self) {
        tracing::debug!(
            operation = self.operation,
            attempt = self.attempt,
            max_retries = self.max_retries,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "retry",
            span_name = name,
            operation = self.operation,
            attempt = self.attempt,
        )
    }
}

/// The retry budget ran out with items still unprocessed.
///
/// # Log Level
/// `warn!` - The owning unit of work will fault
///
/// # Example
/// ```
/// use the_tributary::observability::messages::retry::RetryExhausted;
///
/// let msg = RetryExhausted {
///     operation: "put_entries",
///     attempts: 9,
/// };
///
/// assert_eq!(
///     msg.to_string(),
///     "Retries exhausted for put_entries after 9 attempts"
/// );
/// ```
pub struct RetryExhausted<'a> {
    pub operation: &'a str,
    pub attempts: usize,
}

impl Display for RetryExhausted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Retries exhausted for {} after {} attempts",
            self.operation, self.attempts
        )
    }
}

impl StructuredLog for RetryExhausted<'_> {
    fn log(&self) {
        tracing::warn!(
            operation = self.operation,
            attempts = self.attempts,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::WARN,
            "retry_exhausted",
            span_name = name,
            operation = self.operation,
            attempts = self.attempts,
        )
    }
}
