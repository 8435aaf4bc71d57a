// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for size-bounded batching.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A batch hit its count or byte budget, or the input ended.
///
/// # Log Level
/// `debug!` - Per-batch detail
pub struct BatchFlushed {
    pub members: usize,
    pub bytes: usize,
}

impl Display for BatchFlushed {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Batch flushed: {} members, {} bytes", self.members, self.bytes)
    }
}

impl StructuredLog for BatchFlushed {
    fn log(&self) {
        tracing::debug!(members = self.members, bytes = self.bytes, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("batch", span_name = name, members = self.members)
    }
}

/// An oversized payload was written to the blob store and replaced by a pointer.
///
/// # Log Level
/// `info!` - Notable but expected
///
/// # Example
/// ```
/// use the_tributary::observability::messages::batching::ClaimChecked;
///
/// let msg = ClaimChecked {
///     entry_id: "1",
///     size: 300_000,
///     key: "claimcheck/1",
/// };
///
/// assert_eq!(
///     msg.to_string(),
///     "Entry 1 of 300000 bytes claim-checked to claimcheck/1"
/// );
/// ```
pub struct ClaimChecked<'a> {
    pub entry_id: &'a str,
    pub size: usize,
    pub key: &'a str,
}

impl Display for ClaimChecked<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Entry {} of {} bytes claim-checked to {}",
            self.entry_id, self.size, self.key
        )
    }
}

impl StructuredLog for ClaimChecked<'_> {
    fn log(&self) {
        tracing::info!(
            entry_id = self.entry_id,
            size = self.size,
            key = self.key,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("claim_check", span_name = name, entry_id = self.entry_id)
    }
}
