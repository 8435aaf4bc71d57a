// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Fault capture and deferred flush.
//!
//! A recoverable error becomes a [`Fault`](crate::model::Fault) queued on the
//! invocation's [`FaultChannel`]. Nothing is published while the pipelines run;
//! the [`FaultFlusher`] drains the queue once every line has finished.

mod capture;
mod flush;

pub use capture::{FaultChannel, PendingFault};
pub use flush::FaultFlusher;

use serde::Deserialize;

use crate::config::consts::{DEFAULT_MAX_FAULT_SIZE, DEFAULT_REDACT_FIELDS};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FaultOptions {
    /// Serialized size above which the unit of work is cut to identifiers
    pub max_fault_size: usize,
    /// Top-level unit-of-work fields never copied into a fault
    pub redact_fields: Vec<String>,
}

impl Default for FaultOptions {
    fn default() -> Self {
        Self {
            max_fault_size: DEFAULT_MAX_FAULT_SIZE,
            redact_fields: DEFAULT_REDACT_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }
}
