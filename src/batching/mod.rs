// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Size-bounded batching for multi-put requests.
//!
//! The [`SizeBoundedBatcher`] groups units of work whose outbound entries fit
//! a count budget and a byte budget. An entry too large for any request is
//! written to a claim-check store and replaced by a pointer; without a store
//! it fails as a fault instead of being dropped.
//!
//! # Example
//!
//! ```
//! use the_tributary::batching::{BatchOptions, SizeBoundedBatcher};
//!
//! let batcher = SizeBoundedBatcher::new(BatchOptions::default(), None);
//! assert!(batcher.is_empty());
//! ```

mod batcher;
pub mod claim_check;

pub use batcher::SizeBoundedBatcher;

use serde::Deserialize;

use crate::config::consts::{DEFAULT_BATCH_SIZE, DEFAULT_MAX_REQUEST_SIZE};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    /// Members per batch
    pub batch_size: usize,
    /// Bytes per batch
    pub max_request_size: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_request_size: DEFAULT_MAX_REQUEST_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
    #[error("entry {entry_id} is {size} bytes, over the {limit} byte request limit, and no claim-check store is configured")]
    Oversized {
        entry_id: String,
        size: usize,
        limit: usize,
    },

    #[error("claim-check pointer for entry {entry_id} is still {size} bytes, over the {limit} byte request limit")]
    PointerTooLarge {
        entry_id: String,
        size: usize,
        limit: usize,
    },

    #[error("unit of work reached the batch stage of pipeline '{pipeline}' without an outbound entry")]
    MissingEntry { pipeline: String },
}
