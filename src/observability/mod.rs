// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Structured logging for the pipeline runtime.
//!
//! Every diagnostic the crate emits is a message struct with a `Display`
//! implementation and a `StructuredLog` implementation that picks the level and
//! the structured fields. Call sites build the struct and call `.log()`; they
//! never format strings themselves.
//!
//! Messages are grouped by subsystem:
//! * `messages::engine` - invocation lifecycle and defect aborts
//! * `messages::faults` - fault capture and flush
//! * `messages::retry` - partial-failure retries
//! * `messages::batching` - batch flushes and claim checks
//! * `messages::cep` - rule flavor decisions
//! * `messages::validation` - configuration problems
//!
//! # Usage
//!
//! ```rust
//! use the_tributary::observability::messages::retry::RetryScheduled;
//! use the_tributary::observability::messages::StructuredLog;
//!
//! RetryScheduled {
//!     operation: "batch_get",
//!     attempt: 1,
//!     max_retries: 8,
//! }
//! .log();
//! ```

pub mod messages;

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install the fmt subscriber.
///
/// `RUST_LOG` wins when set, otherwise `default_level` applies. Safe to call
/// more than once; only the first call installs anything.
pub fn init_tracing(default_level: &str) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

        // A host may already own the global subscriber
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .try_init();
    });
}
