// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for structured logging.
//!
//! Each type owns its wording (`Display`) and its level and fields
//! (`StructuredLog`), so call sites stay free of format strings.
//!
//! # Usage Pattern
//!
//! ```rust
//! use the_tributary::observability::messages::engine::InvocationStarted;
//! use the_tributary::observability::messages::StructuredLog;
//!
//! let msg = InvocationStarted {
//!     invocation_id: "abc",
//!     function_name: "listener",
//!     pipeline_count: 3,
//!     uow_count: 10,
//! };
//!
//! msg.log();
//! ```

pub mod batching;
pub mod cep;
pub mod engine;
pub mod faults;
pub mod retry;
pub mod validation;

use tracing::Span;

/// A message that knows how to log itself and open a span with its fields.
pub trait StructuredLog {
    fn log(&self);

    fn span(&self, name: &str) -> Span;
}
