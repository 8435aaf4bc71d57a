// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Pipeline execution.
//!
//! A [`Handler`] owns the registered pipelines. Each call creates an
//! [`Invocation`], and the [`Composer`] broadcasts every unit of work to every
//! pipeline. Each [`Pipeline`] runs as a line of stage tasks. Recoverable
//! errors become faults and the line keeps going; fatal errors cancel
//! everything.

mod composer;
mod handler;
mod invocation;
mod line;
pub mod stages;


pub use composer::{Composer, Emitted};
pub use handler::{Handler, InvocationReport};
pub use invocation::{Invocation, ReadCache};
pub use line::{Pipeline, PipelineBuilder, Stage};
