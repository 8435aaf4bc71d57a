// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod config;
mod connector;
mod execution;

pub use config::{ConfigError, ValidationError};
pub use connector::ConnectorError;
pub use execution::{PipelineError, ResultExt};
