// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod functions;
mod loader;
mod pipeline_registry;
mod validation;

#[cfg(test)]
mod integration_tests;
pub mod consts;

pub use functions::FunctionRegistry;
pub use loader::{
    load_and_validate_config, load_config, Config, EventTypeConfig, FunctionRef, RuleConfig,
    ValueOrFunction,
};
pub use pipeline_registry::PipelineRegistry;
pub use validation::validate_config;
