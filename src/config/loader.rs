// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::batching::BatchOptions;
use crate::cep::Flavor;
use crate::config::consts::{
    DEFAULT_CHANNEL_CAPACITY, DEFAULT_PARALLEL, DEFAULT_SOURCE, DEFAULT_TTL_DAYS,
};
use crate::config::{validate_config, FunctionRegistry};
use crate::errors::ConfigError;
use crate::faults::FaultOptions;
use crate::model::Expire;
use crate::observability::messages::validation::{ConfigLoaded, ConfigRejected};
use crate::observability::messages::StructuredLog;
use crate::retry::RetryOptions;

/// Configuration of one listener or trigger function.
///
/// Every field has a default, so an empty document is a valid configuration
/// with no rules.
///
/// # Example
/// ```yaml
/// function_name: thing-cep
/// source: thing-service
/// parallel: 4
/// retry:
///   max_retries: 3
/// batch:
///   batch_size: 10
/// pipelines: [thing-correlated]
/// rules:
///   - id: thing-correlated
///     flavor: correlate
///     event_type: [thing-created, thing-updated]
///     correlation_key: thing.id
///   - id: thing-pair
///     flavor: evaluate
///     event_type: { regex: "^thing-" }
///     expression: { function: created-then-updated }
///     emit: thing-paired
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_function_name")]
    pub function_name: String,
    /// Source stamped on every bus entry.
    #[serde(default = "default_source")]
    pub source: String,
    /// Default width of rule steps.
    #[serde(default = "default_parallel")]
    pub parallel: usize,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Default row lifetime in days.
    #[serde(default = "default_ttl_days")]
    pub ttl_days: i64,
    #[serde(default)]
    pub retry: RetryOptions,
    #[serde(default)]
    pub batch: BatchOptions,
    #[serde(default)]
    pub faults: FaultOptions,
    /// Rule ids to run; all rules run when absent.
    #[serde(default)]
    pub pipelines: Option<Vec<String>>,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            function_name: default_function_name(),
            source: default_source(),
            parallel: DEFAULT_PARALLEL,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            ttl_days: DEFAULT_TTL_DAYS,
            retry: RetryOptions::default(),
            batch: BatchOptions::default(),
            faults: FaultOptions::default(),
            pipelines: None,
            rules: Vec::new(),
        }
    }
}

impl Config {
    /// Rules that should become pipelines.
    pub fn enabled_rules(&self) -> impl Iterator<Item = &RuleConfig> {
        self.rules.iter().filter(move |rule| match &self.pipelines {
            Some(enabled) => enabled.iter().any(|id| id == &rule.id),
            None => true,
        })
    }
}

fn default_function_name() -> String {
    "tributary".to_string()
}

fn default_source() -> String {
    DEFAULT_SOURCE.to_string()
}

fn default_parallel() -> usize {
    DEFAULT_PARALLEL
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

fn default_ttl_days() -> i64 {
    DEFAULT_TTL_DAYS
}

/// A rule as written in configuration. Function-valued fields hold names that
/// the `FunctionRegistry` resolves.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleConfig {
    pub id: String,
    pub flavor: Flavor,
    pub event_type: EventTypeConfig,
    #[serde(default)]
    pub filters: Vec<FunctionRef>,
    #[serde(default)]
    pub correlation_key: Option<ValueOrFunction>,
    #[serde(default)]
    pub correlation_key_suffix: Option<String>,
    /// Row lifetime in days.
    #[serde(default)]
    pub ttl: Option<i64>,
    #[serde(default)]
    pub expire: Option<Expire>,
    #[serde(default)]
    pub expression: Option<FunctionRef>,
    #[serde(default)]
    pub emit: Option<ValueOrFunction>,
    #[serde(default)]
    pub parallel: Option<usize>,
    #[serde(default)]
    pub index: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FunctionRef {
    pub function: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ValueOrFunction {
    Function(FunctionRef),
    Value(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EventTypeConfig {
    Exact(String),
    AnyOf(Vec<String>),
    Pattern { regex: String },
    Function(FunctionRef),
}

/// Load a config from a YAML or TOML file, chosen by extension.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let cfg: Config = match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => toml::from_str(&content)?,
        _ => serde_yaml::from_str(&content)?,
    };

    ConfigLoaded {
        path: &path.display().to_string(),
        rule_count: cfg.rules.len(),
    }
    .log();
    Ok(cfg)
}

/// Load a config and check it against the registered functions.
///
/// All validation errors are reported together.
pub fn load_and_validate_config<P: AsRef<Path>>(
    path: P,
    functions: &FunctionRegistry,
) -> Result<Config, ConfigError> {
    let cfg = load_config(path)?;

    if let Err(errors) = validate_config(&cfg, functions) {
        ConfigRejected { errors: &errors }.log();
        return Err(ConfigError::Invalid(errors));
    }

    Ok(cfg)
}
