// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;

/// Errors that can occur while validating a pipeline configuration
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Two rules share the same id
    DuplicateRuleId {
        /// The duplicate rule ID
        rule_id: String,
    },
    /// A pipeline id was registered twice
    DuplicatePipeline { pipeline_id: String },
    /// The enabled pipeline list names a pipeline that no rule defines
    UndefinedPipeline {
        /// The pipeline id that could not be resolved
        pipeline_id: String,
    },
    /// A rule references a named function that was never registered
    UnresolvedFunction {
        rule_id: String,
        field: String,
        function: String,
    },
    /// A rule is missing a field its flavor requires
    MissingField {
        rule_id: String,
        flavor: String,
        field: String,
    },
    /// An `event_type` regex failed to compile
    InvalidRegex {
        rule_id: String,
        pattern: String,
        reason: String,
    },
    /// A numeric or structural option is out of range
    InvalidOption {
        option: String,
        reason: String,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::DuplicateRuleId { rule_id } => {
                write!(f, "Duplicate rule ID: '{}'", rule_id)
            }
            ValidationError::DuplicatePipeline { pipeline_id } => {
                write!(f, "Pipeline '{}' is already registered", pipeline_id)
            }
            ValidationError::UndefinedPipeline { pipeline_id } => {
                write!(f, "Pipeline '{}' is enabled but not defined by any rule", pipeline_id)
            }
            ValidationError::UnresolvedFunction {
                rule_id,
                field,
                function,
            } => {
                write!(
                    f,
                    "Rule '{}' references unknown function '{}' for '{}'",
                    rule_id, function, field
                )
            }
            ValidationError::MissingField {
                rule_id,
                flavor,
                field,
            } => {
                write!(
                    f,
                    "Rule '{}' uses the {} flavor, which requires '{}'",
                    rule_id, flavor, field
                )
            }
            ValidationError::InvalidRegex {
                rule_id,
                pattern,
                reason,
            } => {
                write!(
                    f,
                    "Rule '{}' has an invalid event type pattern '{}': {}",
                    rule_id, pattern, reason
                )
            }
            ValidationError::InvalidOption { option, reason } => {
                write!(f, "Invalid option '{}': {}", option, reason)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Errors raised while loading configuration from disk
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {}", join_errors(.0))]
    Invalid(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
