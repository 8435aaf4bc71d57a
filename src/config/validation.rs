// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Load-time validation of a listener configuration.
//!
//! Checks run independently and accumulate, so one pass reports every problem:
//!
//! 1. **Uniqueness**: rule ids are unique
//! 2. **Enabled pipelines**: every id in `pipelines` names a rule
//! 3. **Rules**: function references resolve, regexes compile and each flavor
//!    has the fields it needs
//! 4. **Options**: sizes, widths and capacities are positive

use std::collections::HashSet;

use crate::config::{Config, FunctionRegistry};
use crate::errors::ValidationError;

/// Validate `config` against the functions it may reference.
///
/// # Returns
///
/// * `Ok(())` - the configuration can be turned into pipelines
/// * `Err(Vec<ValidationError>)` - every problem found
pub fn validate_config(
    config: &Config,
    functions: &FunctionRegistry,
) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    errors.extend(unique_rule_ids(config));
    errors.extend(enabled_pipelines(config));
    for rule in &config.rules {
        if let Err(rule_errors) = functions.resolve(rule) {
            errors.extend(rule_errors);
        }
    }
    errors.extend(option_ranges(config));

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn unique_rule_ids(config: &Config) -> Vec<ValidationError> {
    let mut seen = HashSet::new();
    config
        .rules
        .iter()
        .filter(|rule| !seen.insert(rule.id.as_str()))
        .map(|rule| ValidationError::DuplicateRuleId {
            rule_id: rule.id.clone(),
        })
        .collect()
}

fn enabled_pipelines(config: &Config) -> Vec<ValidationError> {
    let Some(enabled) = &config.pipelines else {
        return Vec::new();
    };
    let defined: HashSet<&str> = config.rules.iter().map(|r| r.id.as_str()).collect();
    enabled
        .iter()
        .filter(|id| !defined.contains(id.as_str()))
        .map(|id| ValidationError::UndefinedPipeline {
            pipeline_id: id.clone(),
        })
        .collect()
}

fn option_ranges(config: &Config) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut positive = |option: &str, value: usize| {
        if value == 0 {
            errors.push(ValidationError::InvalidOption {
                option: option.to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
    };

    positive("parallel", config.parallel);
    positive("channel_capacity", config.channel_capacity);
    positive("batch.batch_size", config.batch.batch_size);
    positive("batch.max_request_size", config.batch.max_request_size);
    positive("faults.max_fault_size", config.faults.max_fault_size);
    for rule in &config.rules {
        if let Some(parallel) = rule.parallel {
            positive(&format!("rules.{}.parallel", rule.id), parallel);
        }
    }

    if config.ttl_days <= 0 {
        errors.push(ValidationError::InvalidOption {
            option: "ttl_days".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    for rule in &config.rules {
        if matches!(rule.ttl, Some(days) if days <= 0) {
            errors.push(ValidationError::InvalidOption {
                option: format!("rules.{}.ttl", rule.id),
                reason: "must be greater than zero".to_string(),
            });
        }
    }
    errors
}
