// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Named functions that rule configuration refers to with `{function: name}`.

use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::cep::rule::{EmitFn, ExpressionFn, FilterFn, KeyFn, TypePredicateFn};
use crate::cep::{CorrelationKey, Emit, EventTypeMatcher, ExpressionResult, Flavor, Named, Rule};
use crate::config::loader::{EventTypeConfig, RuleConfig, ValueOrFunction};
use crate::errors::ValidationError;
use crate::model::{DomainEvent, UnitOfWork};

/// Lookup tables for every kind of named function a rule can use.
#[derive(Default, Clone)]
pub struct FunctionRegistry {
    filters: HashMap<String, Arc<FilterFn>>,
    type_predicates: HashMap<String, Arc<TypePredicateFn>>,
    keys: HashMap<String, Arc<KeyFn>>,
    expressions: HashMap<String, Arc<ExpressionFn>>,
    emits: HashMap<String, Arc<EmitFn>>,
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = |map: Vec<&String>| {
            let mut names: Vec<String> = map.into_iter().cloned().collect();
            names.sort();
            names
        };
        f.debug_struct("FunctionRegistry")
            .field("filters", &names(self.filters.keys().collect()))
            .field("type_predicates", &names(self.type_predicates.keys().collect()))
            .field("keys", &names(self.keys.keys().collect()))
            .field("expressions", &names(self.expressions.keys().collect()))
            .field("emits", &names(self.emits.keys().collect()))
            .finish()
    }
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_filter<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&UnitOfWork, &Rule) -> bool + Send + Sync + 'static,
    {
        self.filters.insert(name.into(), Arc::new(f));
        self
    }

    pub fn register_type_predicate<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.type_predicates.insert(name.into(), Arc::new(f));
        self
    }

    pub fn register_key<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&DomainEvent) -> Option<String> + Send + Sync + 'static,
    {
        self.keys.insert(name.into(), Arc::new(f));
        self
    }

    pub fn register_expression<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&UnitOfWork, &Rule) -> anyhow::Result<ExpressionResult> + Send + Sync + 'static,
    {
        self.expressions.insert(name.into(), Arc::new(f));
        self
    }

    pub fn register_emit<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&UnitOfWork, &Rule, DomainEvent) -> DomainEvent + Send + Sync + 'static,
    {
        self.emits.insert(name.into(), Arc::new(f));
        self
    }

    /// Build the runtime rule, collecting every reference that does not resolve.
    pub fn resolve(&self, config: &RuleConfig) -> Result<Rule, Vec<ValidationError>> {
        let mut errors = Vec::new();
        let rule_id = config.id.as_str();

        let event_type = match &config.event_type {
            EventTypeConfig::Exact(t) => Some(EventTypeMatcher::Exact(t.clone())),
            EventTypeConfig::AnyOf(types) => Some(EventTypeMatcher::AnyOf(types.clone())),
            EventTypeConfig::Pattern { regex } => match Regex::new(regex) {
                Ok(re) => Some(EventTypeMatcher::Pattern(re)),
                Err(e) => {
                    errors.push(ValidationError::InvalidRegex {
                        rule_id: rule_id.to_string(),
                        pattern: regex.clone(),
                        reason: e.to_string(),
                    });
                    None
                }
            },
            EventTypeConfig::Function(r) => {
                lookup(&self.type_predicates, rule_id, "event_type", &r.function, &mut errors)
                    .map(EventTypeMatcher::Predicate)
            }
        };

        let filters: Vec<Named<FilterFn>> = config
            .filters
            .iter()
            .filter_map(|r| lookup(&self.filters, rule_id, "filters", &r.function, &mut errors))
            .collect();

        let correlation_key = match &config.correlation_key {
            Some(ValueOrFunction::Value(dotted)) => Some(CorrelationKey::Path(dotted.clone())),
            Some(ValueOrFunction::Function(r)) => {
                lookup(&self.keys, rule_id, "correlation_key", &r.function, &mut errors)
                    .map(CorrelationKey::Computed)
            }
            None => None,
        };

        let expression = config
            .expression
            .as_ref()
            .and_then(|r| {
                    lookup(&self.expressions, rule_id, "expression", &r.function, &mut errors)
                });

        let emit = match &config.emit {
            Some(ValueOrFunction::Value(event_type)) => Some(Emit::Type(event_type.clone())),
            Some(ValueOrFunction::Function(r)) => {
                lookup(&self.emits, rule_id, "emit", &r.function, &mut errors).map(Emit::Computed)
            }
            None => None,
        };

        errors.extend(missing_fields(config));

        match event_type {
            Some(event_type) if errors.is_empty() => Ok(Rule {
                id: config.id.clone(),
                flavor: config.flavor,
                event_type,
                filters,
                correlation_key,
                correlation_key_suffix: config.correlation_key_suffix.clone(),
                ttl_days: config.ttl,
                expire: config.expire.clone(),
                expression,
                emit,
                parallel: config.parallel,
                index: config.index.clone(),
            }),
            _ => Err(errors),
        }
    }
}

fn lookup<F: ?Sized>(
    table: &HashMap<String, Arc<F>>,
    rule_id: &str,
    field: &str,
    name: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<Named<F>> {
    match table.get(name) {
        Some(f) => Some(Named {
            name: name.to_string(),
            f: Arc::clone(f),
        }),
        None => {
            errors.push(ValidationError::UnresolvedFunction {
                rule_id: rule_id.to_string(),
                field: field.to_string(),
                function: name.to_string(),
            });
            None
        }
    }
}

/// Fields a flavor cannot run without.
fn missing_fields(config: &RuleConfig) -> Vec<ValidationError> {
    let mut required = Vec::new();
    match config.flavor {
        Flavor::Correlate if config.correlation_key.is_none() => required.push("correlation_key"),
        Flavor::Evaluate if config.index.is_some() && config.expression.is_none() => {
            required.push("expression")
        }
        _ => {}
    }
    required
        .into_iter()
        .map(|field| ValidationError::MissingField {
            rule_id: config.id.clone(),
            flavor: config.flavor.as_str().to_string(),
            field: field.to_string(),
        })
        .collect()
}
