// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Loaded rules and the matchers they carry.
//!
//! A `Rule` is immutable once built. Named functions are resolved while the
//! configuration loads, so a rule never looks anything up at run time.

use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use super::Flavor;
use crate::model::{DomainEvent, Expire, UnitOfWork};
use crate::utils::path;

pub type FilterFn = dyn Fn(&UnitOfWork, &Rule) -> bool + Send + Sync;
pub type TypePredicateFn = dyn Fn(&str) -> bool + Send + Sync;
pub type KeyFn = dyn Fn(&DomainEvent) -> Option<String> + Send + Sync;
pub type ExpressionFn =
    dyn Fn(&UnitOfWork, &Rule) -> anyhow::Result<ExpressionResult> + Send + Sync;
pub type EmitFn = dyn Fn(&UnitOfWork, &Rule, DomainEvent) -> DomainEvent + Send + Sync;

/// A registered function together with the name it was registered under.
pub struct Named<F: ?Sized> {
    pub name: String,
    pub f: Arc<F>,
}

impl<F: ?Sized> Clone for Named<F> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            f: Arc::clone(&self.f),
        }
    }
}

impl<F: ?Sized> fmt::Debug for Named<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{function: {}}}", self.name)
    }
}

#[derive(Debug, Clone)]
pub enum EventTypeMatcher {
    Exact(String),
    AnyOf(Vec<String>),
    Pattern(Regex),
    Predicate(Named<TypePredicateFn>),
}

impl EventTypeMatcher {
    pub fn matches(&self, event_type: &str) -> bool {
        match self {
            EventTypeMatcher::Exact(expected) => expected == event_type,
            EventTypeMatcher::AnyOf(types) => types.iter().any(|t| t == event_type),
            EventTypeMatcher::Pattern(re) => re.is_match(event_type),
            EventTypeMatcher::Predicate(p) => (p.f)(event_type),
        }
    }
}

#[derive(Debug, Clone)]
pub enum CorrelationKey {
    /// Dotted path into the event (`thing.id`).
    Path(String),
    Computed(Named<KeyFn>),
}

impl CorrelationKey {
    pub fn resolve(&self, event: &DomainEvent) -> Option<String> {
        match self {
            CorrelationKey::Path(dotted) => {
                event.lookup(dotted).as_ref().and_then(path::scalar_string)
            }
            CorrelationKey::Computed(k) => (k.f)(event).filter(|key| !key.is_empty()),
        }
    }
}

/// What an expression concluded about the working set.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionResult {
    /// Emit one event, or nothing.
    Gate(bool),
    /// Emit one event carrying these fields.
    One(Map<String, Value>),
    /// Emit one event per body.
    Many(Vec<Map<String, Value>>),
}

impl From<bool> for ExpressionResult {
    fn from(gate: bool) -> Self {
        ExpressionResult::Gate(gate)
    }
}

#[derive(Debug, Clone)]
pub enum Emit {
    /// Type of the derived event.
    Type(String),
    /// Receives the engine-built event and returns the one to publish.
    Computed(Named<EmitFn>),
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub flavor: Flavor,
    pub event_type: EventTypeMatcher,
    pub filters: Vec<Named<FilterFn>>,
    pub correlation_key: Option<CorrelationKey>,
    pub correlation_key_suffix: Option<String>,
    /// Row lifetime in days.
    pub ttl_days: Option<i64>,
    pub expire: Option<Expire>,
    pub expression: Option<Named<ExpressionFn>>,
    pub emit: Option<Emit>,
    pub parallel: Option<usize>,
    /// Keys-only secondary index on `data`.
    pub index: Option<String>,
}

impl Rule {
    pub fn new(id: impl Into<String>, flavor: Flavor, event_type: EventTypeMatcher) -> Self {
        Self {
            id: id.into(),
            flavor,
            event_type,
            filters: Vec::new(),
            correlation_key: None,
            correlation_key_suffix: None,
            ttl_days: None,
            expire: None,
            expression: None,
            emit: None,
            parallel: None,
            index: None,
        }
    }

    /// `event` is the event the rule is about; for table-stream flavors that
    /// is the event stored in the changed row, not the change notification.
    pub fn matches(&self, event: &DomainEvent, uow: &UnitOfWork) -> bool {
        self.event_type.matches(&event.event_type)
            && self.filters.iter().all(|flt| (flt.f)(uow, self))
    }

    pub fn correlation_key_for(&self, event: &DomainEvent) -> Option<String> {
        self.correlation_key.as_ref().and_then(|k| k.resolve(event))
    }
}
