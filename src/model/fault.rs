// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const FAULT_EVENT_TYPE: &str = "fault";

/// Auditable record of a business fault, published at the end of an invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fault {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    #[serde(rename = "partitionKey")]
    pub partition_key: String,
    pub tags: FaultTags,
    pub err: ErrorSurface,
    /// Trimmed, redacted copy of the source unit of work.
    pub uow: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultTags {
    pub functionname: String,
    pub pipeline: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSurface {
    pub name: String,
    pub message: String,
    pub stack: String,
}
