// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Retries after the first attempt of a partial batch call
pub const DEFAULT_MAX_RETRIES: u32 = 8;
/// Base of the backoff delay, also the jitter range
pub const DEFAULT_BASE_DELAY_MS: u64 = 100;

/// Members per batch handed to a multi-put
pub const DEFAULT_BATCH_SIZE: usize = 10;
/// Byte budget of one multi-put request (256 KiB)
pub const DEFAULT_MAX_REQUEST_SIZE: usize = 256 * 1024;
/// Object key prefix for claim-checked payloads
pub const CLAIM_CHECK_PREFIX: &str = "claimcheck";

/// Row lifetime in the micro-event-store
pub const DEFAULT_TTL_DAYS: i64 = 11;
pub const SECONDS_PER_DAY: i64 = 86_400;

/// In-flight units of work per step stage
pub const DEFAULT_PARALLEL: usize = 4;
/// Capacity of the channels between stages
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// Serialized fault size above which the unit of work is cut to identifiers
pub const DEFAULT_MAX_FAULT_SIZE: usize = 256 * 1024;
/// Unit-of-work fields dropped from faults unless configured otherwise
pub const DEFAULT_REDACT_FIELDS: &[&str] = &["response"];

/// Source name stamped on published entries when none is configured
pub const DEFAULT_SOURCE: &str = "tributary";
