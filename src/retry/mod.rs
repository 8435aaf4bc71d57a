// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Partial-failure retry with exponential backoff.
//!
//! Batch APIs answer with a mix of resolved and unresolved sub-items. The retry
//! loop keeps what resolved, narrows the request to what did not, waits, and
//! tries again until nothing is left or the attempt budget runs out.
//!
//! # Example
//!
//! ```
//! use the_tributary::retry::{backoff_delay, RetryOptions};
//! use std::time::Duration;
//!
//! let options = RetryOptions::default();
//! assert_eq!(options.max_retries, 8);
//!
//! // The first attempt never waits
//! assert_eq!(backoff_delay(0, options.base_delay()), Duration::ZERO);
//! ```

mod protocols;

pub use protocols::{
    BatchGetOutput, BatchGetProtocol, PublishedEntry, PutEntriesOutput, PutEntriesProtocol,
};

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::config::consts::{DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_RETRIES};
use crate::errors::ConnectorError;
use crate::observability::messages::retry::{RetryExhausted, RetryScheduled};
use crate::observability::messages::StructuredLog;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryOptions {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
        }
    }
}

impl RetryOptions {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

/// `0` for the first attempt, then `base + 2^attempt ms + uniform(0, base)`.
pub fn backoff_delay(attempt: u32, base: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }
    let exponential = Duration::from_millis(2u64.saturating_pow(attempt));
    let base_ms = base.as_millis() as u64;
    let jitter = if base_ms == 0 {
        Duration::ZERO
    } else {
        Duration::from_millis(rand::thread_rng().gen_range(0..base_ms))
    };
    base + exponential + jitter
}

/// Describes how one batch API reports partial success.
pub trait PartialBatch {
    type Request: Clone + Send;
    type Response: Serialize + Send;
    type Output: Default + Serialize + Send;

    fn operation(&self) -> &'static str;

    /// The request narrowed to unresolved sub-items, `None` once all resolved.
    fn unprocessed(
        &self,
        request: &Self::Request,
        response: &Self::Response,
    ) -> Option<Self::Request>;

    /// Fold the sub-items this attempt resolved into the accumulated output.
    fn merge(&self, output: &mut Self::Output, request: &Self::Request, response: &Self::Response);
}

/// Merged output plus every raw attempt response, in order.
#[derive(Debug, Clone, Serialize)]
pub struct Attempted<O, R> {
    #[serde(flatten)]
    pub output: O,
    pub attempts: Vec<R>,
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError {
    #[error("Failed batch requests: {operation} left items unprocessed after {attempts} attempts")]
    Exhausted {
        operation: &'static str,
        attempts: usize,
        last: Value,
        history: Vec<Value>,
    },

    #[error(transparent)]
    Connector(#[from] ConnectorError),
}

/// Run `perform` until the protocol reports nothing unprocessed.
///
/// A call that fails outright returns `RetryError::Connector` at once; only
/// partial responses are retried.
pub async fn retry_partial<P, F, Fut>(
    protocol: &P,
    request: P::Request,
    options: &RetryOptions,
    mut perform: F,
) -> Result<Attempted<P::Output, P::Response>, RetryError>
where
    P: PartialBatch,
    F: FnMut(P::Request) -> Fut,
    Fut: Future<Output = Result<P::Response, ConnectorError>>,
{
    let mut output = P::Output::default();
    let mut attempts: Vec<P::Response> = Vec::new();
    let mut pending = request;
    let mut attempt: u32 = 0;

    loop {
        let delay = backoff_delay(attempt, options.base_delay());
        if !delay.is_zero() {
            sleep(delay).await;
        }

        let response = perform(pending.clone()).await?;
        protocol.merge(&mut output, &pending, &response);
        let narrowed = protocol.unprocessed(&pending, &response);
        attempts.push(response);

        let Some(narrowed) = narrowed else {
            return Ok(Attempted { output, attempts });
        };

        if attempt >= options.max_retries {
            RetryExhausted {
                operation: protocol.operation(),
                attempts: attempts.len(),
            }
            .log();
            let history: Vec<Value> = attempts
                .iter()
                .map(|r| serde_json::to_value(r).unwrap_or(Value::Null))
                .collect();
            return Err(RetryError::Exhausted {
                operation: protocol.operation(),
                attempts: attempts.len(),
                last: history.last().cloned().unwrap_or(Value::Null),
                history,
            });
        }

        attempt += 1;
        RetryScheduled {
            operation: protocol.operation(),
            attempt,
            max_retries: options.max_retries,
        }
        .log();
        pending = narrowed;
    }
}
