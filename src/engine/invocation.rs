// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::faults::{FaultChannel, FaultOptions};

/// State owned by one handler call.
///
/// Concurrent invocations in one process share nothing: each has its own fault
/// queue, read cache and cancellation token.
#[derive(Debug)]
pub struct Invocation {
    id: String,
    function_name: String,
    faults: FaultChannel,
    cache: ReadCache,
    cancellation: CancellationToken,
}

impl Invocation {
    pub fn new(function_name: impl Into<String>, fault_options: FaultOptions) -> Self {
        let function_name = function_name.into();
        Self {
            id: Uuid::new_v4().to_string(),
            faults: FaultChannel::new(function_name.clone(), fault_options),
            function_name,
            cache: ReadCache::default(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    pub fn faults(&self) -> &FaultChannel {
        &self.faults
    }

    pub fn cache(&self) -> &ReadCache {
        &self.cache
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Queue a recoverable error as a fault; hand back a fatal one.
    pub fn capture(&self, err: PipelineError) -> Result<(), PipelineError> {
        self.faults.capture(err)
    }
}

/// Read-through cache keyed by the serialized request.
///
/// Identical reads within one invocation hit the collaborator once. Values are
/// stored as JSON so one cache serves every response type.
#[derive(Debug, Default)]
pub struct ReadCache {
    entries: Mutex<HashMap<String, Value>>,
}

impl ReadCache {
    pub async fn get_or_fetch<R, T, E, F, Fut>(
        &self,
        namespace: &str,
        request: &R,
        fetch: F,
    ) -> Result<T, E>
    where
        R: Serialize + ?Sized,
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Ok(serialized) = serde_json::to_string(request) else {
            return fetch().await;
        };
        let key = format!("{}:{}", namespace, serialized);

        if let Some(hit) = self.entries.lock().await.get(&key).cloned() {
            if let Ok(value) = serde_json::from_value(hit) {
                return Ok(value);
            }
        }

        let value = fetch().await?;
        if let Ok(stored) = serde_json::to_value(&value) {
            self.entries.lock().await.insert(key, stored);
        }
        Ok(value)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}
