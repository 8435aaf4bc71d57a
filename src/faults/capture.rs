// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::FaultOptions;
use crate::batching::BatchError;
use crate::errors::{ConnectorError, PipelineError};
use crate::model::{ErrorSurface, Fault, FaultTags, UnitOfWork, FAULT_EVENT_TYPE};
use crate::observability::messages::faults::{FaultCaptured, FaultRepublishFailed, FaultTrimmed};
use crate::observability::messages::StructuredLog;
use crate::retry::RetryError;
use crate::utils::now_millis;

/// A queued fault and how many times publishing it already failed.
#[derive(Debug, Clone)]
pub struct PendingFault {
    pub fault: Fault,
    pub failed_publishes: u8,
}

/// Invocation-scoped queue of captured faults.
#[derive(Debug)]
pub struct FaultChannel {
    function_name: String,
    options: FaultOptions,
    pending: Mutex<VecDeque<PendingFault>>,
}

impl FaultChannel {
    pub fn new(function_name: impl Into<String>, options: FaultOptions) -> Self {
        Self {
            function_name: function_name.into(),
            options,
            pending: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue a recoverable error as a fault. A fatal error is handed back.
    pub fn capture(&self, err: PipelineError) -> Result<(), PipelineError> {
        let (uow, cause) = match err {
            PipelineError::Recoverable { uow, cause } => (uow, cause),
            fatal @ PipelineError::Fatal { .. } => return Err(fatal),
        };

        let fault = self.build(&uow, &cause);
        FaultCaptured {
            fault_id: &fault.id,
            pipeline: &fault.tags.pipeline,
            error: &fault.err.message,
        }
        .log();
        self.queue().push_back(PendingFault {
            fault,
            failed_publishes: 0,
        });
        Ok(())
    }

    /// Put a fault whose publish failed back on the queue, once.
    ///
    /// The second failure for the same fault is a defect.
    pub fn requeue(
        &self,
        mut pending: PendingFault,
        cause: anyhow::Error,
    ) -> Result<(), PipelineError> {
        let requeued = pending.failed_publishes == 0;
        let message = format!("{:#}", cause);
        FaultRepublishFailed {
            fault_id: &pending.fault.id,
            error: &message,
            requeued,
        }
        .log();

        if !requeued {
            return Err(PipelineError::fatal(
                cause.context(format!("fault {} could not be published", pending.fault.id)),
            ));
        }
        pending.failed_publishes += 1;
        self.queue().push_back(pending);
        Ok(())
    }

    pub fn pop(&self) -> Option<PendingFault> {
        self.queue().pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue().is_empty()
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<PendingFault>> {
        // The queue holds plain data; a panicking holder cannot leave it torn
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn build(&self, uow: &UnitOfWork, cause: &anyhow::Error) -> Fault {
        let id = Uuid::new_v4().to_string();
        let mut fault = Fault {
            id: id.clone(),
            event_type: FAULT_EVENT_TYPE.to_string(),
            timestamp: now_millis(),
            partition_key: Uuid::new_v4().to_string(),
            tags: FaultTags {
                functionname: self.function_name.clone(),
                pipeline: uow.pipeline.clone().unwrap_or_default(),
            },
            err: ErrorSurface {
                name: error_name(cause).to_string(),
                message: format!("{:#}", cause),
                stack: format!("{:?}", cause),
            },
            uow: self.redacted(uow),
        };

        let size = serde_json::to_vec(&fault).map(|b| b.len()).unwrap_or(usize::MAX);
        if size > self.options.max_fault_size {
            FaultTrimmed {
                fault_id: &id,
                size,
                limit: self.options.max_fault_size,
            }
            .log();
            fault.uow = identifiers(uow);
        }
        fault
    }

    fn redacted(&self, uow: &UnitOfWork) -> Value {
        let mut value = serde_json::to_value(uow).unwrap_or_else(|_| identifiers(uow));
        if let Value::Object(map) = &mut value {
            for field in &self.options.redact_fields {
                map.remove(field);
            }
        }
        value
    }
}

fn error_name(cause: &anyhow::Error) -> &'static str {
    cause
        .chain()
        .find_map(|e| {
            if e.is::<RetryError>() {
                Some("RetryError")
            } else if e.is::<ConnectorError>() {
                Some("ConnectorError")
            } else if e.is::<BatchError>() {
                Some("BatchError")
            } else if e.is::<serde_json::Error>() {
                Some("SerializationError")
            } else {
                None
            }
        })
        .unwrap_or("Error")
}

/// The least a consumer needs to find and resubmit the original item.
fn identifiers(uow: &UnitOfWork) -> Value {
    let event = uow.event.as_ref().map(|e| {
        json!({
            "id": e.id,
            "type": e.event_type,
            "partitionKey": e.partition_key,
            "timestamp": e.timestamp,
        })
    });
    let members: Vec<&str> = uow.batch.iter().filter_map(UnitOfWork::event_id).collect();
    json!({
        "pipeline": uow.pipeline,
        "meta": uow.meta,
        "event": event,
        "batch": members,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DomainEvent, RecordMeta};

    fn uow(id: &str) -> UnitOfWork {
        let mut uow = UnitOfWork::new(json!({ "raw": true }), DomainEvent::new(id, "e1", 10))
            .with_meta(RecordMeta {
                sequence_number: Some("42".into()),
                ..Default::default()
            });
        uow.pipeline = Some("p1".into());
        uow.response = Some(json!({ "secret": "token" }));
        uow
    }

    #[test]
    fn test_capture_builds_fault_from_recoverable() {
        let channel = FaultChannel::new("listener", FaultOptions::default());
        let err = PipelineError::recoverable(uow("1"), ConnectorError::request("bus", "boom"));

        channel.capture(err).unwrap();

        let pending = channel.pop().unwrap();
        let fault = pending.fault;
        assert_eq!(fault.event_type, "fault");
        assert_eq!(fault.tags.functionname, "listener");
        assert_eq!(fault.tags.pipeline, "p1");
        assert_eq!(fault.err.name, "ConnectorError");
        assert!(fault.err.message.contains("boom"));
        assert_eq!(fault.uow["event"]["id"], "1");
        assert!(fault.uow.get("response").is_none(), "redacted field kept");
        assert!(channel.is_empty());
    }

    #[test]
    fn test_capture_hands_back_fatal() {
        let channel = FaultChannel::new("listener", FaultOptions::default());
        let err = channel
            .capture(PipelineError::fatal(anyhow::anyhow!("no uow")))
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(channel.len(), 0);
    }

    #[test]
    fn test_oversized_fault_keeps_identifiers() {
        let options = FaultOptions {
            max_fault_size: 512,
            ..Default::default()
        };
        let channel = FaultChannel::new("listener", options);
        let mut big = uow("1");
        big.record = json!({ "blob": "x".repeat(4096) });

        channel
            .capture(PipelineError::recoverable(big, anyhow::anyhow!("too big")))
            .unwrap();

        let fault = channel.pop().unwrap().fault;
        assert!(fault.uow.get("record").is_none());
        assert_eq!(fault.uow["event"]["id"], "1");
        assert_eq!(fault.uow["meta"]["sequenceNumber"], "42");
        assert_eq!(fault.uow["pipeline"], "p1");
    }

    #[test]
    fn test_requeue_once_then_defect() {
        let channel = FaultChannel::new("listener", FaultOptions::default());
        channel
            .capture(PipelineError::recoverable(uow("1"), anyhow::anyhow!("boom")))
            .unwrap();

        let first = channel.pop().unwrap();
        channel.requeue(first, anyhow::anyhow!("bus down")).unwrap();
        let second = channel.pop().unwrap();
        assert_eq!(second.failed_publishes, 1);

        let err = channel.requeue(second, anyhow::anyhow!("bus down")).unwrap_err();
        assert!(err.is_fatal());
        assert!(channel.is_empty());
    }
}
