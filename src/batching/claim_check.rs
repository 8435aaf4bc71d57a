// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Offload an outbound payload to a blob store and pass a pointer instead.

use serde::{Deserialize, Serialize};

use crate::config::consts::CLAIM_CHECK_PREFIX;
use crate::errors::{PipelineError, ResultExt};
use crate::model::UnitOfWork;
use crate::observability::messages::batching::ClaimChecked;
use crate::observability::messages::StructuredLog;
use crate::traits::{ClaimCheckPointer, ClaimCheckStore};

/// What the consumer receives in place of the original detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimCheckDetail {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_key: Option<String>,
    pub claimcheck: ClaimCheckPointer,
}

pub fn object_key(entry_id: &str) -> String {
    format!("{}/{}", CLAIM_CHECK_PREFIX, entry_id)
}

/// Store the entry detail and swap in a pointer. Returns the new entry size.
///
/// A unit of work with no entry is left untouched and reports size zero.
pub async fn apply(
    store: &dyn ClaimCheckStore,
    uow: &mut UnitOfWork,
) -> Result<usize, PipelineError> {
    let Some(entry) = uow.entry.clone() else {
        return Ok(0);
    };

    let key = object_key(&entry.id);
    let original_size = entry.size_bytes();
    let pointer = store
        .put_object(&key, entry.detail.clone().into_bytes())
        .await
        .with_uow(uow)?;

    let detail = ClaimCheckDetail {
        id: entry.id.clone(),
        event_type: entry.detail_type.clone(),
        partition_key: entry.partition_key.clone(),
        claimcheck: pointer,
    };
    let detail = serde_json::to_string(&detail).with_uow(uow)?;

    ClaimChecked {
        entry_id: &entry.id,
        size: original_size,
        key: &key,
    }
    .log();

    let mut entry = entry;
    entry.detail = detail;
    let size = entry.size_bytes();
    uow.entry = Some(entry);
    Ok(size)
}
