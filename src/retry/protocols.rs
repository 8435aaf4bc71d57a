// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::Serialize;
use std::collections::BTreeMap;

use super::PartialBatch;
use crate::model::EventRecord;
use crate::traits::{
    BatchGetRequest, BatchGetResponse, EntryOutcome, PublishEntry, PutEntriesRequest,
    PutEntriesResponse,
};

/// Conditional multi-get: the service hands back unprocessed keys per table.
///
/// Records are grouped by table; within a table they appear in the order the
/// attempts resolved them, not in original key order.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchGetProtocol;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchGetOutput {
    pub responses: BTreeMap<String, Vec<EventRecord>>,
}

impl BatchGetOutput {
    pub fn records(&self) -> impl Iterator<Item = &EventRecord> {
        self.responses.values().flatten()
    }

    pub fn into_records(self) -> Vec<EventRecord> {
        self.responses.into_values().flatten().collect()
    }
}

impl PartialBatch for BatchGetProtocol {
    type Request = BatchGetRequest;
    type Response = BatchGetResponse;
    type Output = BatchGetOutput;

    fn operation(&self) -> &'static str {
        "batch_get"
    }

    fn unprocessed(
        &self,
        _request: &BatchGetRequest,
        response: &BatchGetResponse,
    ) -> Option<BatchGetRequest> {
        let keys: BTreeMap<_, _> = response
            .unprocessed_keys
            .iter()
            .filter(|(_, keys)| !keys.is_empty())
            .map(|(table, keys)| (table.clone(), keys.clone()))
            .collect();
        if keys.is_empty() {
            None
        } else {
            Some(BatchGetRequest { keys })
        }
    }

    fn merge(
        &self,
        output: &mut BatchGetOutput,
        _request: &BatchGetRequest,
        response: &BatchGetResponse,
    ) {
        for (table, records) in &response.responses {
            output
                .responses
                .entry(table.clone())
                .or_default()
                .extend(records.iter().cloned());
        }
    }
}

/// Multi-put to a bus, log stream, queue or topic.
///
/// Outcomes are positional; an entry failed when its outcome carries an error
/// code or when the service returned fewer outcomes than entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct PutEntriesProtocol;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedEntry {
    pub entry_id: String,
    pub outcome: EntryOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PutEntriesOutput {
    pub entries: Vec<PublishedEntry>,
}

impl PutEntriesOutput {
    pub fn outcome_for(&self, entry_id: &str) -> Option<&EntryOutcome> {
        self.entries
            .iter()
            .find(|e| e.entry_id == entry_id)
            .map(|e| &e.outcome)
    }
}

fn entry_failed(response: &PutEntriesResponse, index: usize) -> bool {
    response
        .entries
        .get(index)
        .map(EntryOutcome::is_failed)
        .unwrap_or(true)
}

impl PartialBatch for PutEntriesProtocol {
    type Request = PutEntriesRequest;
    type Response = PutEntriesResponse;
    type Output = PutEntriesOutput;

    fn operation(&self) -> &'static str {
        "put_entries"
    }

    fn unprocessed(
        &self,
        request: &PutEntriesRequest,
        response: &PutEntriesResponse,
    ) -> Option<PutEntriesRequest> {
        let entries: Vec<PublishEntry> = request
            .entries
            .iter()
            .enumerate()
            .filter(|(i, _)| entry_failed(response, *i))
            .map(|(_, entry)| entry.clone())
            .collect();
        if entries.is_empty() {
            None
        } else {
            Some(PutEntriesRequest { entries })
        }
    }

    fn merge(
        &self,
        output: &mut PutEntriesOutput,
        request: &PutEntriesRequest,
        response: &PutEntriesResponse,
    ) {
        for (i, entry) in request.entries.iter().enumerate() {
            if entry_failed(response, i) {
                continue;
            }
            if let Some(outcome) = response.entries.get(i) {
                output.entries.push(PublishedEntry {
                    entry_id: entry.id.clone(),
                    outcome: outcome.clone(),
                });
            }
        }
    }
}
