// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::errors::ConnectorError;
use crate::model::{Discriminator, EventRecord, RecordKey};
use crate::traits::{
    BatchGetRequest, BatchGetResponse, ClaimCheckPointer, ClaimCheckStore, EntryOutcome,
    EventStore, PublishEntry, Publisher, PutEntriesRequest, PutEntriesResponse,
};

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Single table keyed by `(pk, sk)`.
pub struct MemoryEventStore {
    table: String,
    rows: Mutex<BTreeMap<(String, String), EventRecord>>,
    failing_pks: Mutex<HashSet<String>>,
    batch_get_limit: Mutex<Option<usize>>,
    query_calls: AtomicUsize,
    batch_get_calls: AtomicUsize,
}

impl MemoryEventStore {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            rows: Mutex::new(BTreeMap::new()),
            failing_pks: Mutex::new(HashSet::new()),
            batch_get_limit: Mutex::new(None),
            query_calls: AtomicUsize::new(0),
            batch_get_calls: AtomicUsize::new(0),
        }
    }

    /// Insert a row directly, bypassing failure scripts.
    pub fn seed(&self, record: EventRecord) {
        locked(&self.rows).insert((record.pk.clone(), record.sk.clone()), record);
    }

    /// Every put for this partition key fails.
    pub fn fail_puts_for(&self, pk: impl Into<String>) {
        locked(&self.failing_pks).insert(pk.into());
    }

    /// Resolve at most `limit` keys per `batch_get`, reporting the rest unprocessed.
    pub fn limit_batch_get(&self, limit: usize) {
        *locked(&self.batch_get_limit) = Some(limit);
    }

    pub fn get(&self, pk: &str, sk: &str) -> Option<EventRecord> {
        locked(&self.rows).get(&(pk.to_string(), sk.to_string())).cloned()
    }

    pub fn records(&self) -> Vec<EventRecord> {
        locked(&self.rows).values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        locked(&self.rows).len()
    }

    pub fn is_empty(&self) -> bool {
        locked(&self.rows).is_empty()
    }

    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    pub fn batch_get_calls(&self) -> usize {
        self.batch_get_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    fn table_name(&self) -> &str {
        &self.table
    }

    async fn put(&self, record: EventRecord) -> Result<(), ConnectorError> {
        if locked(&self.failing_pks).contains(&record.pk) {
            return Err(ConnectorError::request(
                self.table.as_str(),
                format!("put rejected for pk {}", record.pk),
            ));
        }
        self.seed(record);
        Ok(())
    }

    async fn query(&self, pk: &str) -> Result<Vec<EventRecord>, ConnectorError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        Ok(locked(&self.rows)
            .iter()
            .filter(|((row_pk, _), _)| row_pk == pk)
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn query_index(
        &self,
        _index: &str,
        data: &str,
    ) -> Result<Vec<RecordKey>, ConnectorError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        Ok(locked(&self.rows)
            .values()
            .filter(|r| r.discriminator == Discriminator::Event && r.data.as_deref() == Some(data))
            .map(EventRecord::key)
            .collect())
    }

    async fn batch_get(
        &self,
        request: BatchGetRequest,
    ) -> Result<BatchGetResponse, ConnectorError> {
        self.batch_get_calls.fetch_add(1, Ordering::SeqCst);
        let mut budget = locked(&self.batch_get_limit).unwrap_or(usize::MAX);
        let rows = locked(&self.rows);
        let mut response = BatchGetResponse::default();

        for (table, keys) in request.keys {
            if table != self.table {
                return Err(ConnectorError::request(
                    self.table.as_str(),
                    format!("unknown table {}", table),
                ));
            }
            for key in keys {
                if budget == 0 {
                    response.unprocessed_keys.entry(table.clone()).or_default().push(key);
                    continue;
                }
                budget -= 1;
                let found = response.responses.entry(table.clone()).or_default();
                if let Some(record) = rows.get(&(key.pk, key.sk)) {
                    found.push(record.clone());
                }
            }
        }
        Ok(response)
    }
}

/// What the next `put_entries` call does. Unscripted calls accept everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishScript {
    Accept,
    /// The call fails outright.
    Unavailable,
    /// The first `n` entries of the call come back throttled.
    ThrottleFirst(usize),
}

/// Bus that records accepted entries.
pub struct MemoryPublisher {
    name: String,
    published: Mutex<Vec<PublishEntry>>,
    scripts: Mutex<VecDeque<PublishScript>>,
    always_reject: Mutex<HashSet<String>>,
    calls: AtomicUsize,
}

impl MemoryPublisher {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            published: Mutex::new(Vec::new()),
            scripts: Mutex::new(VecDeque::new()),
            always_reject: Mutex::new(HashSet::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Queue the behavior of one upcoming call.
    pub fn script(&self, script: PublishScript) {
        locked(&self.scripts).push_back(script);
    }

    /// Every entry with this id is throttled, on every call.
    pub fn always_reject(&self, entry_id: impl Into<String>) {
        locked(&self.always_reject).insert(entry_id.into());
    }

    pub fn published(&self) -> Vec<PublishEntry> {
        locked(&self.published).clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Publisher for MemoryPublisher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn put_entries(
        &self,
        request: PutEntriesRequest,
    ) -> Result<PutEntriesResponse, ConnectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let script = locked(&self.scripts).pop_front().unwrap_or(PublishScript::Accept);
        let throttled = match script {
            PublishScript::Unavailable => {
                return Err(ConnectorError::request(self.name.as_str(), "service unavailable"));
            }
            PublishScript::Accept => 0,
            PublishScript::ThrottleFirst(n) => n,
        };

        let rejected = locked(&self.always_reject).clone();
        let mut published = locked(&self.published);
        let entries: Vec<EntryOutcome> = request
            .entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| {
                if i < throttled || rejected.contains(&entry.id) {
                    EntryOutcome::rejected("ThrottlingException", "rate exceeded")
                } else {
                    let outcome = EntryOutcome::accepted(format!("{}-{}", self.name, entry.id));
                    published.push(entry);
                    outcome
                }
            })
            .collect();

        Ok(PutEntriesResponse {
            failed_entry_count: entries.iter().filter(|e| e.is_failed()).count(),
            entries,
        })
    }
}

/// Blob store keeping objects in memory.
pub struct MemoryClaimCheckStore {
    bucket: String,
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryClaimCheckStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Mutex::new(HashMap::new()),
        }
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        locked(&self.objects).get(key).cloned()
    }
}

#[async_trait]
impl ClaimCheckStore for MemoryClaimCheckStore {
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
    ) -> Result<ClaimCheckPointer, ConnectorError> {
        locked(&self.objects).insert(key.to_string(), body);
        Ok(ClaimCheckPointer {
            bucket: self.bucket.clone(),
            key: key.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DomainEvent, EVENT_SORT_KEY};

    fn row(pk: &str, sk: &str, data: Option<&str>) -> EventRecord {
        EventRecord {
            pk: pk.into(),
            sk: sk.into(),
            discriminator: if sk == EVENT_SORT_KEY {
                Discriminator::Event
            } else {
                Discriminator::Correlation
            },
            timestamp: 0,
            sequence_number: None,
            ttl: 0,
            data: data.map(String::from),
            event: DomainEvent::new(pk, "c1", 0),
            expire: None,
            suffix: None,
            rule_id: None,
        }
    }

    #[tokio::test]
    async fn test_query_returns_partition_in_sort_order() {
        let store = MemoryEventStore::new("events");
        store.seed(row("11", "2", None));
        store.seed(row("11", "1", None));
        store.seed(row("12", "3", None));

        let rows = store.query("11").await.unwrap();
        let sks: Vec<&str> = rows.iter().map(|r| r.sk.as_str()).collect();
        assert_eq!(sks, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_query_index_matches_event_rows_on_data() {
        let store = MemoryEventStore::new("events");
        store.seed(row("1", EVENT_SORT_KEY, Some("11")));
        store.seed(row("2", EVENT_SORT_KEY, Some("12")));
        store.seed(row("11", "1", Some("11")));

        let keys = store.query_index("data-index", "11").await.unwrap();
        assert_eq!(keys, vec![RecordKey::canonical("1")]);
    }

    #[tokio::test]
    async fn test_batch_get_limit_reports_unprocessed() {
        let store = MemoryEventStore::new("events");
        store.seed(row("1", EVENT_SORT_KEY, None));
        store.seed(row("2", EVENT_SORT_KEY, None));
        store.limit_batch_get(1);

        let request = BatchGetRequest {
            keys: BTreeMap::from([(
                "events".to_string(),
                vec![RecordKey::canonical("1"), RecordKey::canonical("2")],
            )]),
        };
        let response = store.batch_get(request).await.unwrap();

        assert_eq!(response.responses["events"].len(), 1);
        assert_eq!(response.unprocessed_keys["events"], vec![RecordKey::canonical("2")]);
    }

    #[tokio::test]
    async fn test_publisher_scripts_apply_in_order() {
        let publisher = MemoryPublisher::new("bus");
        publisher.script(PublishScript::ThrottleFirst(1));
        let entry =
            |id: &str| PublishEntry::for_event("test", &DomainEvent::new(id, "e1", 0)).unwrap();

        let first = publisher
            .put_entries(PutEntriesRequest { entries: vec![entry("a"), entry("b")] })
            .await
            .unwrap();
        assert_eq!(first.failed_entry_count, 1);
        assert!(first.entries[0].is_failed());

        let second = publisher
            .put_entries(PutEntriesRequest { entries: vec![entry("a")] })
            .await
            .unwrap();
        assert_eq!(second.failed_entry_count, 0);
        assert_eq!(publisher.published().len(), 2);
        assert_eq!(publisher.calls(), 2);
    }
}
