// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod connectors;
pub mod step;

pub use connectors::{
    BatchGetRequest, BatchGetResponse, ClaimCheckPointer, ClaimCheckStore, Connectors,
    EntryOutcome, EventStore, PublishEntry, Publisher, PutEntriesRequest, PutEntriesResponse,
};
pub use step::Step;
