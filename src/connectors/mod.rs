// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! In-memory collaborators.
//!
//! Hermetic stand-ins for the event store, the bus and the blob store, with
//! scripted partial failures so retry and fault paths can be driven locally.

mod memory;

pub use memory::{MemoryClaimCheckStore, MemoryEventStore, MemoryPublisher, PublishScript};
