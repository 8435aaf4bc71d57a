// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Data model shared by every pipeline: units of work, domain events, the
//! micro-event-store rows and fault events.

mod event;
mod fault;
mod record;
mod uow;

pub use event::{ChangeImages, ChangeKind, DomainEvent, Trigger};
pub use fault::{ErrorSurface, Fault, FaultTags, FAULT_EVENT_TYPE};
pub use record::{Discriminator, EventRecord, Expire, RecordKey, EVENT_SORT_KEY};
pub use uow::{ChangeActor, RecordMeta, UnitOfWork};
