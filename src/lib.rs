// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod batching;      // size-bounded batching + claim check
pub mod cep;           // collect / correlate / evaluate / expire flavors
pub mod config;        // config + registry
pub mod connectors;    // in-memory collaborators
pub mod engine;        // composer, lines, invocation
pub mod errors;        // error handling
pub mod faults;        // fault capture and deferred flush
pub mod model;         // uow, events, rows, faults
pub mod observability;
pub mod retry;         // partial-failure retry protocol
pub mod traits;        // stage + collaborator abstractions
pub mod utils;
