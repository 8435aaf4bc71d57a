// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors reported by external collaborators (event store, bus, blob store).

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectorError {
    /// The call itself failed (transport, auth, service error).
    #[error("{service} request failed: {message}")]
    Request { service: String, message: String },

    /// The call succeeded but its payload could not be encoded or decoded.
    #[error("{service} payload could not be decoded: {message}")]
    Decode { service: String, message: String },
}

impl ConnectorError {
    pub fn request(service: impl Into<String>, message: impl Into<String>) -> Self {
        ConnectorError::Request {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn decode(service: impl Into<String>, message: impl Into<String>) -> Self {
        ConnectorError::Decode {
            service: service.into(),
            message: message.into(),
        }
    }
}
