// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The two ways a stage can fail.
//!
//! A `Recoverable` error names the unit of work it belongs to, so the engine can
//! turn it into a fault event and keep the line running. A `Fatal` error carries
//! no unit of work; the engine cannot tell what state it left behind and aborts
//! the invocation so the host redelivers the batch.

use crate::model::UnitOfWork;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{cause:#}")]
    Recoverable {
        uow: Box<UnitOfWork>,
        cause: anyhow::Error,
    },

    #[error("defect: {cause:#}")]
    Fatal { cause: anyhow::Error },
}

impl PipelineError {
    pub fn recoverable(uow: UnitOfWork, cause: impl Into<anyhow::Error>) -> Self {
        PipelineError::Recoverable {
            uow: Box::new(uow),
            cause: cause.into(),
        }
    }

    pub fn fatal(cause: impl Into<anyhow::Error>) -> Self {
        PipelineError::Fatal {
            cause: cause.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::Fatal { .. })
    }

    pub fn uow(&self) -> Option<&UnitOfWork> {
        match self {
            PipelineError::Recoverable { uow, .. } => Some(uow),
            PipelineError::Fatal { .. } => None,
        }
    }

    pub fn cause(&self) -> &anyhow::Error {
        match self {
            PipelineError::Recoverable { cause, .. } | PipelineError::Fatal { cause } => cause,
        }
    }
}

/// Attach pipeline semantics to foreign results.
pub trait ResultExt<T> {
    /// Tag the error with the unit of work it happened on.
    fn with_uow(self, uow: &UnitOfWork) -> Result<T, PipelineError>;

    /// Treat the error as a defect.
    fn or_defect(self) -> Result<T, PipelineError>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn with_uow(self, uow: &UnitOfWork) -> Result<T, PipelineError> {
        self.map_err(|e| PipelineError::recoverable(uow.clone(), e))
    }

    fn or_defect(self) -> Result<T, PipelineError> {
        self.map_err(PipelineError::fatal)
    }
}
