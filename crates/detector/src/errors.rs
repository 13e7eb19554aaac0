use autologin_core_types::AutofillError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DetectorError {
    /// Auxiliary context could not be opened at all
    #[error("failed to open auxiliary context: {0}")]
    Open(String),

    /// Context is up but refuses introspection (cross-origin)
    #[error("auxiliary context blocked: {0}")]
    Blocked(String),

    #[error("auxiliary context already closed")]
    Closed,
}

impl From<DetectorError> for AutofillError {
    fn from(err: DetectorError) -> Self {
        AutofillError::CrossContextBlocked(err.to_string())
    }
}
