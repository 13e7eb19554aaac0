//! Error types for the page model

use thiserror::Error;

use crate::model::ElementId;

/// Selector parse failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectorError {
    /// Nothing to parse
    #[error("empty selector")]
    Empty,

    /// Rejected by the CSS parser
    #[error("{0}")]
    Invalid(String),
}

/// Page port failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PageError {
    /// Element is no longer part of the document
    #[error("element {0} is detached")]
    Detached(ElementId),

    /// Selector could not be parsed
    #[error("invalid selector: {0}")]
    InvalidSelector(#[from] SelectorError),

    /// Fixture element names a parent that does not precede it
    #[error("invalid page fixture: {0}")]
    InvalidFixture(String),

    /// Page cannot be reached (closed, navigating, cross-origin)
    #[error("page unavailable: {0}")]
    Unavailable(String),
}

impl PageError {
    /// Detachment is expected during navigation and never fatal
    pub fn is_detached(&self) -> bool {
        matches!(self, PageError::Detached(_))
    }
}
