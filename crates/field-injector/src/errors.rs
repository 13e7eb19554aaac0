use autologin_page_model::{ElementId, PageError};
use thiserror::Error;

/// Internal failure while emitting; callers only ever see an outcome.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InjectError {
    #[error("element {0} left the document")]
    Detached(ElementId),

    #[error("page failure on {element}: {source}")]
    Page {
        element: ElementId,
        #[source]
        source: PageError,
    },
}

impl InjectError {
    pub fn from_page(element: ElementId, err: PageError) -> Self {
        if err.is_detached() {
            InjectError::Detached(element)
        } else {
            InjectError::Page {
                element,
                source: err,
            }
        }
    }
}
