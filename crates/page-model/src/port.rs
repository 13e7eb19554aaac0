use async_trait::async_trait;

use crate::errors::PageError;
use crate::model::{DomEvent, ElementId, ElementSnapshot};
use crate::selector::Selector;

/// Document access used by the locator, the injector and the orchestrator.
///
/// Implementations must report `PageError::Detached` for handles whose
/// element left the document, including when the whole page is navigating.
#[async_trait]
pub trait PagePort: Send + Sync {
    /// Full current address, fragment included
    async fn address(&self) -> Result<String, PageError>;

    /// Replace the fragment of the current address without reloading
    async fn set_fragment(&self, fragment: &str) -> Result<(), PageError>;

    /// Attached elements in document order
    async fn elements(&self) -> Result<Vec<ElementSnapshot>, PageError>;

    async fn is_attached(&self, id: ElementId) -> bool;

    async fn value(&self, id: ElementId) -> Result<String, PageError>;

    async fn set_value(&self, id: ElementId, value: &str) -> Result<(), PageError>;

    async fn dispatch(&self, id: ElementId, event: DomEvent) -> Result<(), PageError>;

    /// Elements matching `selector`, in document order
    async fn query_selector_all(&self, selector: &str) -> Result<Vec<ElementSnapshot>, PageError> {
        let elements = self.elements().await?;
        Ok(Selector::parse(selector)?.filter(&elements))
    }
}
