//! Page model - the document seam of the autofill core
//!
//! This crate provides:
//! - `PagePort`, the trait through which the core reads and mutates a document
//! - Element snapshots and synthetic DOM events
//! - CSS selector matching for explicit overrides, backed by `scraper`
//! - `MemoryPage`, an in-memory document driven by fixtures and tests

pub mod errors;
pub mod memory;
pub mod model;
pub mod port;
pub mod selector;

pub use errors::*;
pub use memory::{ElementSpec, EventRecord, MemoryPage, PageFixture};
pub use model::*;
pub use port::PagePort;
pub use selector::Selector;
