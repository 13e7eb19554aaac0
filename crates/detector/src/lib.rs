//! Interactive field detector
//!
//! Opens the target in an auxiliary browsing context, lays a capture layer
//! over it and turns one click into a selector. Each request settles exactly
//! once: selected, cancelled (Escape), timed out, blocked (cross-origin) or
//! busy (same field kind already in flight).

pub mod config;
pub mod context;
pub mod detector;
pub mod errors;
pub mod selector;

pub use config::{DetectorConfig, DEFAULT_OUTLINE};
pub use context::{
    AuxContext, AuxContextOpener, Gesture, GestureFeed, MemoryAuxContext, MemoryOpener,
};
pub use detector::{tooltip_for, CaptureRecord, DetectionOutcome, FieldDetector};
pub use errors::DetectorError;
pub use selector::derive_selector;
