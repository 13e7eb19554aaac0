use std::time::Duration;

use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InjectReport {
    /// Characters emitted, not bytes
    pub chars: usize,
    pub elapsed: Duration,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InjectOutcome {
    Success(InjectReport),
    Detached,
}

impl InjectOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, InjectOutcome::Success(_))
    }

    pub fn is_detached(&self) -> bool {
        matches!(self, InjectOutcome::Detached)
    }
}

/// Result of a single submission primitive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOutcome {
    Done,
    Detached,
}
