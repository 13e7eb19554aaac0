use std::fmt;

use autologin_core_types::FlowKind;
use serde::{Deserialize, Serialize};

/// Lifecycle of one orchestration instance (one page load).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationState {
    #[default]
    Idle,
    Polling,
    Filled,
    TimedOut,
}

impl OrchestrationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrchestrationState::Filled | OrchestrationState::TimedOut)
    }
}

impl fmt::Display for OrchestrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OrchestrationState::Idle => "idle",
            OrchestrationState::Polling => "polling",
            OrchestrationState::Filled => "filled",
            OrchestrationState::TimedOut => "timed_out",
        };
        f.write_str(label)
    }
}

/// Which part of the login a fill completed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillStep {
    /// Username and password on the same page
    Combined,
    /// Username page of a multi-page login
    IdentityOnly,
    /// Password page of a multi-page login
    SecretOnly,
}

/// How a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum RunOutcome {
    /// No session in the transport channel
    Idle,
    Filled { step: FillStep },
    /// First page of a multi-page login done; the next page continues
    HandedOff,
    TimedOut,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub state: OrchestrationState,
    pub outcome: RunOutcome,
    /// Ticks performed
    pub attempts: u32,
    pub flow: Option<FlowKind>,
}

impl RunReport {
    pub fn idle() -> Self {
        Self {
            state: OrchestrationState::Idle,
            outcome: RunOutcome::Idle,
            attempts: 0,
            flow: None,
        }
    }
}
