use serde::{Deserialize, Serialize};

/// Ordered keystroke schedule.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingPlan {
    pub steps: Vec<TypingStep>,
}

impl TypingPlan {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Sum of all pauses in the plan
    pub fn total_delay_ms(&self) -> u64 {
        self.steps.iter().map(|s| s.delay_ms).sum()
    }
}

/// One chunk of text and the pause taken before it is typed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingStep {
    pub chunk: String,
    pub delay_ms: u64,
}

pub trait Tempo: Send + Sync {
    fn build_plan(&self, text: &str) -> TypingPlan;
}

/// One character per step with a constant gap between characters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedTempo {
    pub delay_ms: u64,
}

impl FixedTempo {
    pub const DEFAULT_DELAY_MS: u64 = 30;

    pub fn new(delay_ms: u64) -> Self {
        Self { delay_ms }
    }
}

impl Default for FixedTempo {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DELAY_MS)
    }
}

impl Tempo for FixedTempo {
    fn build_plan(&self, text: &str) -> TypingPlan {
        TypingPlan {
            steps: text
                .chars()
                .enumerate()
                .map(|(idx, ch)| TypingStep {
                    chunk: ch.to_string(),
                    delay_ms: if idx == 0 { 0 } else { self.delay_ms },
                })
                .collect(),
        }
    }
}
