use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;

/// Timing knobs of the orchestration engine. Every field has a default so
/// partial YAML sections deserialize.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub poll_interval_ms: u64,
    pub max_attempts: u32,
    pub keystroke_delay_ms: u64,
    /// Pause between the username and password fields
    pub field_settle_ms: u64,
    /// Pause before submitting
    pub submit_settle_ms: u64,
    /// Pause before re-arming the transport on a multi-page handoff
    pub rearm_delay_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 800,
            max_attempts: 20,
            keystroke_delay_ms: 30,
            field_settle_ms: 200,
            submit_settle_ms: 300,
            rearm_delay_ms: 2000,
        }
    }
}

impl EngineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn field_settle(&self) -> Duration {
        Duration::from_millis(self.field_settle_ms)
    }

    pub fn submit_settle(&self) -> Duration {
        Duration::from_millis(self.submit_settle_ms)
    }

    pub fn rearm_delay(&self) -> Duration {
        Duration::from_millis(self.rearm_delay_ms)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.poll_interval_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "poll_interval_ms must be greater than zero".into(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(EngineError::InvalidConfig(
                "max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_sections_keep_defaults() {
        let cfg: EngineConfig = serde_json::from_str(r#"{ "max_attempts": 5 }"#).unwrap();
        assert_eq!(cfg.max_attempts, 5);
        assert_eq!(cfg.poll_interval(), Duration::from_millis(800));
        assert_eq!(cfg.rearm_delay(), Duration::from_secs(2));
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let cfg = EngineConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
        assert!(EngineConfig::default().validate().is_ok());
    }
}
