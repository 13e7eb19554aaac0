//! Run events
//!
//! A run publishes each observable step on an [`EventHub`]. Subscribers that
//! fall behind lose the oldest events; the run itself never waits on them.

use autologin_core_types::{FieldKind, FlowKind};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::warn;

use crate::state::OrchestrationState;

const EVENT_CAPACITY: usize = 256;

/// How the login form was submitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitVia {
    Click,
    Enter,
}

/// Observable step of an orchestration run. Never carries credential values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrchestrationEvent {
    Transition {
        from: OrchestrationState,
        to: OrchestrationState,
    },
    SessionFound {
        flow: FlowKind,
        /// Page address without its fragment
        address: String,
    },
    Tick {
        attempt: u32,
        username: bool,
        password: bool,
        submit: bool,
    },
    FieldFilled {
        kind: FieldKind,
        chars: usize,
    },
    FieldDetached {
        kind: FieldKind,
        attempt: u32,
    },
    Submitted {
        via: SubmitVia,
        delivered: bool,
    },
    Rearmed {
        attempt: u32,
    },
    TimedOut {
        attempts: u32,
    },
    Cancelled {
        attempts: u32,
    },
}

impl OrchestrationEvent {
    /// Serialized tag, also used as the log field
    pub fn name(&self) -> &'static str {
        match self {
            OrchestrationEvent::Transition { .. } => "transition",
            OrchestrationEvent::SessionFound { .. } => "session_found",
            OrchestrationEvent::Tick { .. } => "tick",
            OrchestrationEvent::FieldFilled { .. } => "field_filled",
            OrchestrationEvent::FieldDetached { .. } => "field_detached",
            OrchestrationEvent::Submitted { .. } => "submitted",
            OrchestrationEvent::Rearmed { .. } => "rearmed",
            OrchestrationEvent::TimedOut { .. } => "timed_out",
            OrchestrationEvent::Cancelled { .. } => "cancelled",
        }
    }
}

/// Fan-out point for run events, shared by clones.
#[derive(Clone, Debug)]
pub struct EventHub {
    sender: broadcast::Sender<OrchestrationEvent>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Number of subscribers reached; zero when nobody is listening.
    pub fn publish(&self, event: OrchestrationEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrchestrationEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(EVENT_CAPACITY)
    }
}

/// Everything already queued on `rx`, without waiting. Lost events are
/// logged and skipped.
pub fn drain(rx: &mut broadcast::Receiver<OrchestrationEvent>) -> Vec<OrchestrationEvent> {
    let mut seen = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => seen.push(event),
            Err(TryRecvError::Lagged(skipped)) => {
                warn!(skipped, "run event subscriber lagged");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_reaches_every_subscriber() {
        let hub = EventHub::new(8);
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();
        assert_eq!(hub.publish(OrchestrationEvent::TimedOut { attempts: 3 }), 2);
        assert_eq!(drain(&mut a), vec![OrchestrationEvent::TimedOut { attempts: 3 }]);
        assert_eq!(drain(&mut b), vec![OrchestrationEvent::TimedOut { attempts: 3 }]);
    }

    #[test]
    fn publishing_without_subscribers_is_silent() {
        let hub = EventHub::default();
        assert_eq!(hub.publish(OrchestrationEvent::Cancelled { attempts: 0 }), 0);
    }

    #[test]
    fn lagging_subscriber_keeps_newest_events() {
        let hub = EventHub::new(2);
        let mut rx = hub.subscribe();
        for attempt in 1..=4 {
            hub.publish(OrchestrationEvent::Rearmed { attempt });
        }
        assert_eq!(
            drain(&mut rx),
            vec![
                OrchestrationEvent::Rearmed { attempt: 3 },
                OrchestrationEvent::Rearmed { attempt: 4 },
            ]
        );
    }

    #[test]
    fn events_serialize_with_tag() {
        let event = OrchestrationEvent::FieldFilled {
            kind: FieldKind::Password,
            chars: 8,
        };
        let raw = serde_json::to_value(&event).unwrap();
        assert_eq!(raw["event"], event.name());
        assert_eq!(raw["kind"], "password");
    }
}
